//! Error types for the auth transport and the OTP session, plus mapping of
//! raw failure text to something a user can act on.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthServiceError {
    #[error("auth request failed: {0}")]
    Transport(#[from] reqwest::Error),
    /// Failure reported by an [`AuthService`](crate::AuthService) that does
    /// not go through reqwest (in-process fakes, alternative transports).
    #[error("auth service unavailable: {0}")]
    Unavailable(String),
}

/// Rejections of an OTP action that was not allowed in the current state.
/// These never involve the network.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum OtpError {
    #[error("otp session is not awaiting a code")]
    NotAwaitingCode,
    #[error("another otp request is already in flight")]
    Busy,
    #[error("resend available in {remaining}s")]
    CooldownActive { remaining: u32 },
}

pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";

pub fn classify_remote_failure(message: &str) -> String {
    let lower = message.to_ascii_lowercase();
    if lower.contains("failed to connect")
        || lower.contains("connection refused")
        || lower.contains("error sending request")
        || lower.contains("dns")
        || lower.contains("timed out")
    {
        "Server unreachable; check URL/network and retry.".to_string()
    } else {
        GENERIC_FAILURE_MESSAGE.to_string()
    }
}
