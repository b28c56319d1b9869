//! Headless client core for the onboarding, sign-up/sign-in and OTP
//! verification screens. Rendering is left to the caller; this crate owns the
//! state, the validation rules and the calls to the remote auth service.

use validation::ValidationErrors;

pub mod auth_service;
pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod form;
pub mod onboarding;
pub mod otp;
pub mod session;
pub mod validation;

pub use auth_service::{AuthService, HttpAuthService};
pub use config::{load_settings, ClientSettings};
pub use controller::{FormController, SubmitOutcome};
pub use flow::AuthFlow;
pub use form::{FieldValue, SignInForm, SignUpForm};
pub use onboarding::{CarouselStep, OnboardingCarousel, Slide};
pub use otp::{
    OtpEvent, OtpPhase, OtpSession, OtpSnapshot, OtpTimings, ResendOutcome, VerifyOutcome,
};
pub use session::AuthSession;

pub const LOADING_SIGN_UP: &str = "Creating your account....";
pub const LOADING_SIGN_IN: &str = "Signing In...";
pub const LOADING_VERIFY_OTP: &str = "Verifying OTP...";
pub const LOADING_RESEND_OTP: &str = "Resending OTP...";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    Welcome,
    SignUp,
    SignIn,
    /// The OTP modal shown over the sign-up screen.
    VerifyOtp,
    Home,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    ScreenChanged(Screen),
    Loading { label: &'static str, active: bool },
    FieldErrors(ValidationErrors),
    Notice(String),
    Error(String),
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
