//! OTP verification session backing the verification modal.
//!
//! `Idle -> AwaitingCode -> Verifying -> (AwaitingCode | Verified)`, with
//! `cancel()` returning to `Idle` from anywhere. While the modal is visible a
//! one-second ticker counts the resend cooldown down. Verify and resend are
//! mutually exclusive; a second request while one is in flight is refused.
//!
//! The session never aborts a request itself. Every `open`/`cancel` bumps a
//! generation counter and a result that comes back under an older
//! generation is reported as [`VerifyOutcome::Stale`] /
//! [`ResendOutcome::Stale`] without touching the new state.
//!
//! A caller that drops a `verify()`/`resend()` future mid-request (timeout,
//! `select!`) gets the in-flight marker rolled back, so the session accepts
//! the next action instead of staying busy.

use std::{
    sync::{Arc, Weak},
    time::Duration,
};

use shared::protocol::VerifyOtpRequest;
use tokio::{
    runtime::Handle,
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, info, warn};

use crate::{
    auth_service::AuthService, config::ClientSettings, error::OtpError, session::AuthSession,
};

pub const OTP_TICK: Duration = Duration::from_secs(1);

const DEFAULT_VERIFY_REJECTION: &str = "Invalid OTP";
const VERIFY_TRANSPORT_FAILURE: &str = "Verification failed.";
const DEFAULT_RESEND_REJECTION: &str = "Failed to resend OTP";
const RESEND_TRANSPORT_FAILURE: &str = "Error resending OTP.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPhase {
    Idle,
    AwaitingCode,
    Verifying,
    Verified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpTimings {
    pub initial_cooldown_secs: u32,
    pub resend_cooldown_secs: u32,
}

impl Default for OtpTimings {
    fn default() -> Self {
        Self {
            initial_cooldown_secs: 61,
            resend_cooldown_secs: 100,
        }
    }
}

impl From<&ClientSettings> for OtpTimings {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            initial_cooldown_secs: settings.otp_initial_cooldown_secs,
            resend_cooldown_secs: settings.otp_resend_cooldown_secs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpSnapshot {
    pub phase: OtpPhase,
    pub email_address: String,
    pub code: String,
    pub cooldown_remaining: u32,
    pub is_verifying: bool,
    pub is_resending: bool,
}

impl OtpSnapshot {
    pub fn is_visible(&self) -> bool {
        !matches!(self.phase, OtpPhase::Idle)
    }

    pub fn can_resend(&self) -> bool {
        self.check_resend().is_ok()
    }

    /// Whether `verify()` would send a request right now.
    pub fn check_verify(&self) -> Result<(), OtpError> {
        verify_gate(self.phase, self.is_resending)
    }

    /// Whether `resend()` would send a request right now.
    pub fn check_resend(&self) -> Result<(), OtpError> {
        resend_gate(self.phase, self.is_resending, self.cooldown_remaining)
    }
}

fn verify_gate(phase: OtpPhase, is_resending: bool) -> Result<(), OtpError> {
    match phase {
        OtpPhase::AwaitingCode if is_resending => Err(OtpError::Busy),
        OtpPhase::AwaitingCode => Ok(()),
        OtpPhase::Verifying => Err(OtpError::Busy),
        OtpPhase::Idle | OtpPhase::Verified => Err(OtpError::NotAwaitingCode),
    }
}

fn resend_gate(
    phase: OtpPhase,
    is_resending: bool,
    cooldown_remaining: u32,
) -> Result<(), OtpError> {
    match phase {
        OtpPhase::AwaitingCode => {}
        OtpPhase::Verifying => return Err(OtpError::Busy),
        OtpPhase::Idle | OtpPhase::Verified => return Err(OtpError::NotAwaitingCode),
    }
    if is_resending {
        return Err(OtpError::Busy);
    }
    if cooldown_remaining > 0 {
        return Err(OtpError::CooldownActive {
            remaining: cooldown_remaining,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified(Option<AuthSession>),
    Rejected(String),
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResendOutcome {
    Resent { cooldown_remaining: u32 },
    Failed(String),
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtpEvent {
    Opened { email_address: String },
    CooldownChanged(u32),
    Verified,
    Closed,
}

struct OtpState {
    phase: OtpPhase,
    email_address: String,
    code: String,
    cooldown_remaining: u32,
    is_resending: bool,
    generation: u64,
    ticker: Option<JoinHandle<()>>,
}

impl OtpState {
    fn idle() -> Self {
        Self {
            phase: OtpPhase::Idle,
            email_address: String::new(),
            code: String::new(),
            cooldown_remaining: 0,
            is_resending: false,
            generation: 0,
            ticker: None,
        }
    }

    fn is_visible(&self) -> bool {
        matches!(self.phase, OtpPhase::AwaitingCode | OtpPhase::Verifying)
    }

    fn stop_ticker(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
    }

    /// Starts a fresh session generation; anything still in flight from the
    /// previous one becomes stale.
    fn reset(&mut self, phase: OtpPhase, email_address: String, cooldown: u32) {
        self.stop_ticker();
        self.generation += 1;
        self.phase = phase;
        self.email_address = email_address;
        self.code.clear();
        self.cooldown_remaining = cooldown;
        self.is_resending = false;
    }

    fn apply_tick(&mut self) -> Option<u32> {
        if self.cooldown_remaining == 0 {
            return None;
        }
        self.cooldown_remaining -= 1;
        Some(self.cooldown_remaining)
    }

    /// Undoes the in-flight marker of a request whose result will never be
    /// applied. No-op once the session has moved to another generation.
    fn clear_pending(&mut self, generation: u64, kind: PendingKind) {
        if self.generation != generation {
            return;
        }
        match kind {
            PendingKind::Verify if self.phase == OtpPhase::Verifying => {
                self.phase = OtpPhase::AwaitingCode;
            }
            PendingKind::Verify => {}
            PendingKind::Resend => self.is_resending = false,
        }
        debug!(?kind, "otp request dropped before completion");
    }

    fn snapshot(&self) -> OtpSnapshot {
        OtpSnapshot {
            phase: self.phase,
            email_address: self.email_address.clone(),
            code: self.code.clone(),
            cooldown_remaining: self.cooldown_remaining,
            is_verifying: self.phase == OtpPhase::Verifying,
            is_resending: self.is_resending,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum PendingKind {
    Verify,
    Resend,
}

/// Held across the request await. If the caller drops the `verify()` /
/// `resend()` future early, the in-flight marker is rolled back so the next
/// action is not refused as `Busy`.
struct PendingRequest {
    state: Arc<Mutex<OtpState>>,
    generation: u64,
    kind: PendingKind,
    armed: bool,
}

impl PendingRequest {
    fn new(state: &Arc<Mutex<OtpState>>, generation: u64, kind: PendingKind) -> Self {
        Self {
            state: Arc::clone(state),
            generation,
            kind,
            armed: true,
        }
    }

    /// The result is being applied under the lock; nothing to roll back.
    fn complete(mut self) {
        self.armed = false;
    }
}

impl Drop for PendingRequest {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let (generation, kind) = (self.generation, self.kind);
        if let Ok(mut state) = self.state.try_lock() {
            state.clear_pending(generation, kind);
            return;
        }
        let state = Arc::clone(&self.state);
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                state.lock().await.clear_pending(generation, kind);
            });
        }
    }
}

pub struct OtpSession {
    service: Arc<dyn AuthService>,
    timings: OtpTimings,
    state: Arc<Mutex<OtpState>>,
    events: broadcast::Sender<OtpEvent>,
}

impl OtpSession {
    pub fn new(service: Arc<dyn AuthService>, timings: OtpTimings) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            service,
            timings,
            state: Arc::new(Mutex::new(OtpState::idle())),
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OtpEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> OtpSnapshot {
        self.state.lock().await.snapshot()
    }

    /// Shows the modal for `email_address`: empty code, full cooldown, ticker
    /// running. Reopening discards whatever the previous session held.
    pub async fn open(&self, email_address: impl Into<String>) {
        let email_address = email_address.into();
        let mut state = self.state.lock().await;
        state.reset(
            OtpPhase::AwaitingCode,
            email_address.clone(),
            self.timings.initial_cooldown_secs,
        );
        let generation = state.generation;
        state.ticker = Some(spawn_ticker(
            Arc::downgrade(&self.state),
            generation,
            self.events.clone(),
        ));
        info!(email = %email_address, cooldown = self.timings.initial_cooldown_secs, "otp session opened");
        let _ = self.events.send(OtpEvent::Opened { email_address });
    }

    /// Stores the entered code, keeping digits only.
    pub async fn set_code(&self, code: &str) -> Result<(), OtpError> {
        let mut state = self.state.lock().await;
        if !state.is_visible() {
            return Err(OtpError::NotAwaitingCode);
        }
        state.code = code.chars().filter(char::is_ascii_digit).collect();
        Ok(())
    }

    pub async fn verify(&self) -> Result<VerifyOutcome, OtpError> {
        let (generation, request) = {
            let mut state = self.state.lock().await;
            verify_gate(state.phase, state.is_resending)?;
            state.phase = OtpPhase::Verifying;
            (
                state.generation,
                VerifyOtpRequest {
                    email_address: state.email_address.clone(),
                    otp: state.code.clone(),
                },
            )
        };

        let pending = PendingRequest::new(&self.state, generation, PendingKind::Verify);
        let result = self.service.verify_otp(&request).await;

        let mut state = self.state.lock().await;
        pending.complete();
        if state.generation != generation {
            debug!(email = %request.email_address, "ignoring otp verification result for closed session");
            return Ok(VerifyOutcome::Stale);
        }

        match result {
            Ok(res) if res.flag => {
                state.phase = OtpPhase::Verified;
                state.stop_ticker();
                info!(email = %state.email_address, "otp verified");
                let _ = self.events.send(OtpEvent::Verified);
                Ok(VerifyOutcome::Verified(AuthSession::from_result(&res)))
            }
            Ok(res) => {
                state.phase = OtpPhase::AwaitingCode;
                warn!(code = res.code, message = %res.message, "otp rejected");
                Ok(VerifyOutcome::Rejected(
                    res.message_text()
                        .unwrap_or(DEFAULT_VERIFY_REJECTION)
                        .to_string(),
                ))
            }
            Err(err) => {
                state.phase = OtpPhase::AwaitingCode;
                warn!(%err, "otp verification request failed");
                Ok(VerifyOutcome::Rejected(VERIFY_TRANSPORT_FAILURE.to_string()))
            }
        }
    }

    pub async fn resend(&self) -> Result<ResendOutcome, OtpError> {
        let (generation, email_address) = {
            let mut state = self.state.lock().await;
            resend_gate(state.phase, state.is_resending, state.cooldown_remaining)?;
            state.is_resending = true;
            (state.generation, state.email_address.clone())
        };

        let pending = PendingRequest::new(&self.state, generation, PendingKind::Resend);
        let result = self.service.resend_otp(&email_address).await;

        let mut state = self.state.lock().await;
        pending.complete();
        if state.generation != generation {
            debug!(email = %email_address, "ignoring otp resend result for closed session");
            return Ok(ResendOutcome::Stale);
        }
        state.is_resending = false;

        match result {
            Ok(res) if res.flag => {
                state.cooldown_remaining = self.timings.resend_cooldown_secs;
                info!(email = %email_address, "otp resent");
                let _ = self
                    .events
                    .send(OtpEvent::CooldownChanged(state.cooldown_remaining));
                Ok(ResendOutcome::Resent {
                    cooldown_remaining: state.cooldown_remaining,
                })
            }
            Ok(res) => {
                warn!(code = res.code, message = %res.message, "otp resend rejected");
                Ok(ResendOutcome::Failed(
                    res.message_text()
                        .unwrap_or(DEFAULT_RESEND_REJECTION)
                        .to_string(),
                ))
            }
            Err(err) => {
                warn!(%err, "otp resend request failed");
                Ok(ResendOutcome::Failed(RESEND_TRANSPORT_FAILURE.to_string()))
            }
        }
    }

    /// Hides the modal and discards the session. Returns `false` when there
    /// was nothing to close.
    pub async fn cancel(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.phase == OtpPhase::Idle {
            return false;
        }
        state.reset(OtpPhase::Idle, String::new(), 0);
        debug!("otp session closed");
        let _ = self.events.send(OtpEvent::Closed);
        true
    }
}

impl Drop for OtpSession {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.try_lock() {
            state.stop_ticker();
        }
    }
}

fn spawn_ticker(
    state: Weak<Mutex<OtpState>>,
    generation: u64,
    events: broadcast::Sender<OtpEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = time::interval_at(Instant::now() + OTP_TICK, OTP_TICK);
        loop {
            interval.tick().await;
            let Some(shared) = state.upgrade() else {
                break;
            };
            let mut guard = shared.lock().await;
            if guard.generation != generation || !guard.is_visible() {
                break;
            }
            if let Some(remaining) = guard.apply_tick() {
                debug!(remaining, "otp cooldown tick");
                let _ = events.send(OtpEvent::CooldownChanged(remaining));
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/otp_tests.rs"]
mod tests;
