use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate};
use shared::{domain::Field, protocol::UserProfile};
use tokio::sync::broadcast;
use tracing::info;

use crate::{
    auth_service::AuthService,
    config::ClientSettings,
    controller::{FormController, SubmitOutcome},
    error::OtpError,
    form::{FieldError, FieldValue, SignInForm, SignUpForm},
    onboarding::{CarouselStep, OnboardingCarousel},
    otp::{OtpSession, OtpTimings, ResendOutcome, VerifyOutcome},
    session::AuthSession,
    validation::ValidationRules,
    FlowEvent, Screen, LOADING_RESEND_OTP, LOADING_VERIFY_OTP,
};

/// Navigation across the auth screens. Owns both forms, the form controller
/// and the OTP session, and broadcasts [`FlowEvent`]s for the renderer.
pub struct AuthFlow {
    service: Arc<dyn AuthService>,
    screen: Screen,
    carousel: OnboardingCarousel,
    sign_up: SignUpForm,
    sign_in: SignInForm,
    controller: FormController,
    otp: Arc<OtpSession>,
    session: Option<AuthSession>,
    events: broadcast::Sender<FlowEvent>,
}

impl AuthFlow {
    pub fn new(service: Arc<dyn AuthService>, settings: &ClientSettings) -> Self {
        let (events, _) = broadcast::channel(256);
        let rules = ValidationRules {
            minimum_age_years: settings.minimum_age_years,
        };
        Self {
            controller: FormController::new(Arc::clone(&service), rules, events.clone()),
            otp: Arc::new(OtpSession::new(
                Arc::clone(&service),
                OtpTimings::from(settings),
            )),
            service,
            screen: Screen::Welcome,
            carousel: OnboardingCarousel::default(),
            sign_up: SignUpForm::default(),
            sign_in: SignInForm::default(),
            session: None,
            events,
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<FlowEvent> {
        self.events.subscribe()
    }

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn carousel(&self) -> &OnboardingCarousel {
        &self.carousel
    }

    pub fn controller(&self) -> &FormController {
        &self.controller
    }

    pub fn otp(&self) -> &Arc<OtpSession> {
        &self.otp
    }

    pub fn session(&self) -> Option<&AuthSession> {
        self.session.as_ref()
    }

    pub fn sign_up_form(&self) -> &SignUpForm {
        &self.sign_up
    }

    pub fn sign_in_form(&self) -> &SignInForm {
        &self.sign_in
    }

    pub fn update_sign_up(
        &mut self,
        field: Field,
        value: impl Into<FieldValue>,
    ) -> Result<(), FieldError> {
        self.sign_up.update_field(field, value)
    }

    pub fn update_sign_in(
        &mut self,
        field: Field,
        value: impl Into<FieldValue>,
    ) -> Result<(), FieldError> {
        self.sign_in.update_field(field, value)
    }

    pub fn next_slide(&mut self) -> CarouselStep {
        let step = self.carousel.next();
        if let CarouselStep::Finished(screen) = step {
            self.navigate(screen);
        }
        step
    }

    pub fn skip_onboarding(&mut self) {
        let screen = self.carousel.skip();
        self.navigate(screen);
    }

    /// Links between the auth screens ("Already have an account?" and back).
    pub fn open_sign_in(&mut self) {
        self.navigate(Screen::SignIn);
    }

    pub fn open_sign_up(&mut self) {
        self.navigate(Screen::SignUp);
    }

    pub async fn submit_sign_up(&mut self) -> SubmitOutcome {
        self.submit_sign_up_on(Local::now().date_naive()).await
    }

    pub async fn submit_sign_up_on(&mut self, today: NaiveDate) -> SubmitOutcome {
        let outcome = self.controller.submit_sign_up(&self.sign_up, today).await;
        if let SubmitOutcome::Accepted { next, .. } = &outcome {
            self.otp.open(self.sign_up.email_address.clone()).await;
            self.navigate(*next);
        }
        outcome
    }

    pub async fn submit_sign_in(&mut self) -> SubmitOutcome {
        let outcome = self.controller.submit_sign_in(&self.sign_in).await;
        if let SubmitOutcome::Accepted { next, session } = &outcome {
            self.session = session.clone();
            self.navigate(*next);
        }
        outcome
    }

    /// Refusals (`Busy`, `NotAwaitingCode`) return before any loading event.
    pub async fn verify_otp(&mut self) -> Result<VerifyOutcome, OtpError> {
        self.otp.snapshot().await.check_verify()?;
        self.loading(LOADING_VERIFY_OTP, true);
        let outcome = self.otp.verify().await;
        self.loading(LOADING_VERIFY_OTP, false);

        match &outcome {
            Ok(VerifyOutcome::Verified(session)) => {
                self.session = session.clone();
                self.notice("OTP verified!");
                self.otp.cancel().await;
                self.navigate(Screen::Home);
            }
            Ok(VerifyOutcome::Rejected(message)) => self.error(message.clone()),
            Ok(VerifyOutcome::Stale) | Err(_) => {}
        }
        outcome
    }

    pub async fn resend_otp(&mut self) -> Result<ResendOutcome, OtpError> {
        self.otp.snapshot().await.check_resend()?;
        self.loading(LOADING_RESEND_OTP, true);
        let outcome = self.otp.resend().await;
        self.loading(LOADING_RESEND_OTP, false);

        match &outcome {
            Ok(ResendOutcome::Resent { .. }) => self.notice("OTP resent!"),
            Ok(ResendOutcome::Failed(message)) => self.error(message.clone()),
            Ok(ResendOutcome::Stale) | Err(_) => {}
        }
        outcome
    }

    /// Closes the OTP modal; the user stays on the sign-up screen.
    pub async fn cancel_otp(&mut self) {
        if self.otp.cancel().await {
            self.navigate(Screen::SignUp);
        }
    }

    pub async fn refresh_profile(&mut self) -> Result<UserProfile> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| anyhow!("not signed in"))?;
        let profile = session.refresh_profile(self.service.as_ref()).await?;
        Ok(profile.clone())
    }

    fn navigate(&mut self, screen: Screen) {
        if self.screen == screen {
            return;
        }
        info!(from = ?self.screen, to = ?screen, "navigate");
        self.screen = screen;
        let _ = self.events.send(FlowEvent::ScreenChanged(screen));
    }

    fn loading(&self, label: &'static str, active: bool) {
        let _ = self.events.send(FlowEvent::Loading { label, active });
    }

    fn notice(&self, message: &str) {
        let _ = self.events.send(FlowEvent::Notice(message.to_string()));
    }

    fn error(&self, message: String) {
        let _ = self.events.send(FlowEvent::Error(message));
    }
}

#[cfg(test)]
#[path = "tests/flow_tests.rs"]
mod tests;
