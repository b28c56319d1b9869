use std::{future::Future, sync::Arc};

use chrono::NaiveDate;
use shared::protocol::ApiResult;
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{
    auth_service::AuthService,
    error::{classify_remote_failure, AuthServiceError},
    form::{SignInForm, SignUpForm},
    session::AuthSession,
    validation::{ValidationErrors, ValidationRules},
    FlowEvent, Screen, LOADING_SIGN_IN, LOADING_SIGN_UP,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Client-side validation failed; nothing was sent.
    Invalid(ValidationErrors),
    /// The request went out and failed; the message is ready to show.
    Rejected(String),
    Accepted {
        next: Screen,
        session: Option<AuthSession>,
    },
}

/// Validates a form and submits it, one request per submit action.
pub struct FormController {
    service: Arc<dyn AuthService>,
    rules: ValidationRules,
    errors: ValidationErrors,
    loading: bool,
    last_error: Option<String>,
    events: broadcast::Sender<FlowEvent>,
}

impl FormController {
    pub fn new(
        service: Arc<dyn AuthService>,
        rules: ValidationRules,
        events: broadcast::Sender<FlowEvent>,
    ) -> Self {
        Self {
            service,
            rules,
            errors: ValidationErrors::new(),
            loading: false,
            last_error: None,
            events,
        }
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub async fn submit_sign_up(&mut self, form: &SignUpForm, today: NaiveDate) -> SubmitOutcome {
        self.last_error = None;
        self.errors = form.validate(today, self.rules);
        let request = match form.to_request() {
            Some(request) if self.errors.is_valid() => request,
            _ => return self.invalid(),
        };

        let service = Arc::clone(&self.service);
        let result = self
            .run_request(LOADING_SIGN_UP, service.sign_up(&request))
            .await;

        match result {
            Ok(res) if res.flag => {
                info!(email = %request.email_address, "sign-up accepted; awaiting otp");
                SubmitOutcome::Accepted {
                    next: Screen::VerifyOtp,
                    session: None,
                }
            }
            Ok(res) => self.server_rejection("Signup", &res),
            Err(err) => self.transport_failure("sign-up", &err),
        }
    }

    pub async fn submit_sign_in(&mut self, form: &SignInForm) -> SubmitOutcome {
        self.last_error = None;
        self.errors = form.validate();
        if !self.errors.is_valid() {
            return self.invalid();
        }

        let request = form.to_request();
        let service = Arc::clone(&self.service);
        let result = self
            .run_request(LOADING_SIGN_IN, service.sign_in(&request))
            .await;

        match result {
            Ok(res) if res.flag => {
                info!(email = %request.email_address, "signed in");
                SubmitOutcome::Accepted {
                    next: Screen::Home,
                    session: AuthSession::from_result(&res),
                }
            }
            Ok(res) => self.server_rejection("Signin", &res),
            Err(err) => self.transport_failure("sign-in", &err),
        }
    }

    async fn run_request<F>(
        &mut self,
        label: &'static str,
        request: F,
    ) -> Result<ApiResult, AuthServiceError>
    where
        F: Future<Output = Result<ApiResult, AuthServiceError>>,
    {
        let _loading = LoadingScope::enter(self, label);
        request.await
    }

    fn set_loading(&mut self, label: &'static str, active: bool) {
        self.loading = active;
        let _ = self.events.send(FlowEvent::Loading { label, active });
    }

    fn invalid(&self) -> SubmitOutcome {
        let _ = self.events.send(FlowEvent::FieldErrors(self.errors.clone()));
        SubmitOutcome::Invalid(self.errors.clone())
    }

    fn server_rejection(&mut self, action: &str, res: &ApiResult) -> SubmitOutcome {
        let field_errors = res.field_errors();
        if !field_errors.is_empty() {
            for (field, message) in field_errors {
                self.errors.insert(field, message);
            }
            let _ = self.events.send(FlowEvent::FieldErrors(self.errors.clone()));
        }
        warn!(code = res.code, message = %res.message, "{action} rejected by server");
        self.reject(format!(
            "{action} failed: {}",
            res.message_text().unwrap_or("Unknown error")
        ))
    }

    fn transport_failure(&mut self, action: &str, err: &AuthServiceError) -> SubmitOutcome {
        warn!(%err, "{action} request failed");
        self.reject(classify_remote_failure(&err.to_string()))
    }

    fn reject(&mut self, message: String) -> SubmitOutcome {
        self.last_error = Some(message.clone());
        let _ = self.events.send(FlowEvent::Error(message.clone()));
        SubmitOutcome::Rejected(message)
    }
}

/// Raises the loading flag for its lifetime. Dropping it clears the flag,
/// including when the submit future itself is dropped mid-request.
struct LoadingScope<'a> {
    controller: &'a mut FormController,
    label: &'static str,
}

impl<'a> LoadingScope<'a> {
    fn enter(controller: &'a mut FormController, label: &'static str) -> Self {
        controller.set_loading(label, true);
        Self { controller, label }
    }
}

impl Drop for LoadingScope<'_> {
    fn drop(&mut self) {
        self.controller.set_loading(self.label, false);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
