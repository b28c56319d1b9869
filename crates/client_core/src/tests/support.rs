use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::json;
use shared::{
    domain::Field,
    protocol::{
        ApiResult, SignInRequest, SignUpRequest, VerifyOtpRequest, PROFILE_PATH, RESEND_OTP_PATH,
        SIGN_IN_PATH, SIGN_UP_PATH, VERIFY_OTP_PATH,
    },
};
use tokio::sync::{Notify, Semaphore};

use crate::{auth_service::AuthService, error::AuthServiceError, form::SignUpForm};

pub(crate) type Reply = Result<ApiResult, String>;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RecordedCall {
    SignUp(SignUpRequest),
    SignIn(SignInRequest),
    VerifyOtp(VerifyOtpRequest),
    ResendOtp(String),
    FetchProfile(String),
}

/// In-memory [`AuthService`] with replies scripted per endpoint. Unscripted
/// calls succeed with an empty envelope; an `Err` reply becomes a transport
/// failure. A gated service parks every call until `release` is called.
pub(crate) struct ScriptedAuthService {
    replies: Mutex<HashMap<&'static str, VecDeque<Reply>>>,
    calls: Mutex<Vec<RecordedCall>>,
    gate: Option<Semaphore>,
    entered: Notify,
}

impl ScriptedAuthService {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::build(None))
    }

    pub(crate) fn gated() -> Arc<Self> {
        Arc::new(Self::build(Some(Semaphore::new(0))))
    }

    fn build(gate: Option<Semaphore>) -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate,
            entered: Notify::new(),
        }
    }

    pub(crate) fn script(&self, path: &'static str, reply: Reply) {
        self.replies
            .lock()
            .expect("replies lock")
            .entry(path)
            .or_default()
            .push_back(reply);
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Lets `count` parked calls finish.
    pub(crate) fn release(&self, count: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(count);
        }
    }

    /// Resolves once a call has reached the service.
    pub(crate) async fn wait_entered(&self) {
        self.entered.notified().await;
    }

    async fn respond(
        &self,
        path: &'static str,
        call: RecordedCall,
    ) -> Result<ApiResult, AuthServiceError> {
        self.calls.lock().expect("calls lock").push(call);
        self.entered.notify_one();
        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate open").forget();
        }
        let reply = self
            .replies
            .lock()
            .expect("replies lock")
            .get_mut(path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(ApiResult::success(200, "OK", None)));
        reply.map_err(AuthServiceError::Unavailable)
    }
}

#[async_trait]
impl AuthService for ScriptedAuthService {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<ApiResult, AuthServiceError> {
        self.respond(SIGN_UP_PATH, RecordedCall::SignUp(request.clone()))
            .await
    }

    async fn sign_in(&self, request: &SignInRequest) -> Result<ApiResult, AuthServiceError> {
        self.respond(SIGN_IN_PATH, RecordedCall::SignIn(request.clone()))
            .await
    }

    async fn verify_otp(
        &self,
        request: &VerifyOtpRequest,
    ) -> Result<ApiResult, AuthServiceError> {
        self.respond(VERIFY_OTP_PATH, RecordedCall::VerifyOtp(request.clone()))
            .await
    }

    async fn resend_otp(&self, email_address: &str) -> Result<ApiResult, AuthServiceError> {
        self.respond(
            RESEND_OTP_PATH,
            RecordedCall::ResendOtp(email_address.to_string()),
        )
        .await
    }

    async fn fetch_profile(&self, token: &str) -> Result<ApiResult, AuthServiceError> {
        self.respond(PROFILE_PATH, RecordedCall::FetchProfile(token.to_string()))
            .await
    }
}

pub(crate) fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 16).expect("date")
}

pub(crate) fn login_result(token: &str) -> ApiResult {
    ApiResult::success(
        200,
        "Login successful",
        Some(json!({
            "token": token,
            "user": {"userId": 7, "firstName": "Ada", "lastName": "Lovelace", "emailAddress": "ada@example.com"},
        })),
    )
}

pub(crate) fn filled_sign_up_form() -> SignUpForm {
    let mut form = SignUpForm::default();
    form.update_field(Field::FirstName, "Ada").expect("first name");
    form.update_field(Field::LastName, "Lovelace").expect("last name");
    form.update_field(Field::EmailAddress, " Ada@Example.com ")
        .expect("email");
    form.update_field(Field::Password, "analytical")
        .expect("password");
    form.update_field(Field::BirthDate, "1990-03-07")
        .expect("birth date");
    form.update_field(Field::Gender, "female").expect("gender");
    form
}
