use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::protocol::{
    ApiResult, ResendOtpQuery, SignInRequest, SignUpRequest, VerifyOtpRequest, PROFILE_PATH,
    RESEND_OTP_PATH, SIGN_IN_PATH, SIGN_UP_PATH, VERIFY_OTP_PATH,
};
use tracing::debug;

use crate::{
    config::{prepare_api_base_url, ClientSettings},
    error::AuthServiceError,
};

/// The remote authentication service. Every call is a single
/// request/response exchange; a server-reported failure is an `Ok` envelope
/// with `flag == false`, only transport problems are `Err`.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<ApiResult, AuthServiceError>;
    async fn sign_in(&self, request: &SignInRequest) -> Result<ApiResult, AuthServiceError>;
    async fn verify_otp(&self, request: &VerifyOtpRequest)
        -> Result<ApiResult, AuthServiceError>;
    async fn resend_otp(&self, email_address: &str) -> Result<ApiResult, AuthServiceError>;
    async fn fetch_profile(&self, token: &str) -> Result<ApiResult, AuthServiceError>;
}

pub struct HttpAuthService {
    http: Client,
    base_url: String,
}

impl HttpAuthService {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_settings(settings: &ClientSettings) -> anyhow::Result<Self> {
        let base_url = prepare_api_base_url(&settings.api_base_url)?;
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl AuthService for HttpAuthService {
    async fn sign_up(&self, request: &SignUpRequest) -> Result<ApiResult, AuthServiceError> {
        let res = self
            .http
            .post(self.endpoint(SIGN_UP_PATH))
            .json(request)
            .send()
            .await?;
        read_envelope(res).await
    }

    async fn sign_in(&self, request: &SignInRequest) -> Result<ApiResult, AuthServiceError> {
        let res = self
            .http
            .post(self.endpoint(SIGN_IN_PATH))
            .json(request)
            .send()
            .await?;
        read_envelope(res).await
    }

    async fn verify_otp(
        &self,
        request: &VerifyOtpRequest,
    ) -> Result<ApiResult, AuthServiceError> {
        let res = self
            .http
            .post(self.endpoint(VERIFY_OTP_PATH))
            .json(request)
            .send()
            .await?;
        read_envelope(res).await
    }

    async fn resend_otp(&self, email_address: &str) -> Result<ApiResult, AuthServiceError> {
        let res = self
            .http
            .post(self.endpoint(RESEND_OTP_PATH))
            .query(&ResendOtpQuery {
                email_address: email_address.to_string(),
            })
            .send()
            .await?;
        read_envelope(res).await
    }

    async fn fetch_profile(&self, token: &str) -> Result<ApiResult, AuthServiceError> {
        let res = self
            .http
            .get(self.endpoint(PROFILE_PATH))
            .bearer_auth(token)
            .send()
            .await?;
        read_envelope(res).await
    }
}

/// Decodes the `{flag, code, message, data}` envelope. Bodies that are not an
/// envelope fall back to the HTTP status, with the body text as the message.
async fn read_envelope(res: Response) -> Result<ApiResult, AuthServiceError> {
    let status = res.status();
    let body = res.text().await?;

    if let Ok(result) = serde_json::from_str::<ApiResult>(&body) {
        return Ok(result);
    }

    debug!(status = status.as_u16(), "auth response without envelope");
    let code = i32::from(status.as_u16());
    let message = body.trim();
    if status.is_success() {
        return Ok(ApiResult::success(code, message, None));
    }
    let message = if message.is_empty() {
        status.canonical_reason().unwrap_or_default()
    } else {
        message
    };
    Ok(ApiResult::failure(code, message))
}

#[cfg(test)]
#[path = "tests/auth_service_tests.rs"]
mod tests;
