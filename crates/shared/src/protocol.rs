use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::{
    domain::{Field, UserId},
    error::{ApiError, ErrorCode},
};

pub const SIGN_UP_PATH: &str = "/auth/signup";
pub const SIGN_IN_PATH: &str = "/auth/signin";
pub const VERIFY_OTP_PATH: &str = "/auth/verify-otp";
pub const RESEND_OTP_PATH: &str = "/auth/resend-otp";
pub const PROFILE_PATH: &str = "/auth/me";

/// Envelope returned by every auth endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResult {
    pub flag: bool,
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ApiResult {
    pub fn success(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            flag: true,
            code,
            message: message.into(),
            data,
        }
    }

    pub fn failure(code: i32, message: impl Into<String>) -> Self {
        Self {
            flag: false,
            code,
            message: message.into(),
            data: None,
        }
    }

    /// The server message, if it carries anything worth showing.
    pub fn message_text(&self) -> Option<&str> {
        let message = self.message.trim();
        (!message.is_empty()).then_some(message)
    }

    pub fn to_error(&self) -> ApiError {
        ApiError::new(
            ErrorCode::from_status(self.code),
            self.message_text().unwrap_or("Unknown error"),
        )
    }

    pub fn decode_data<T: DeserializeOwned>(&self) -> Option<T> {
        self.data
            .as_ref()
            .and_then(|data| serde_json::from_value(data.clone()).ok())
    }

    /// Field-scoped messages a failed response carries in `data`, e.g.
    /// `{"password": "Invalid password"}`. Unknown keys are skipped.
    pub fn field_errors(&self) -> Vec<(Field, String)> {
        if self.flag {
            return Vec::new();
        }
        let Some(Value::Object(map)) = &self.data else {
            return Vec::new();
        };
        map.iter()
            .filter_map(|(key, value)| {
                let field = Field::from_wire_name(key)?;
                let message = value.as_str()?.trim();
                (!message.is_empty()).then(|| (field, message.to_string()))
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub password: String,
    pub birth_date: NaiveDate,
    pub gender: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub email_address: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub email_address: String,
    pub otp: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResendOtpQuery {
    pub email_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(alias = "emailId")]
    pub email_address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
}

impl UserProfile {
    pub fn display_name(&self) -> String {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => format!("{first} {last}"),
            (Some(first), None) => first.to_string(),
            (None, Some(last)) => last.to_string(),
            (None, None) => self.email_address.clone(),
        }
    }
}

/// `data` of a successful sign-in or OTP verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserProfile>,
}
