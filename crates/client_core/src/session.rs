use anyhow::{anyhow, Context, Result};
use shared::{
    error::ApiException,
    protocol::{ApiResult, LoginResponse, UserProfile},
};

use crate::auth_service::AuthService;

/// Bearer token and user the backend hands out after sign-in or a
/// successful OTP verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub token: String,
    pub user: Option<UserProfile>,
}

impl AuthSession {
    pub fn from_result(result: &ApiResult) -> Option<Self> {
        if !result.flag {
            return None;
        }
        result.decode_data::<LoginResponse>().map(|login| Self {
            token: login.token,
            user: login.user,
        })
    }

    pub async fn refresh_profile(&mut self, service: &dyn AuthService) -> Result<&UserProfile> {
        let result = service
            .fetch_profile(&self.token)
            .await
            .context("failed to fetch user profile")?;
        if !result.flag {
            return Err(ApiException::from(result.to_error()).into());
        }
        let profile = result
            .decode_data::<UserProfile>()
            .ok_or_else(|| anyhow!("profile response carried no user"))?;
        Ok(self.user.insert(profile))
    }

    pub fn display_name(&self) -> Option<String> {
        self.user.as_ref().map(UserProfile::display_name)
    }
}
