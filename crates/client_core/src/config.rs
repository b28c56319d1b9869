use std::{collections::HashMap, fs, path::Path, time::Duration};

use anyhow::{anyhow, Context};
use url::Url;

pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub otp_initial_cooldown_secs: u32,
    pub otp_resend_cooldown_secs: u32,
    pub minimum_age_years: u32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8080/api".into(),
            request_timeout_secs: 15,
            otp_initial_cooldown_secs: 61,
            otp_resend_cooldown_secs: 100,
            minimum_age_years: 13,
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the optional settings file, then environment overrides.
pub fn load_settings_from(
    path: &Path,
    env: impl Fn(&str) -> Option<String>,
) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, toml::Value>>(&raw) {
            Ok(file_cfg) => apply_file_values(&mut settings, &file_cfg),
            Err(error) => {
                tracing::warn!(path = %path.display(), %error, "ignoring malformed settings file")
            }
        }
    }

    apply_env_overrides(&mut settings, env);
    settings
}

fn apply_file_values(settings: &mut ClientSettings, file_cfg: &HashMap<String, toml::Value>) {
    if let Some(v) = file_cfg.get("api_base_url").and_then(toml::Value::as_str) {
        settings.api_base_url = v.to_string();
    }
    if let Some(v) = file_cfg.get("request_timeout_secs").and_then(as_u64) {
        settings.request_timeout_secs = v;
    }
    if let Some(v) = file_cfg.get("otp_initial_cooldown_secs").and_then(as_u32) {
        settings.otp_initial_cooldown_secs = v;
    }
    if let Some(v) = file_cfg.get("otp_resend_cooldown_secs").and_then(as_u32) {
        settings.otp_resend_cooldown_secs = v;
    }
    if let Some(v) = file_cfg.get("minimum_age_years").and_then(as_u32) {
        settings.minimum_age_years = v;
    }
}

fn as_u64(value: &toml::Value) -> Option<u64> {
    value.as_integer().and_then(|v| u64::try_from(v).ok())
}

fn as_u32(value: &toml::Value) -> Option<u32> {
    value.as_integer().and_then(|v| u32::try_from(v).ok())
}

fn apply_env_overrides(settings: &mut ClientSettings, env: impl Fn(&str) -> Option<String>) {
    if let Some(v) = env("API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(parsed) = env("APP__REQUEST_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
        settings.request_timeout_secs = parsed;
    }
    if let Some(parsed) = env("APP__OTP_INITIAL_COOLDOWN_SECS").and_then(|v| v.parse().ok()) {
        settings.otp_initial_cooldown_secs = parsed;
    }
    if let Some(parsed) = env("APP__OTP_RESEND_COOLDOWN_SECS").and_then(|v| v.parse().ok()) {
        settings.otp_resend_cooldown_secs = parsed;
    }
    if let Some(parsed) = env("APP__MINIMUM_AGE_YEARS").and_then(|v| v.parse().ok()) {
        settings.minimum_age_years = parsed;
    }
}

pub fn prepare_api_base_url(raw_api_base_url: &str) -> anyhow::Result<String> {
    let normalized = normalize_api_base_url(raw_api_base_url);
    let parsed = Url::parse(&normalized)
        .with_context(|| format!("invalid api base url '{raw_api_base_url}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(anyhow!(
            "unsupported scheme '{}' in api base url '{raw_api_base_url}'",
            parsed.scheme()
        ));
    }
    Ok(normalized)
}

fn normalize_api_base_url(raw_api_base_url: &str) -> String {
    let raw_api_base_url = raw_api_base_url.trim();

    if raw_api_base_url.is_empty() {
        return ClientSettings::default().api_base_url;
    }

    let trimmed = raw_api_base_url.trim_end_matches('/');
    if trimmed.contains("://") {
        return trimmed.to_string();
    }

    format!("http://{trimmed}")
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
