use std::env;
use std::time::Duration;

use crate::errors::AppError;
use crate::services::mls::RetryPolicy;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub port: u16,
    pub database_url: String,
    pub admin_token: String,
    pub api_token: String,
    pub cron_secret: String,
    pub site_url: String,
    pub mls_base_url: String,
    pub mls_property_token: String,
    pub mls_media_token: String,
    pub mls_sold_token: String,
    pub mls_max_retries: u32,
    pub mls_base_delay_ms: u64,
    pub mls_max_delay_ms: u64,
    pub mls_jitter_ms: u64,
    pub email_api_url: String,
    pub email_api_key: String,
    pub email_from: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Builds the config from any variable source. Unset secrets stay empty,
    /// which keeps the routes they guard locked.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let string = |key: &str| var(key).unwrap_or_default();
        let or = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());
        // Property and PropertySold fall back to the shared key when no
        // per-resource key is configured.
        let mls_token = |key: &str| var(key).or_else(|| var("MLS_API_KEY")).unwrap_or_default();

        Self {
            port: parse_var(&var, "PORT", 3000),
            database_url: or("DATABASE_URL", "condowatch.db"),
            admin_token: string("ADMIN_TOKEN"),
            api_token: string("API_TOKEN"),
            cron_secret: string("CRON_SECRET"),
            site_url: or("SITE_URL", "http://localhost:3000"),
            mls_base_url: or("MLS_BASE_URL", "https://api.mlsgrid.com/v2"),
            mls_property_token: mls_token("MLS_PROPERTY_TOKEN"),
            mls_media_token: mls_token("MLS_MEDIA_TOKEN"),
            mls_sold_token: mls_token("MLS_SOLD_TOKEN"),
            mls_max_retries: parse_var(&var, "MLS_MAX_RETRIES", 3),
            mls_base_delay_ms: parse_var(&var, "MLS_BASE_DELAY_MS", 500),
            mls_max_delay_ms: parse_var(&var, "MLS_MAX_DELAY_MS", 8_000),
            mls_jitter_ms: parse_var(&var, "MLS_JITTER_MS", 250),
            email_api_url: or("EMAIL_API_URL", "https://api.resend.com"),
            email_api_key: string("EMAIL_API_KEY"),
            email_from: string("EMAIL_FROM"),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.mls_max_retries,
            base_delay: Duration::from_millis(self.mls_base_delay_ms),
            max_delay: Duration::from_millis(self.mls_max_delay_ms),
            jitter: Duration::from_millis(self.mls_jitter_ms),
        }
    }

    pub fn require_digest_settings(&self) -> Result<(), AppError> {
        let missing: Vec<&str> = [
            ("MLS_PROPERTY_TOKEN", &self.mls_property_token),
            ("MLS_SOLD_TOKEN", &self.mls_sold_token),
            ("EMAIL_API_KEY", &self.email_api_key),
            ("EMAIL_FROM", &self.email_from),
        ]
        .iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| *name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AppError::Config(format!("missing {}", missing.join(", "))))
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    var(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
