//! Application configuration parsed from environment variables.

use std::time::Duration;

use crate::error::ErrorCode;
use crate::identity::SupabaseConfig;
use crate::identity::supabase::IdentityTimeouts;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_GUARD_SESSION_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    Missing(&'static str),
    #[error("invalid value for {var}: {value}")]
    Invalid { var: &'static str, value: String },
}

impl ErrorCode for ConfigError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Missing(_) => "E_CONFIG_MISSING",
            Self::Invalid { .. } => "E_CONFIG_INVALID",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Test,
    Production,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    pub env: AppEnv,
    pub cookie_secure: bool,
    pub guard_timeout: Duration,
    pub session_idle_ttl: Duration,
    pub supabase: SupabaseConfig,
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Required:
    /// - `SUPABASE_URL`
    /// - `SUPABASE_ANON_KEY`
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `APP_ENV`: `development` (default), `test`, or `production`
    /// - `COOKIE_SECURE`: defaults to true in production only
    /// - `GUARD_SESSION_TIMEOUT_MS`: default 10000
    /// - `SESSION_IDLE_TTL_SECS`: default 86400
    /// - `IDENTITY_REQUEST_TIMEOUT_SECS`: default 10
    /// - `IDENTITY_CONNECT_TIMEOUT_SECS`: default 5
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = required("SUPABASE_URL")?;
        let anon_key = required("SUPABASE_ANON_KEY")?;
        let env = parse_app_env(std::env::var("APP_ENV").ok().as_deref())?;
        let cookie_secure = match std::env::var("COOKIE_SECURE") {
            Ok(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid { var: "COOKIE_SECURE", value: raw })?,
            Err(_) => env == AppEnv::Production,
        };

        Ok(Self {
            port: env_parse("PORT", DEFAULT_PORT)?,
            env,
            cookie_secure,
            guard_timeout: Duration::from_millis(env_parse("GUARD_SESSION_TIMEOUT_MS", DEFAULT_GUARD_SESSION_TIMEOUT_MS)?),
            session_idle_ttl: Duration::from_secs(env_parse("SESSION_IDLE_TTL_SECS", DEFAULT_SESSION_IDLE_TTL_SECS)?),
            supabase: SupabaseConfig {
                url: url.trim_end_matches('/').to_owned(),
                anon_key,
                timeouts: IdentityTimeouts {
                    request_secs: env_parse("IDENTITY_REQUEST_TIMEOUT_SECS", DEFAULT_IDENTITY_REQUEST_TIMEOUT_SECS)?,
                    connect_secs: env_parse("IDENTITY_CONNECT_TIMEOUT_SECS", DEFAULT_IDENTITY_CONNECT_TIMEOUT_SECS)?,
                },
            },
        })
    }
}

fn required(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(var)),
    }
}

fn env_parse<T: std::str::FromStr>(var: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Invalid { var, value: raw }),
        Err(_) => Ok(default),
    }
}

pub(crate) fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_app_env(raw: Option<&str>) -> Result<AppEnv, ConfigError> {
    match raw.map(str::trim).unwrap_or("development") {
        "development" => Ok(AppEnv::Development),
        "test" => Ok(AppEnv::Test),
        "production" => Ok(AppEnv::Production),
        other => Err(ConfigError::Invalid { var: "APP_ENV", value: other.to_owned() }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
