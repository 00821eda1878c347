//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use gradebook_core::DEFAULT_PAGE_SIZE;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub api_base_url: String,
    pub push_url: String,
    pub log_level: Level,
    pub login: Option<String>,
    pub password: Option<String>,
    pub page_size: usize,
    pub request_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Endpoints ---
        let api_base_url = required("API_BASE_URL")?;
        let push_url = required("PUSH_URL")?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Credentials (only the CLI needs them) ---
        let login = std::env::var("GRADEBOOK_LOGIN").ok();
        let password = std::env::var("GRADEBOOK_PASSWORD").ok();

        // --- Cache and transport tuning ---
        let page_size = parse_or("PAGE_SIZE", std::env::var("PAGE_SIZE").ok(), DEFAULT_PAGE_SIZE)?;
        if page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "PAGE_SIZE".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let timeout_secs = parse_or(
            "REQUEST_TIMEOUT_SECS",
            std::env::var("REQUEST_TIMEOUT_SECS").ok(),
            30u64,
        )?;

        Ok(Self {
            api_base_url,
            push_url,
            log_level,
            login,
            password,
            page_size,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// The sign-in credentials, or the first variable that is missing.
    pub fn credentials(&self) -> Result<(&str, &str), ConfigError> {
        let login = self
            .login
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("GRADEBOOK_LOGIN".to_string()))?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("GRADEBOOK_PASSWORD".to_string()))?;
        Ok((login, password))
    }
}

fn required(name: &str) -> Result<String, ConfigError> {
    std::env::var(name).map_err(|_| ConfigError::MissingVar(name.to_string()))
}

fn parse_or<T>(name: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_settings_fall_back_to_defaults() {
        assert_eq!(parse_or("PAGE_SIZE", None, 20usize).unwrap(), 20);
        assert_eq!(parse_or("PAGE_SIZE", Some(" 50 ".into()), 20usize).unwrap(), 50);
        assert!(matches!(
            parse_or("PAGE_SIZE", Some("many".into()), 20usize),
            Err(ConfigError::InvalidValue(name, _)) if name == "PAGE_SIZE"
        ));
    }

    #[test]
    fn credentials_name_the_missing_variable() {
        let config = Config {
            api_base_url: "http://localhost:5000/api".into(),
            push_url: "ws://localhost:5000/hub".into(),
            log_level: Level::INFO,
            login: Some("ann".into()),
            password: None,
            page_size: 20,
            request_timeout: Duration::from_secs(30),
        };
        assert!(matches!(
            config.credentials(),
            Err(ConfigError::MissingVar(name)) if name == "GRADEBOOK_PASSWORD"
        ));
    }
}
