//! Client configuration loaded from the environment.

use std::time::Duration;

use thiserror::Error;

use crate::DEFAULT_BASE_URL;

/// Origin used for OAuth callbacks when none is configured.
pub const DEFAULT_APP_ORIGIN: &str = "http://localhost:3000";

const API_BASE_URL: &str = "POSTIVA_API_BASE_URL";
const APP_ORIGIN: &str = "POSTIVA_APP_ORIGIN";
const HTTP_TIMEOUT: &str = "POSTIVA_HTTP_TIMEOUT_SECS";
const CONNECT_TIMEOUT: &str = "POSTIVA_CONNECT_TIMEOUT_SECS";
const STATUS_POLL: &str = "POSTIVA_STATUS_POLL_SECS";

/// Errors raised while loading the configuration.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A URL setting does not start with `http://` or `https://`.
    #[error("{key} must be an http(s) URL, got {value:?}")]
    InvalidUrl {
        /// Environment variable.
        key: &'static str,
        /// Offending value.
        value: String,
    },
    /// A duration setting is not a positive number of seconds.
    #[error("{key} must be a positive number of seconds, got {value:?}")]
    InvalidSeconds {
        /// Environment variable.
        key: &'static str,
        /// Offending value.
        value: String,
    },
    /// The HTTP client could not be built.
    #[error("failed to build the HTTP client: {0}")]
    HttpClient(String),
}

/// Runtime settings of a [`crate::Postiva`] client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend base URL.
    pub api_base_url: String,
    /// Origin of the application, used to build the Google callback URL.
    pub app_origin: String,
    /// Whole-request timeout.
    pub http_timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Interval of [`crate::StatusWatch`].
    pub status_poll_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            app_origin: DEFAULT_APP_ORIGIN.to_string(),
            http_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            status_poll_interval: crate::STATUS_POLL_INTERVAL,
        }
    }
}

impl Config {
    /// Loads the configuration from the process environment, reading a `.env`
    /// file first when one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env file");
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary lookup. Missing keys keep
    /// their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            api_base_url: url_setting(&lookup, API_BASE_URL, defaults.api_base_url)?,
            app_origin: url_setting(&lookup, APP_ORIGIN, defaults.app_origin)?,
            http_timeout: seconds_setting(&lookup, HTTP_TIMEOUT, defaults.http_timeout)?,
            connect_timeout: seconds_setting(&lookup, CONNECT_TIMEOUT, defaults.connect_timeout)?,
            status_poll_interval: seconds_setting(
                &lookup,
                STATUS_POLL,
                defaults.status_poll_interval,
            )?,
        })
    }
}

fn url_setting<F>(lookup: &F, key: &'static str, default: String) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };

    let trimmed = value.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        Ok(trimmed.to_string())
    } else {
        Err(ConfigError::InvalidUrl { key, value })
    }
}

fn seconds_setting<F>(
    lookup: &F,
    key: &'static str,
    default: Duration,
) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };

    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(Duration::from_secs(seconds)),
        _ => Err(ConfigError::InvalidSeconds { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();

        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Config::from_lookup(lookup(&[])).unwrap(), Config::default());
    }

    #[test]
    fn values_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            (API_BASE_URL, "http://127.0.0.1:8000/"),
            (APP_ORIGIN, "https://app.postsiva.com"),
            (STATUS_POLL, "3"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "http://127.0.0.1:8000");
        assert_eq!(config.app_origin, "https://app.postsiva.com");
        assert_eq!(config.status_poll_interval, Duration::from_secs(3));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
    }

    #[test]
    fn invalid_values_are_reported() {
        assert_eq!(
            Config::from_lookup(lookup(&[(API_BASE_URL, "backend.postsiva.com")])),
            Err(ConfigError::InvalidUrl {
                key: API_BASE_URL,
                value: "backend.postsiva.com".to_string(),
            })
        );

        assert!(matches!(
            Config::from_lookup(lookup(&[(HTTP_TIMEOUT, "0")])),
            Err(ConfigError::InvalidSeconds { .. })
        ));
    }
}
