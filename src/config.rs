use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_API_VERSION: &str = "v1";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is not a valid {expected}: {value}")]
    Invalid {
        key: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Client-side environment configuration. The pipeline consumes this
/// read-only; it never mutates it.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the REST backend, including any path prefix
    /// (e.g. `https://hrm.example.com/api`).
    pub api_base_url: String,
    pub api_version: String,
    pub request_timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    /// Where durable client state (tokens, session snapshot) is kept.
    /// `None` selects the in-memory backend.
    pub storage_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_BASE_DELAY_MS),
            storage_path: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let api_base_url =
            env::var("HRM_API_BASE_URL").map_err(|_| ConfigError::Missing("HRM_API_BASE_URL"))?;

        let api_version =
            env::var("HRM_API_VERSION").unwrap_or_else(|_| DEFAULT_API_VERSION.to_string());

        let request_timeout = Duration::from_secs(parse_env_u64(
            "HRM_REQUEST_TIMEOUT_SECS",
            DEFAULT_TIMEOUT_SECS,
        )?);

        let retry_max_attempts =
            parse_env_u64("HRM_RETRY_MAX_ATTEMPTS", u64::from(DEFAULT_RETRY_MAX_ATTEMPTS))? as u32;

        let retry_base_delay = Duration::from_millis(parse_env_u64(
            "HRM_RETRY_BASE_DELAY_MS",
            DEFAULT_RETRY_BASE_DELAY_MS,
        )?);

        let storage_path = env::var("HRM_STORAGE_PATH").ok().map(PathBuf::from);

        Ok(Self {
            api_base_url,
            api_version,
            request_timeout,
            retry_max_attempts,
            retry_base_delay,
            storage_path,
        })
    }
}

fn parse_env_u64(key: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
            key,
            expected: "unsigned integer",
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
