use secrecy::SecretString;
use std::time::Duration;
use url::Url;

use crate::error::{Result, SyncError};

pub const API_KEY_VAR: &str = "FIVETRAN_API_KEY";
pub const API_SECRET_VAR: &str = "FIVETRAN_API_SECRET";
pub const BASE_URL_VAR: &str = "FIVETRAN_BASE_URL";
pub const TIMEOUT_VAR: &str = "FIVETRAN_TIMEOUT_SECS";

pub const DEFAULT_BASE_URL: &str = "https://api.fivetran.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Basic-auth credential pair for the schema service.
#[derive(Debug)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: SecretString,
}

/// Everything needed to build a [`crate::client::SchemaClient`].
#[derive(Debug)]
pub struct Config {
    pub credentials: Credentials,
    pub base_url: Url,
    /// Applied to every remote call.
    pub timeout: Duration,
}

impl Config {
    pub fn new(api_key: &str, api_secret: &str, base_url: Url) -> Self {
        Self {
            credentials: Credentials {
                api_key: api_key.to_string(),
                api_secret: SecretString::from(api_secret.to_string()),
            },
            base_url,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read settings from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from an arbitrary variable lookup. Missing or empty
    /// credentials fail here, before any request is made.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> Result<String> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| SyncError::config(format!("{} is not set", name)))
        };
        let api_key = required(API_KEY_VAR)?;
        let api_secret = required(API_SECRET_VAR)?;

        let raw_url = lookup(BASE_URL_VAR).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let base_url = Url::parse(raw_url.trim())
            .map_err(|e| SyncError::config(format!("{} {:?} is invalid: {}", BASE_URL_VAR, raw_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(SyncError::config(format!(
                "{} {:?} cannot be used as a base URL",
                BASE_URL_VAR, raw_url
            )));
        }

        let timeout = match lookup(TIMEOUT_VAR) {
            None => DEFAULT_TIMEOUT,
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(SyncError::config(format!(
                        "{} must be a positive number of seconds, got {:?}",
                        TIMEOUT_VAR, raw
                    )))
                }
            },
        };

        Ok(Self::new(&api_key, &api_secret, base_url).with_timeout(timeout))
    }
}
