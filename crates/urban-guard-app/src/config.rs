//! Runtime configuration read from the process environment.

use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use thiserror::Error;
use urban_guard_auth::FileTokenStorage;
use urban_guard_core::{ApiBase, CoreError};

/// Base URL of the identity and classification services.
pub const API_URL_VAR: &str = "URBAN_GUARD_API_URL";
/// Per-request timeout in whole seconds.
pub const TIMEOUT_VAR: &str = "URBAN_GUARD_TIMEOUT_SECS";
/// Directory holding the token file and logs.
pub const DATA_DIR_VAR: &str = "URBAN_GUARD_DATA_DIR";
/// Tracing filter directive.
pub const LOG_VAR: &str = "URBAN_GUARD_LOG";

/// Service base used when none is configured.
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
/// Timeout used when none is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Filter used when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

const FALLBACK_DATA_DIR: &str = ".urban-guard";

/// Validated client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Service base URL.
    pub api_base: ApiBase,
    /// Upper bound for each remote call.
    pub request_timeout: Duration,
    /// Directory for the token file and logs.
    pub data_dir: PathBuf,
    /// Tracing filter directive.
    pub log_filter: String,
}

impl ClientConfig {
    /// Reads configuration from the process environment.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`; unset or blank values fall back
    /// to defaults.
    ///
    /// # Errors
    /// Returns [`ConfigError`] when a value is present but invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let api_base = ApiBase::parse(read(API_URL_VAR).as_deref().unwrap_or(DEFAULT_API_URL))?;

        let request_timeout = match read(TIMEOUT_VAR) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(seconds) if seconds > 0 => Duration::from_secs(seconds),
                _ => return Err(ConfigError::InvalidTimeout(raw)),
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let data_dir = read(DATA_DIR_VAR)
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let log_filter = read(LOG_VAR).unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        Ok(Self {
            api_base,
            request_timeout,
            data_dir,
            log_filter,
        })
    }

    /// Token storage rooted in the data directory.
    pub fn token_storage(&self) -> FileTokenStorage {
        FileTokenStorage::in_dir(&self.data_dir)
    }

    /// Directory for per-run log files.
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Returns `true` when credentials would cross the network unencrypted.
    pub fn sends_plaintext_credentials(&self) -> bool {
        let url = self.api_base.as_url();
        url.scheme() == "http"
            && !matches!(
                url.host_str(),
                Some("localhost" | "127.0.0.1" | "[::1]")
            )
    }
}

fn default_data_dir() -> PathBuf {
    ProjectDirs::from("", "", "urban-guard")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(FALLBACK_DATA_DIR))
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Base URL failed validation.
    #[error("URBAN_GUARD_API_URL: {0}")]
    InvalidApiUrl(#[from] CoreError),
    /// Timeout was not a positive integer.
    #[error("URBAN_GUARD_TIMEOUT_SECS must be a positive number of seconds, got '{0}'")]
    InvalidTimeout(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for environment parsing.

    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).expect("defaults should be valid");
        assert_eq!(config.api_base.as_url().as_str(), "http://localhost:8000/");
        assert_eq!(config.request_timeout, Duration::from_secs(DEFAULT_TIMEOUT_SECS));
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
        assert!(!config.sends_plaintext_credentials());
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(TIMEOUT_VAR, "0")])),
            Err(ConfigError::InvalidTimeout(_))
        ));
        assert!(matches!(
            ClientConfig::from_lookup(lookup(&[(API_URL_VAR, "ftp://files.example.test")])),
            Err(ConfigError::InvalidApiUrl(_))
        ));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            (API_URL_VAR, "http://guard.example.test/api"),
            (TIMEOUT_VAR, " 5 "),
            (DATA_DIR_VAR, "/tmp/urban-guard-test"),
        ]))
        .expect("config should be valid");
        assert_eq!(config.request_timeout, Duration::from_secs(5));
        assert!(config.sends_plaintext_credentials());
        assert!(config.token_storage().path().starts_with("/tmp/urban-guard-test"));
    }
}
