//! Configuration management for the CWA weather query engine
//!
//! Handles loading configuration from files and environment variables,
//! and provides validation for all configuration settings. The API
//! credential itself is treated as an opaque required input; whether it
//! is accepted is only known once the upstream rejects or accepts it.

use crate::{Error, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure for the CWA weather query engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CwaConfig {
    /// Upstream CWA open-data API configuration
    pub upstream: UpstreamConfig,
}

/// Upstream API configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// CWA open-data API key
    pub api_key: Option<String>,
    /// Base URL of the datastore endpoint family
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u32,
    /// Maximum number of retries for transient upstream faults
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Base backoff between retries in milliseconds; doubles per attempt
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

fn default_base_url() -> String {
    "https://opendata.cwa.gov.tw/api/v1/rest/datastore".to_string()
}

fn default_timeout() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff() -> u64 {
    1000
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_seconds: default_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

impl CwaConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        Self::load_from_path(None)
    }

    /// Load configuration from specified path
    pub fn load_from_path(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_file = config_path.unwrap_or_else(|| {
            Self::get_config_path().unwrap_or_else(|| PathBuf::from("config.toml"))
        });

        if config_file.exists() {
            builder = builder.add_source(
                File::from(config_file.clone())
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // Environment overrides, e.g. CWA_UPSTREAM__API_KEY. Nesting
        // uses a double underscore so field names containing an
        // underscore (api_key, max_retries) survive the split.
        builder = builder.add_source(
            Environment::with_prefix("CWA")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to build configuration: {e}")))?;

        let config: CwaConfig = settings
            .try_deserialize()
            .map_err(|e| Error::Config(format!("Failed to deserialize configuration: {e}")))?;

        config.validate()?;

        Ok(config)
    }

    /// Get the default configuration file path
    #[must_use]
    pub fn get_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cwa-weather").join("config.toml"))
    }

    /// Validate all configuration settings
    pub fn validate(&self) -> Result<()> {
        if let Some(api_key) = &self.upstream.api_key {
            if api_key.is_empty() {
                return Err(Error::Config(
                    "API key cannot be empty if provided. Either remove it or provide a valid key."
                        .to_string(),
                ));
            }
            if api_key.len() < 8 {
                return Err(Error::Config(
                    "API key appears to be invalid (too short). Please check your CWA key."
                        .to_string(),
                ));
            }
        }

        if self.upstream.timeout_seconds == 0 || self.upstream.timeout_seconds > 300 {
            return Err(Error::Config(
                "Upstream timeout must be between 1 and 300 seconds".to_string(),
            ));
        }

        if self.upstream.max_retries > 10 {
            return Err(Error::Config(
                "Upstream max retries cannot exceed 10".to_string(),
            ));
        }

        if !self.upstream.base_url.starts_with("http://")
            && !self.upstream.base_url.starts_with("https://")
        {
            return Err(Error::Config(
                "Upstream base URL must be a valid HTTP or HTTPS URL".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CwaConfig::default();
        assert_eq!(
            config.upstream.base_url,
            "https://opendata.cwa.gov.tw/api/v1/rest/datastore"
        );
        assert_eq!(config.upstream.timeout_seconds, 30);
        assert_eq!(config.upstream.max_retries, 2);
        assert_eq!(config.upstream.retry_backoff_ms, 1000);
        assert!(config.upstream.api_key.is_none());
    }

    #[test]
    fn test_validation_accepts_missing_api_key() {
        // Absent key is a client-construction failure, not a config one
        let config = CwaConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_short_api_key() {
        let mut config = CwaConfig::default();
        config.upstream.api_key = Some("abc".to_string());
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("too short"));
    }

    #[test]
    fn test_validation_rejects_bad_timeout() {
        let mut config = CwaConfig::default();
        config.upstream.timeout_seconds = 500;
        assert!(config.validate().is_err());

        config.upstream.timeout_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_non_http_base_url() {
        let mut config = CwaConfig::default();
        config.upstream.base_url = "ftp://opendata.cwa.gov.tw".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides_bind_nested_fields() {
        // SAFETY: test process, no concurrent env access to these keys
        unsafe {
            std::env::set_var("CWA_UPSTREAM__API_KEY", "CWB-ENV-KEY-123456");
            std::env::set_var("CWA_UPSTREAM__MAX_RETRIES", "5");
        }

        let config =
            CwaConfig::load_from_path(Some(PathBuf::from("/nonexistent/config.toml"))).unwrap();

        unsafe {
            std::env::remove_var("CWA_UPSTREAM__API_KEY");
            std::env::remove_var("CWA_UPSTREAM__MAX_RETRIES");
        }

        assert_eq!(
            config.upstream.api_key.as_deref(),
            Some("CWB-ENV-KEY-123456")
        );
        assert_eq!(config.upstream.max_retries, 5);
    }

    #[test]
    fn test_config_path_generation() {
        let path = CwaConfig::get_config_path();
        assert!(path.is_some());
        let path = path.unwrap();
        assert!(path.to_string_lossy().contains("cwa-weather"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
