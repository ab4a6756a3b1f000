//! Messenger configuration.
//!
//! Loaded from a TOML file (the CLI looks for `cloudmsg.toml`). Every field
//! has a default, so an empty file or a missing section is valid.

use cloudmsg_core::RetryPolicy;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessengerConfig {
    /// Remote service settings.
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Send retry settings.
    #[serde(default)]
    pub send: SendConfig,
    /// Incremental fetch settings.
    #[serde(default)]
    pub fetch: FetchConfig,
}

/// Remote service settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RemoteConfig {
    /// Cloud container identifier (default: "default").
    #[serde(default = "default_container")]
    pub container: String,
}

/// Send retry settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendConfig {
    /// Total attempts per send, including the first (default: 3).
    #[serde(default = "default_send_attempts")]
    pub attempts: u32,
    /// Delay before the first retry in milliseconds (default: 500).
    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,
    /// Cap on the backoff delay in milliseconds (default: 8000).
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

/// Incremental fetch settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchConfig {
    /// Records requested per query page (default: 100).
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,
}

// Default value functions
fn default_container() -> String {
    "default".to_string()
}

fn default_send_attempts() -> u32 {
    3
}

fn default_base_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    8_000
}

fn default_batch_limit() -> u32 {
    100
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            container: default_container(),
        }
    }
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            attempts: default_send_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            batch_limit: default_batch_limit(),
        }
    }
}

impl MessengerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::from_toml_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Retry policy for sends.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.send.attempts,
            Duration::from_millis(self.send.base_backoff_ms),
            Duration::from_millis(self.send.max_backoff_ms),
        )
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}
