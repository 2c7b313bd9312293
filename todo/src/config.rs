//! Configuration for the task store.
//!
//! Settings come from `TODO_*` environment variables with defaults for
//! everything, so an empty environment yields a working local setup.
//!
//! | Variable                  | Default                     |
//! |---------------------------|-----------------------------|
//! | `TODO_STORAGE_STRATEGY`   | `local`                     |
//! | `TODO_AUTO_SWITCH`        | `true`                      |
//! | `TODO_LOCAL_DIR`          | `./.todo-data`              |
//! | `TODO_LOCAL_KEY`          | `todos`                     |
//! | `TODO_LOCAL_QUOTA_BYTES`  | `5242880` (`0` = unlimited) |
//! | `TODO_API_URL`            | `http://localhost:3000/api` |
//! | `TODO_API_TIMEOUT_MS`     | `10000`                     |
//! | `TODO_API_RETRY_COUNT`    | `3`                         |
//! | `TODO_API_RETRY_DELAY_MS` | `1000`                      |
//! | `TODO_API_TOKEN`          | unset (secret)              |
//! | `TODO_LOG_LEVEL`          | `info`                      |
//!
//! # Example
//!
//! ```no_run
//! use todo::config::TodoConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TodoConfig::from_env()?;
//! println!("Storage: {}", config.storage.strategy);
//! # Ok(())
//! # }
//! ```

use crate::storage::local::{DEFAULT_KEY, DEFAULT_QUOTA_BYTES};
use crate::storage::{RemoteConfig, StrategyKind};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed
    #[error("invalid value for {var}: {message}")]
    InvalidValue {
        /// Variable name
        var: &'static str,
        /// What was wrong
        message: String,
    },

    /// Configuration validation failed
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Strategy tried first
    pub strategy: StrategyKind,
    /// Fall back to the other strategy on failure
    pub auto_switch: bool,
    /// Directory of the local snapshot
    pub local_dir: PathBuf,
    /// Snapshot key (file stem)
    pub local_key: String,
    /// Local snapshot size limit; `0` disables it
    pub local_quota_bytes: u64,
    /// Remote API root
    pub api_url: String,
    /// Per-request timeout in milliseconds
    pub api_timeout_ms: u64,
    /// Retries for transport failures
    pub api_retry_count: usize,
    /// Pause between retries in milliseconds
    pub api_retry_delay_ms: u64,
    /// Bearer token for the remote API
    #[serde(skip)]
    pub api_token: Option<String>,
}

impl StorageConfig {
    /// Validate storage configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_key.trim().is_empty() {
            return Err(ConfigError::Validation("local_key cannot be empty".to_string()));
        }
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "api_url must start with http:// or https://, got {}",
                self.api_url
            )));
        }
        if self.api_timeout_ms == 0 {
            return Err(ConfigError::Validation("api_timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }

    /// Local quota, `None` when unlimited
    #[must_use]
    pub const fn local_quota(&self) -> Option<u64> {
        if self.local_quota_bytes == 0 {
            None
        } else {
            Some(self.local_quota_bytes)
        }
    }

    /// Settings for the remote strategy
    #[must_use]
    pub fn remote(&self) -> RemoteConfig {
        RemoteConfig {
            base_url: self.api_url.clone(),
            timeout: Duration::from_millis(self.api_timeout_ms),
            retry_count: self.api_retry_count,
            retry_delay: Duration::from_millis(self.api_retry_delay_ms),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let remote = RemoteConfig::default();
        Self {
            strategy: StrategyKind::Local,
            auto_switch: true,
            local_dir: PathBuf::from("./.todo-data"),
            local_key: DEFAULT_KEY.to_string(),
            local_quota_bytes: DEFAULT_QUOTA_BYTES,
            api_url: remote.base_url,
            api_timeout_ms: 10_000,
            api_retry_count: remote.retry_count,
            api_retry_delay_ms: 1_000,
            api_token: None,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl ObservabilityConfig {
    /// Validate observability configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ConfigError::Validation(format!(
                "invalid log_level: {}. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }
        Ok(())
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoConfig {
    /// Persistence settings
    pub storage: StorageConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

impl TodoConfig {
    /// Load configuration from `TODO_*` environment variables
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or validation fails
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through `lookup`, which returns a variable's value
    ///
    /// # Errors
    ///
    /// Returns error if a variable cannot be parsed or validation fails
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let storage = &mut config.storage;

        if let Some(strategy) = parse(&lookup, "TODO_STORAGE_STRATEGY")? {
            storage.strategy = strategy;
        }
        if let Some(auto_switch) = lookup("TODO_AUTO_SWITCH") {
            storage.auto_switch = parse_bool("TODO_AUTO_SWITCH", &auto_switch)?;
        }
        if let Some(dir) = lookup("TODO_LOCAL_DIR") {
            storage.local_dir = PathBuf::from(dir);
        }
        if let Some(key) = lookup("TODO_LOCAL_KEY") {
            storage.local_key = key;
        }
        if let Some(quota) = parse(&lookup, "TODO_LOCAL_QUOTA_BYTES")? {
            storage.local_quota_bytes = quota;
        }
        if let Some(url) = lookup("TODO_API_URL") {
            storage.api_url = url;
        }
        if let Some(timeout) = parse(&lookup, "TODO_API_TIMEOUT_MS")? {
            storage.api_timeout_ms = timeout;
        }
        if let Some(retries) = parse(&lookup, "TODO_API_RETRY_COUNT")? {
            storage.api_retry_count = retries;
        }
        if let Some(delay) = parse(&lookup, "TODO_API_RETRY_DELAY_MS")? {
            storage.api_retry_delay_ms = delay;
        }
        storage.api_token = lookup("TODO_API_TOKEN").filter(|t| !t.trim().is_empty());

        if let Some(level) = lookup("TODO_LOG_LEVEL") {
            config.observability.log_level = level;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate all configuration sections
    ///
    /// # Errors
    ///
    /// Returns error if any section is invalid
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.storage.validate()?;
        self.observability.validate()?;
        Ok(())
    }
}

fn parse<T, F>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(var)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
                var,
                message: e.to_string(),
            })
        })
        .transpose()
}

fn parse_bool(var: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            var,
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
