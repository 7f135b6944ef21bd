//! Store configuration.
//!
//! # Responsibility
//! - Describe where the store lives and how it is bootstrapped.
//! - Load that description from JSON text or a JSON file.
//!
//! # Invariants
//! - Every field has a default, so `{}` is a valid configuration.
//! - A validated config has `schema_version >= 1` and, when set, an absolute
//!   `log_dir`.

use crate::db::schema::DEFAULT_SCHEMA_VERSION;
use crate::logging::default_log_level;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Busy timeout applied to the writable connection.
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Configuration loading errors.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

/// Bootstrap settings for one store.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Store file. `None` selects an in-memory store.
    pub db_path: Option<PathBuf>,
    /// Version stamped into `PRAGMA user_version` after provisioning.
    pub schema_version: u32,
    pub busy_timeout_ms: u64,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files. `None` disables file logs.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            schema_version: DEFAULT_SCHEMA_VERSION,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            log_level: default_log_level().to_string(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// In-memory store with default settings.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed store with default settings.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Parses and validates a JSON config document.
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version == 0 {
            return Err(ConfigError::Invalid(
                "schema_version must be at least 1".to_string(),
            ));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, StoreConfig, DEFAULT_BUSY_TIMEOUT_MS};
    use std::path::PathBuf;

    #[test]
    fn empty_document_uses_defaults() {
        let config = StoreConfig::from_json_str("{}").expect("empty config should parse");
        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.db_path, None);
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
    }

    #[test]
    fn parses_explicit_fields() {
        let config = StoreConfig::from_json_str(
            r#"{"db_path": "/tmp/store.sqlite3", "schema_version": 3, "log_level": "warn"}"#,
        )
        .expect("config should parse");
        assert_eq!(config.db_path, Some(PathBuf::from("/tmp/store.sqlite3")));
        assert_eq!(config.schema_version, 3);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn rejects_zero_schema_version_and_relative_log_dir() {
        let err = StoreConfig::from_json_str(r#"{"schema_version": 0}"#)
            .expect_err("zero version must fail");
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = StoreConfig::from_json_str(r#"{"log_dir": "logs"}"#)
            .expect_err("relative log dir must fail");
        assert!(err.to_string().contains("absolute"));
    }

    #[test]
    fn reports_malformed_json() {
        let err = StoreConfig::from_json_str("{").expect_err("malformed json must fail");
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
