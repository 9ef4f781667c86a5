//! Bootstrap configuration.
//!
//! # Responsibility
//! - Load store locations, deadlines and logging settings from TOML.
//! - Fill every omitted field with a default.
//!
//! # Invariants
//! - Store deadlines are never zero.

use crate::logging::default_log_level;
use crate::repo::audit_store::DEFAULT_AUDIT_DEADLINE;
use crate::repo::item_store::DEFAULT_STORE_DEADLINE;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config `{}`: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration, usually read from `catalog.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CatalogConfig {
    pub database: DatabaseSection,
    pub audit: AuditSection,
    pub logging: LoggingSection,
}

/// The `[database]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseSection {
    pub path: PathBuf,
    pub deadline_ms: u64,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("catalog.sqlite3"),
            deadline_ms: duration_ms(DEFAULT_STORE_DEADLINE),
        }
    }
}

impl DatabaseSection {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// The `[audit]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditSection {
    pub log_file: PathBuf,
    pub deadline_ms: u64,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            log_file: PathBuf::from("audit/logs.jsonl"),
            deadline_ms: duration_ms(DEFAULT_AUDIT_DEADLINE),
        }
    }
}

impl AuditSection {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }
}

/// The `[logging]` section. File logging is off when `dir` is unset.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub level: String,
    pub dir: Option<PathBuf>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level().to_string(),
            dir: None,
        }
    }
}

impl CatalogConfig {
    /// Reads and validates the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.deadline_ms == 0 {
            return Err(ConfigError::Invalid(
                "database.deadline_ms must be greater than zero".to_string(),
            ));
        }
        if self.audit.deadline_ms == 0 {
            return Err(ConfigError::Invalid(
                "audit.deadline_ms must be greater than zero".to_string(),
            ));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database.path cannot be empty".to_string()));
        }
        if self.audit.log_file.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("audit.log_file cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
