//! Database configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::ConfigResult;
use crate::validation::{
    validate_enum_choice, validate_positive, validate_required_string, Validatable,
};

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database URL, e.g. `sqlite://loadbench.db?mode=rwc`
    #[serde(default = "default_database_url")]
    pub url: String,

    /// Maximum number of pooled connections, shared by all concurrent runs
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection acquire timeout
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_connection_timeout")]
    pub connection_timeout: Duration,

    /// SQLite-specific configuration
    #[serde(default)]
    pub sqlite: SqliteConfig,

    /// Whether to run migrations automatically on startup
    #[serde(default = "crate::domains::utils::default_true")]
    pub auto_migrate: bool,
}

/// SQLite-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Journal mode
    #[serde(default = "default_sqlite_journal_mode")]
    pub journal_mode: String,

    /// Busy timeout in milliseconds
    #[serde(default = "default_sqlite_busy_timeout")]
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout: default_connection_timeout(),
            sqlite: SqliteConfig::default(),
            auto_migrate: true,
        }
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            journal_mode: default_sqlite_journal_mode(),
            busy_timeout_ms: default_sqlite_busy_timeout(),
        }
    }
}

impl DatabaseConfig {
    /// Whether the URL points at a private in-memory database
    pub fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

impl Validatable for DatabaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.url, "url", self.domain_name())?;
        validate_positive(self.max_connections, "max_connections", self.domain_name())?;
        let timeout_secs = self.connection_timeout.as_secs();
        validate_positive(timeout_secs, "connection_timeout", self.domain_name())?;

        if self.min_connections > self.max_connections {
            return Err(
                self.validation_error("min_connections cannot be greater than max_connections")
            );
        }

        self.sqlite.validate()?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "database"
    }
}

impl Validatable for SqliteConfig {
    fn validate(&self) -> ConfigResult<()> {
        let valid_journal_modes = ["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];
        validate_enum_choice(
            &self.journal_mode,
            &valid_journal_modes,
            "journal_mode",
            self.domain_name(),
        )?;
        validate_positive(self.busy_timeout_ms, "busy_timeout_ms", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "database.sqlite"
    }
}

// Default value functions
fn default_database_url() -> String {
    "sqlite://loadbench.db?mode=rwc".to_string()
}

fn default_max_connections() -> u32 {
    8
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_sqlite_journal_mode() -> String {
    "WAL".to_string()
}

fn default_sqlite_busy_timeout() -> u32 {
    5000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_config_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.url, "sqlite://loadbench.db?mode=rwc");
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.sqlite.journal_mode, "WAL");
        assert!(config.auto_migrate);
        assert!(!config.is_memory());
    }

    #[test]
    fn test_database_config_validation() {
        let mut config = DatabaseConfig::default();
        assert!(config.validate().is_ok());

        config.min_connections = 20;
        assert!(config.validate().is_err());

        config = DatabaseConfig::default();
        config.url = String::new();
        assert!(config.validate().is_err());

        config = DatabaseConfig::default();
        config.sqlite.journal_mode = "INVALID".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_memory_detection() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        };
        assert!(config.is_memory());
    }
}
