//! Configuration loading and environment variable handling

use std::path::Path;
use std::str::FromStr;

use crate::domains::database::DatabaseConfig;
use crate::domains::engine::EngineConfig;
use crate::domains::logging::LoggingConfig;
use crate::domains::telemetry::TelemetryConfig;
use crate::domains::LoadBenchConfig;
use crate::error::{ConfigError, ConfigResult};

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with the `LOADBENCH` prefix
    pub fn new() -> Self {
        Self {
            prefix: "LOADBENCH".to_string(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<LoadBenchConfig> {
        let content = std::fs::read_to_string(path)?;
        let mut config: LoadBenchConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<LoadBenchConfig> {
        let mut config = LoadBenchConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut LoadBenchConfig) -> ConfigResult<()> {
        self.apply_database_overrides(&mut config.database)?;
        self.apply_engine_overrides(&mut config.engine)?;
        self.apply_telemetry_overrides(&mut config.telemetry)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    fn apply_database_overrides(&self, config: &mut DatabaseConfig) -> ConfigResult<()> {
        if let Ok(url) = self.get_env_var("DATABASE_URL") {
            config.url = url;
        }

        if let Some(max) = self.parse_env_var("MAX_CONNECTIONS")? {
            config.max_connections = max;
        }

        Ok(())
    }

    fn apply_engine_overrides(&self, config: &mut EngineConfig) -> ConfigResult<()> {
        if let Some(runs) = self.parse_env_var("MAX_CONCURRENT_RUNS")? {
            config.max_concurrent_runs = runs;
        }

        if let Some(size) = self.parse_env_var("DEFAULT_BATCH_SIZE")? {
            config.default_batch_size = size;
        }

        if let Some(policy) = self.parse_env_var("VALIDATION_POLICY")? {
            config.validation_policy = policy;
        }

        if let Some(max_rows) = self.parse_env_var("MAX_ROWS")? {
            config.max_rows = max_rows;
        }

        if let Some(timeout) = self.parse_env_var("LEASE_TIMEOUT_MS")? {
            config.lease_timeout_ms = timeout;
        }

        Ok(())
    }

    fn apply_telemetry_overrides(&self, config: &mut TelemetryConfig) -> ConfigResult<()> {
        if let Some(interval) = self.parse_env_var("PUBLISH_INTERVAL_MS")? {
            config.publish_interval_ms = interval;
        }

        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut LoggingConfig) -> ConfigResult<()> {
        if let Some(level) = self.parse_env_var("LOG_LEVEL")? {
            config.level = level;
        }

        if let Some(format) = self.parse_env_var("LOG_FORMAT")? {
            config.format = format;
        }

        Ok(())
    }

    /// Read and parse a prefixed variable; unset means `None`
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| {
                    ConfigError::EnvError(format!("Invalid {}_{}: {}", self.prefix, name, e))
                }),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
