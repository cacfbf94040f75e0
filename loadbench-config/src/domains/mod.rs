//! Domain-specific configuration modules

pub mod database;
pub mod engine;
pub mod logging;
pub mod telemetry;
pub mod utils;

use crate::error::{ConfigError, ConfigResult};
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main loadbench configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoadBenchConfig {
    /// Storage configuration
    #[serde(default)]
    pub database: database::DatabaseConfig,

    /// Engine configuration
    #[serde(default)]
    pub engine: engine::EngineConfig,

    /// Progress telemetry configuration
    #[serde(default)]
    pub telemetry: telemetry::TelemetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl LoadBenchConfig {
    /// Validate all domain configurations, then the rules that span domains
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.engine.validate()?;
        self.telemetry.validate()?;
        self.logging.validate()?;

        // one connection per concurrently running test plus one for ledger reads
        let required = self.engine.max_concurrent_runs.saturating_add(1);
        if self.database.max_connections < required {
            return Err(ConfigError::ValidationError(format!(
                "database.max_connections ({}) must be at least \
                 engine.max_concurrent_runs + 1 ({})",
                self.database.max_connections, required
            )));
        }

        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = LoadBenchConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LoadBenchConfig::default().validate_all().is_ok());
    }

    #[test]
    fn test_pool_must_cover_concurrent_runs() {
        let mut config = LoadBenchConfig::default();
        config.engine.max_concurrent_runs = 8;
        config.database.max_connections = 8;
        assert!(matches!(config.validate_all(), Err(ConfigError::ValidationError(_))));

        config.database.max_connections = 9;
        assert!(config.validate_all().is_ok());
    }

    #[test]
    fn test_sample_round_trips() {
        let sample = LoadBenchConfig::generate_sample();
        let parsed: LoadBenchConfig = serde_yaml::from_str(&sample).unwrap();
        assert_eq!(parsed.engine.default_batch_size, 3000);
        assert_eq!(parsed.telemetry.publish_interval_ms, 250);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "engine:\n  validation_policy: fail_run\n";
        let parsed: LoadBenchConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(parsed.engine.validation_policy, engine::ValidationPolicy::FailRun);
        assert_eq!(parsed.engine.batch_size_max, 5000);
        assert_eq!(parsed.database.max_connections, 8);
    }
}
