//! Domain-driven configuration management for loadbench
//!
//! Configuration is split by functional domain (database, engine, telemetry,
//! logging), every field has a serde default, and `LOADBENCH_*` environment
//! variables override file values before validation.

pub mod domains;
pub mod error;
pub mod loader;
pub mod validation;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use validation::Validatable;

// Re-export domain configurations
pub use domains::{
    database::{DatabaseConfig, SqliteConfig},
    engine::{EngineConfig, ValidationPolicy},
    logging::{LogFormat, LogLevel, LoggingConfig},
    telemetry::TelemetryConfig,
    LoadBenchConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
