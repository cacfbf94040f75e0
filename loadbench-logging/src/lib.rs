//! Structured logging setup for loadbench
//!
//! Builds a `tracing-subscriber` registry from [`LoggingConfig`]: an
//! `EnvFilter` seeded from the configured level (overridable with
//! `RUST_LOG`), a console formatter and an optional file copy.

pub mod init;

pub use init::{init_logging, LoggingGuard};
pub use loadbench_config::LoggingConfig;
