//! Load test execution for loadbench
//!
//! This crate turns a validated run configuration into committed rows:
//! - Deterministic dataset generation
//! - Date normalisation before insertion
//! - Single-row and batched insertion strategies
//! - Throttled progress telemetry per run
//! - The engine facade that schedules, cancels and deletes runs

pub mod engine;
pub mod error;
pub mod generator;
pub mod runner;
pub mod strategy;
pub mod telemetry;
pub mod validation;

pub use engine::LoadTestEngine;
pub use error::{ExecutionError, ExecutionResult};
pub use generator::DatasetGenerator;
pub use runner::{RunContext, RunExecutor};
pub use strategy::{
    strategy_for, BatchedStrategy, InsertOutcome, InsertStrategy, SingleRowStrategy, StopReason,
};
pub use telemetry::{format_eta, ProgressHub, ProgressReporter, ProgressStream, ThroughputWindow};
pub use validation::{RowValidator, ValidationStats};
