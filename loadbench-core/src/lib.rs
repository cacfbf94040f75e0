//! Core domain models and types for loadbench
//!
//! This crate contains the fundamental types used throughout the load-test
//! engine: run configuration, the run state machine, progress snapshots,
//! dataset shapes and the date format resolver. It has minimal dependencies
//! and defines the domain language of the application.

pub mod config;
pub mod dataset;
pub mod dates;
pub mod error;
pub mod progress;
pub mod run;

// Re-export commonly used types at the crate root
pub use config::{
    BatchSizeRange, InsertMethod, MethodKind, RunConfig, RunRequest, MAX_COLUMNS, MIN_COLUMNS,
};
pub use dataset::{column_name, ColumnKind, ColumnSpec, DatasetSchema, FieldKind, GeneratedRow};
pub use dates::{DateFormat, ResolvedDate, DATE_FORMATS};
pub use error::{LoadBenchError, Result};
pub use progress::{ProgressSnapshot, SnapshotKind};
pub use run::{
    LoadTestRun, Phase, PhaseTimings, RowCounters, RunId, RunResource, RunState, RunStatus,
};
