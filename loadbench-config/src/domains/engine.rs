//! Load-test engine configuration

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};

/// What to do with a row whose date value cannot be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationPolicy {
    /// Count the row as skipped and leave it out of insertion
    #[default]
    SkipRow,
    /// Store NULL in place of the unparseable value and keep the row
    NullField,
    /// Fail the whole run
    FailRun,
}

impl ValidationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValidationPolicy::SkipRow => "skip_row",
            ValidationPolicy::NullField => "null_field",
            ValidationPolicy::FailRun => "fail_run",
        }
    }
}

impl fmt::Display for ValidationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ValidationPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip_row" | "skip" => Ok(ValidationPolicy::SkipRow),
            "null_field" | "null" => Ok(ValidationPolicy::NullField),
            "fail_run" | "fail" => Ok(ValidationPolicy::FailRun),
            _ => Err(format!("Invalid validation policy: {}", s)),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Smallest batch size a batched run may request
    #[serde(default = "default_batch_size_min")]
    pub batch_size_min: u32,

    /// Largest batch size a batched run may request
    #[serde(default = "default_batch_size_max")]
    pub batch_size_max: u32,

    /// Batch size used when a batched request omits one
    #[serde(default = "default_batch_size")]
    pub default_batch_size: u32,

    /// Runs executing at once; further runs wait in `pending`
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: u32,

    /// Rows produced between generation checkpoints
    #[serde(default = "default_chunk_size")]
    pub generation_chunk_size: u32,

    /// Rows normalised between validation checkpoints
    #[serde(default = "default_chunk_size")]
    pub validation_chunk_size: u32,

    /// Handling of unparseable date values
    #[serde(default)]
    pub validation_policy: ValidationPolicy,

    /// Largest dataset a single run may request; the dataset is held in memory
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,

    /// Interval at which an engine renews the lease on each run it executes
    #[serde(default = "default_lease_heartbeat_ms")]
    pub lease_heartbeat_ms: u64,

    /// Age after which an unrenewed lease marks its run as abandoned
    #[serde(default = "default_lease_timeout_ms")]
    pub lease_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size_min: default_batch_size_min(),
            batch_size_max: default_batch_size_max(),
            default_batch_size: default_batch_size(),
            max_concurrent_runs: default_max_concurrent_runs(),
            generation_chunk_size: default_chunk_size(),
            validation_chunk_size: default_chunk_size(),
            validation_policy: ValidationPolicy::default(),
            max_rows: default_max_rows(),
            lease_heartbeat_ms: default_lease_heartbeat_ms(),
            lease_timeout_ms: default_lease_timeout_ms(),
        }
    }
}

impl Validatable for EngineConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(self.batch_size_min, "batch_size_min", self.domain_name())?;
        validate_positive(self.max_concurrent_runs, "max_concurrent_runs", self.domain_name())?;
        validate_positive(self.generation_chunk_size, "generation_chunk_size", self.domain_name())?;
        validate_positive(self.validation_chunk_size, "validation_chunk_size", self.domain_name())?;
        validate_positive(self.max_rows, "max_rows", self.domain_name())?;
        validate_positive(self.lease_heartbeat_ms, "lease_heartbeat_ms", self.domain_name())?;

        if self.batch_size_min > self.default_batch_size
            || self.default_batch_size > self.batch_size_max
        {
            return Err(self.validation_error(format!(
                "batch sizes must satisfy batch_size_min <= default_batch_size <= batch_size_max, \
                 got {} <= {} <= {}",
                self.batch_size_min, self.default_batch_size, self.batch_size_max
            )));
        }

        // a healthy owner must renew at least twice before its lease expires
        if self.lease_timeout_ms < self.lease_heartbeat_ms.saturating_mul(2) {
            return Err(self.validation_error(format!(
                "lease_timeout_ms ({}) must be at least twice lease_heartbeat_ms ({})",
                self.lease_timeout_ms, self.lease_heartbeat_ms
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "engine"
    }
}

// Default value functions
fn default_batch_size_min() -> u32 {
    2000
}

fn default_batch_size_max() -> u32 {
    5000
}

fn default_batch_size() -> u32 {
    3000
}

fn default_max_concurrent_runs() -> u32 {
    4
}

fn default_chunk_size() -> u32 {
    1000
}

fn default_max_rows() -> u64 {
    1_000_000
}

fn default_lease_heartbeat_ms() -> u64 {
    1000
}

fn default_lease_timeout_ms() -> u64 {
    30_000
}
