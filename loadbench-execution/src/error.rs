//! Error types for load test execution

use loadbench_config::ConfigError;
use loadbench_core::LoadBenchError;
use loadbench_storage::StorageError;
use thiserror::Error;

/// Result type for execution operations
pub type ExecutionResult<T> = std::result::Result<T, ExecutionError>;

/// Load test execution errors
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Rejected before a run record exists
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Run not found: {0}")]
    NotFound(String),

    #[error("Invalid execution state: {0}")]
    InvalidState(String),

    #[error("Run task failed: {0}")]
    TaskFailed(String),
}

impl ExecutionError {
    /// Whether the caller supplied bad input
    pub fn is_client_error(&self) -> bool {
        matches!(self, ExecutionError::Configuration(_) | ExecutionError::NotFound(_))
    }
}

impl From<LoadBenchError> for ExecutionError {
    fn from(err: LoadBenchError) -> Self {
        match err {
            LoadBenchError::InvalidTransition { .. } => Self::InvalidState(err.to_string()),
            other if other.is_client_error() => Self::Configuration(other.to_string()),
            other => Self::InvalidState(other.to_string()),
        }
    }
}

impl From<ConfigError> for ExecutionError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadbench_core::RunState;

    #[test]
    fn test_core_error_mapping() {
        let err: ExecutionError = LoadBenchError::InvalidConfig("rows".into()).into();
        assert!(matches!(err, ExecutionError::Configuration(_)));
        assert!(err.is_client_error());

        let err: ExecutionError = LoadBenchError::InvalidTransition {
            from: RunState::Completed,
            to: RunState::Inserting,
        }
        .into();
        assert!(matches!(err, ExecutionError::InvalidState(_)));
        assert!(!err.is_client_error());
    }
}
