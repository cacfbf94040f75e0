//! Core error types for loadbench

use thiserror::Error;

use crate::run::RunState;

/// Core error type shared by the domain layer
#[derive(Debug, Error)]
pub enum LoadBenchError {
    /// Row/column/date-column bounds or batch size violated
    #[error("Invalid run configuration: {0}")]
    InvalidConfig(String),

    /// Insert method string not recognised
    #[error("Unknown insert method: {0}")]
    UnknownMethod(String),

    /// Run status string not recognised
    #[error("Unknown run status: {0}")]
    UnknownStatus(String),

    /// Attempted a backwards or post-terminal state change
    #[error("Invalid state transition: {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },

    /// Generic parse failure
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Result type alias for loadbench core
pub type Result<T> = std::result::Result<T, LoadBenchError>;

impl LoadBenchError {
    /// Whether the error was caused by caller input rather than the system
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            LoadBenchError::InvalidConfig(_)
                | LoadBenchError::UnknownMethod(_)
                | LoadBenchError::UnknownStatus(_)
        )
    }
}
