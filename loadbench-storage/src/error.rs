//! Storage error types

use loadbench_core::LoadBenchError;
use sea_orm::DbErr;
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-related errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Connection-related errors
    #[error("Database connection failed: {0}")]
    ConnectionFailed(String),

    /// Query execution errors
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Transaction errors
    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Migration errors
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Entity not found
    #[error("Run not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Stored value could not be mapped back to a domain type
    #[error("Corrupt record: {0}")]
    CorruptRecord(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DbErr> for StorageError {
    fn from(err: DbErr) -> Self {
        match err {
            DbErr::Conn(e) => StorageError::ConnectionFailed(e.to_string()),
            DbErr::ConnectionAcquire(e) => StorageError::ConnectionFailed(e.to_string()),
            DbErr::RecordNotFound(msg) => StorageError::NotFound(msg),
            DbErr::Migration(msg) => StorageError::MigrationFailed(msg),
            other => StorageError::QueryFailed(other.to_string()),
        }
    }
}

impl From<LoadBenchError> for StorageError {
    fn from(err: LoadBenchError) -> Self {
        StorageError::CorruptRecord(err.to_string())
    }
}
