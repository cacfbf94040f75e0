//! Database testing utilities
//!
//! Provides an isolated, migrated SQLite database in a temporary directory.
//! File databases are used instead of `sqlite::memory:` so that every pooled
//! connection sees the same data.

use loadbench_config::DatabaseConfig;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;

use crate::connection::DatabaseConnection;
use crate::repositories::RepositoryFactory;

/// Test database for isolated testing
pub struct TestDatabase {
    _temp_dir: TempDir,
    pub connection: DatabaseConnection,
    pub url: String,
}

impl TestDatabase {
    /// Create a migrated SQLite test database with a small pool
    pub async fn new() -> Result<Self, TestDatabaseError> {
        Self::with_pool_size(4).await
    }

    /// Create a migrated SQLite test database with the given pool size
    pub async fn with_pool_size(max_connections: u32) -> Result<Self, TestDatabaseError> {
        let temp_dir =
            TempDir::new().map_err(|e| TestDatabaseError::TempDirCreation(e.to_string()))?;
        let db_path = temp_dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());

        let config = DatabaseConfig {
            url: url.clone(),
            max_connections,
            connection_timeout: Duration::from_secs(10),
            ..Default::default()
        };

        let connection = DatabaseConnection::new(config)
            .await
            .map_err(|e| TestDatabaseError::Connection(e.to_string()))?;
        connection
            .migrate()
            .await
            .map_err(|e| TestDatabaseError::Migration(e.to_string()))?;

        Ok(Self {
            _temp_dir: temp_dir,
            connection,
            url,
        })
    }

    /// Config pointing at this database, for components that open their own pool
    pub fn config(&self) -> DatabaseConfig {
        self.connection.get_config().clone()
    }

    pub fn repositories(&self) -> RepositoryFactory {
        RepositoryFactory::new(self.connection.clone())
    }
}

/// Test database errors
#[derive(Debug, Error)]
pub enum TestDatabaseError {
    #[error("Failed to create temporary directory: {0}")]
    TempDirCreation(String),

    #[error("Database connection failed: {0}")]
    Connection(String),

    #[error("Migration failed: {0}")]
    Migration(String),
}
