use loadbench_config::DatabaseConfig;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection as SeaConnection};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};

/// Database connection wrapper with configuration
#[derive(Clone)]
pub struct DatabaseConnection {
    connection: SeaConnection,
    config: DatabaseConfig,
}

impl DatabaseConnection {
    /// Create a new pooled connection from configuration
    pub async fn new(config: DatabaseConfig) -> StorageResult<Self> {
        info!("Connecting to database: {}", config.url);

        Self::ensure_sqlite_file_exists(&config.url)?;

        if config.is_memory() && config.max_connections > 1 {
            // every pooled connection to :memory: opens its own private database
            warn!(
                max_connections = config.max_connections,
                "In-memory SQLite with a connection pool; concurrent runs will not share data"
            );
        }

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections.max(1))
            .connect_timeout(config.connection_timeout)
            .acquire_timeout(config.connection_timeout)
            .idle_timeout(Duration::from_secs(300))
            .sqlx_logging(true)
            .sqlx_logging_level(log::LevelFilter::Debug);

        let connection = Database::connect(opts).await?;
        let db = Self { connection, config };
        db.apply_sqlite_pragmas().await?;

        debug!(
            "Database connection established with {} max connections",
            db.config.max_connections
        );

        Ok(db)
    }

    async fn apply_sqlite_pragmas(&self) -> StorageResult<()> {
        if !self.config.url.starts_with("sqlite:") {
            return Ok(());
        }
        let sqlite = &self.config.sqlite;
        if !self.config.is_memory() {
            let journal_mode = sqlite.journal_mode.to_uppercase();
            self.connection
                .execute_unprepared(&format!("PRAGMA journal_mode = {}", journal_mode))
                .await?;
        }
        self.connection
            .execute_unprepared(&format!("PRAGMA busy_timeout = {}", sqlite.busy_timeout_ms))
            .await?;
        debug!(
            journal_mode = %sqlite.journal_mode,
            busy_timeout_ms = sqlite.busy_timeout_ms,
            "Applied SQLite pragmas"
        );
        Ok(())
    }

    /// Ensure the parent directory of a file-based SQLite database exists
    fn ensure_sqlite_file_exists(database_url: &str) -> StorageResult<()> {
        if !database_url.starts_with("sqlite:") || database_url.contains(":memory:") {
            return Ok(());
        }

        let without_scheme = database_url
            .strip_prefix("sqlite://")
            .or_else(|| database_url.strip_prefix("sqlite:"))
            .ok_or_else(|| {
                StorageError::ConfigError(format!("Invalid SQLite URL format: {}", database_url))
            })?;
        // drop query parameters such as ?mode=rwc
        let file_path = without_scheme.split('?').next().unwrap_or(without_scheme);
        if file_path.is_empty() {
            return Err(StorageError::ConfigError(format!(
                "SQLite URL has no file path: {}",
                database_url
            )));
        }

        let path = std::path::Path::new(file_path);
        if let Some(parent_dir) = path.parent() {
            if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
                info!("Creating database directory: {:?}", parent_dir);
                std::fs::create_dir_all(parent_dir).map_err(|e| {
                    StorageError::ConfigError(format!(
                        "Failed to create database directory {:?}: {}",
                        parent_dir, e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Get the underlying Sea-ORM connection
    pub fn get_connection(&self) -> &SeaConnection {
        &self.connection
    }

    /// Get database configuration
    pub fn get_config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Run database migrations
    pub async fn migrate(&self) -> StorageResult<()> {
        use sea_orm_migration::MigratorTrait;

        info!("Running database migrations");
        crate::migrations::Migrator::up(&self.connection, None)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))?;
        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Check database connectivity
    pub async fn ping(&self) -> StorageResult<()> {
        self.connection.ping().await?;
        Ok(())
    }

    /// Close the database connection
    pub async fn close(self) -> StorageResult<()> {
        info!("Closing database connection");
        self.connection.close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_config(dir: &std::path::Path) -> DatabaseConfig {
        DatabaseConfig {
            url: format!("sqlite://{}?mode=rwc", dir.join("nested").join("bench.db").display()),
            max_connections: 2,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_file_database_connect_and_migrate() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db = DatabaseConnection::new(file_config(temp_dir.path())).await.unwrap();
        assert!(db.ping().await.is_ok());
        assert!(db.migrate().await.is_ok());
        // migrations are idempotent
        assert!(db.migrate().await.is_ok());
        assert!(temp_dir.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_in_memory_database() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        };
        let db = DatabaseConnection::new(config).await.unwrap();
        assert!(db.ping().await.is_ok());
    }

    #[test]
    fn test_ensure_sqlite_file_strips_query() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("a").join("b.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        DatabaseConnection::ensure_sqlite_file_exists(&url).unwrap();
        assert!(db_path.parent().unwrap().exists());
    }

    #[test]
    fn test_ensure_sqlite_file_ignores_other_urls() {
        assert!(DatabaseConnection::ensure_sqlite_file_exists("sqlite::memory:").is_ok());
        let postgres = "postgres://localhost/bench";
        assert!(DatabaseConnection::ensure_sqlite_file_exists(postgres).is_ok());
        assert!(DatabaseConnection::ensure_sqlite_file_exists("sqlite://?mode=rwc").is_err());
    }
}
