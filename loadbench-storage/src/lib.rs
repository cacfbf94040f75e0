//! Persistence layer for loadbench
//!
//! SeaORM over SQLite: a pooled connection, migrations, the run ledger, the
//! wide generated-row table and a scoped transaction used for every write
//! unit (one row or one batch).

pub mod connection;
pub mod entities;
pub mod error;
pub mod migrations;
pub mod repositories;
pub mod transaction;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connection::DatabaseConnection;
pub use error::{StorageError, StorageResult};
pub use repositories::{
    Pagination, RepositoryFactory, RowRepository, RowWriter, RunFilters, RunPage, RunRepository,
    RunSummary, StoredRow,
};
pub use transaction::ScopedTransaction;
