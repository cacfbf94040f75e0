pub mod row_repository;
pub mod run_repository;

pub use row_repository::{RowRepository, RowWriter, StoredRow};
pub use run_repository::{Pagination, RunFilters, RunPage, RunRepository, RunSummary};

use crate::connection::DatabaseConnection;

/// Repository factory for creating all repositories with a shared connection
#[derive(Clone)]
pub struct RepositoryFactory {
    pub run_repo: RunRepository,
    pub row_repo: RowRepository,
}

impl RepositoryFactory {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            run_repo: RunRepository::new(db.clone()),
            row_repo: RowRepository::new(db),
        }
    }

    pub fn run_repository(&self) -> RunRepository {
        self.run_repo.clone()
    }

    pub fn row_repository(&self) -> RowRepository {
        self.row_repo.clone()
    }
}
