use async_trait::async_trait;
use loadbench_core::{column_name, GeneratedRow, RunId, MAX_COLUMNS};
use sea_orm::sea_query::{Alias, DynIden, Expr, IntoIden, Order, Query, SimpleExpr};
use sea_orm::{ConnectionTrait, Statement};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::DatabaseConnection;
use crate::entities::generated_rows::{value_column, GeneratedRows};
use crate::error::{StorageError, StorageResult};
use crate::transaction::ScopedTransaction;

/// Bound parameters allowed in one SQLite statement, with headroom
const MAX_BIND_PARAMETERS: usize = 32_000;

/// Sink for generated rows.
///
/// Both methods are all-or-nothing: on error nothing they were given is
/// visible to readers.
#[async_trait]
pub trait RowWriter: Send + Sync {
    /// Insert one row in its own transaction
    async fn insert_one(&self, row: &GeneratedRow) -> StorageResult<()>;

    /// Insert rows inside one transaction; returns rows committed
    async fn insert_batch(&self, rows: &[GeneratedRow]) -> StorageResult<u64>;
}

/// A committed row read back from storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRow {
    pub ordinal: u64,
    /// Ordered (column name, value) pairs
    pub values: Vec<(String, Option<String>)>,
}

impl StoredRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .and_then(|(_, v)| v.as_deref())
    }
}

/// Repository for the wide generated-row table
#[derive(Clone)]
pub struct RowRepository {
    db: DatabaseConnection,
    rows_per_statement: Option<usize>,
}

impl RowRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            rows_per_statement: None,
        }
    }

    /// Cap the rows per INSERT statement (a batch may span several statements)
    pub fn with_rows_per_statement(mut self, rows: usize) -> Self {
        self.rows_per_statement = Some(rows.max(1));
        self
    }

    fn statement_rows(&self, width: usize) -> usize {
        let limit = (MAX_BIND_PARAMETERS / (width + 2)).max(1);
        self.rows_per_statement.map_or(limit, |rows| rows.min(limit))
    }

    fn check_width(width: usize) -> StorageResult<()> {
        if width == 0 || width > MAX_COLUMNS as usize {
            return Err(StorageError::ValidationFailed(format!(
                "row width {} outside 1..={}",
                width, MAX_COLUMNS
            )));
        }
        Ok(())
    }

    fn insert_statement(&self, rows: &[GeneratedRow], width: usize) -> StorageResult<Statement> {
        let mut columns: Vec<DynIden> =
            vec![GeneratedRows::RunId.into_iden(), GeneratedRows::Ordinal.into_iden()];
        columns.extend((0..width).map(|i| value_column(i).into_iden()));

        let mut insert = Query::insert();
        insert.into_table(GeneratedRows::Table).columns(columns);

        for row in rows {
            if row.width() != width {
                return Err(StorageError::ValidationFailed(format!(
                    "row {} has {} values, expected {}",
                    row.ordinal,
                    row.width(),
                    width
                )));
            }
            let mut values: Vec<SimpleExpr> = Vec::with_capacity(width + 2);
            values.push(row.run_id.0.into());
            values.push((row.ordinal as i64).into());
            values.extend(row.values.iter().map(|v| SimpleExpr::from(v.clone())));
            insert.values(values).map_err(|e| {
                StorageError::QueryFailed(format!("failed to stage row {}: {}", row.ordinal, e))
            })?;
        }

        Ok(self.db.get_connection().get_database_backend().build(&insert))
    }

    /// Number of committed rows owned by a run
    pub async fn count(&self, run_id: RunId) -> StorageResult<u64> {
        let select = Query::select()
            .expr_as(Expr::col(GeneratedRows::Id).count(), Alias::new("n"))
            .from(GeneratedRows::Table)
            .and_where(Expr::col(GeneratedRows::RunId).eq(run_id.0))
            .to_owned();
        let conn = self.db.get_connection();
        let row = conn
            .query_one(conn.get_database_backend().build(&select))
            .await?
            .ok_or_else(|| StorageError::QueryFailed("count returned no row".to_string()))?;
        let n: i64 = row.try_get("", "n")?;
        Ok(n.max(0) as u64)
    }

    /// Committed rows of a run in ordinal order
    pub async fn fetch(
        &self,
        run_id: RunId,
        width: usize,
        limit: u64,
    ) -> StorageResult<Vec<StoredRow>> {
        Self::check_width(width)?;
        let names: Vec<String> = (0..width).map(column_name).collect();

        let mut select = Query::select();
        select
            .column(GeneratedRows::Ordinal)
            .columns((0..width).map(value_column))
            .from(GeneratedRows::Table)
            .and_where(Expr::col(GeneratedRows::RunId).eq(run_id.0))
            .order_by(GeneratedRows::Ordinal, Order::Asc)
            .limit(limit);

        let conn = self.db.get_connection();
        let results = conn.query_all(conn.get_database_backend().build(&select)).await?;

        results
            .into_iter()
            .map(|result| -> StorageResult<StoredRow> {
                let ordinal: i64 = result.try_get("", "ordinal")?;
                let values = names
                    .iter()
                    .map(|name| -> StorageResult<(String, Option<String>)> {
                        Ok((name.clone(), result.try_get::<Option<String>>("", name)?))
                    })
                    .collect::<StorageResult<Vec<_>>>()?;
                Ok(StoredRow {
                    ordinal: ordinal.max(0) as u64,
                    values,
                })
            })
            .collect()
    }
}

#[async_trait]
impl RowWriter for RowRepository {
    async fn insert_one(&self, row: &GeneratedRow) -> StorageResult<()> {
        Self::check_width(row.width())?;
        let statement = self.insert_statement(std::slice::from_ref(row), row.width())?;
        let tx = ScopedTransaction::begin(&self.db, "insert_row").await?;
        tx.execute_all(vec![statement]).await?;
        Ok(())
    }

    async fn insert_batch(&self, rows: &[GeneratedRow]) -> StorageResult<u64> {
        let Some(first) = rows.first() else {
            return Ok(0);
        };
        let width = first.width();
        Self::check_width(width)?;

        // build everything before opening the transaction
        let statements = rows
            .chunks(self.statement_rows(width))
            .map(|chunk| self.insert_statement(chunk, width))
            .collect::<StorageResult<Vec<_>>>()?;
        let statement_count = statements.len();

        let tx = ScopedTransaction::begin(&self.db, "insert_batch").await?;
        let inserted = tx.execute_all(statements).await?;
        debug!(rows = inserted, statements = statement_count, "Batch committed");
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::RunRepository;
    use crate::testing::TestDatabase;
    use loadbench_core::{InsertMethod, LoadTestRun, RunConfig};

    async fn seeded_run(db: &TestDatabase) -> RunId {
        let run = LoadTestRun::new(RunConfig {
            rows: 10,
            columns: 10,
            date_columns: 0,
            method: InsertMethod::Batched { batch_size: 5 },
            seed: Some(1),
            invalid_date_ratio: 0.0,
        });
        RunRepository::new(db.connection.clone()).create(&run).await.unwrap();
        run.id
    }

    fn row(run_id: RunId, ordinal: u64) -> GeneratedRow {
        let mut values: Vec<Option<String>> =
            (0..10).map(|i| Some(format!("r{}c{}", ordinal, i))).collect();
        values[3] = None;
        GeneratedRow {
            run_id,
            ordinal,
            values,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch() {
        let db = TestDatabase::new().await.unwrap();
        let run_id = seeded_run(&db).await;
        let repo = RowRepository::new(db.connection.clone());

        repo.insert_one(&row(run_id, 0)).await.unwrap();
        let batch: Vec<_> = (1..6).map(|i| row(run_id, i)).collect();
        assert_eq!(repo.insert_batch(&batch).await.unwrap(), 5);
        assert_eq!(repo.count(run_id).await.unwrap(), 6);

        let rows = repo.fetch(run_id, 10, 3).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].ordinal, 0);
        assert_eq!(rows[2].get("col_1"), Some("r2c0"));
        assert_eq!(rows[2].get("col_4"), None);
        assert_eq!(rows[2].values.len(), 10);
    }

    #[tokio::test]
    async fn test_failed_batch_commits_nothing() {
        let db = TestDatabase::new().await.unwrap();
        let run_id = seeded_run(&db).await;
        let repo = RowRepository::new(db.connection.clone()).with_rows_per_statement(2);

        // the duplicate ordinal lands in the third statement
        let batch = vec![
            row(run_id, 0),
            row(run_id, 1),
            row(run_id, 2),
            row(run_id, 3),
            row(run_id, 1),
        ];
        assert!(repo.insert_batch(&batch).await.is_err());
        assert_eq!(repo.count(run_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rows_require_an_existing_run() {
        let db = TestDatabase::new().await.unwrap();
        let repo = RowRepository::new(db.connection.clone());
        let orphan = RunId::new();
        assert!(repo.insert_one(&row(orphan, 0)).await.is_err());
        assert_eq!(repo.count(orphan).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_mixed_width_batch_is_rejected() {
        let db = TestDatabase::new().await.unwrap();
        let run_id = seeded_run(&db).await;
        let repo = RowRepository::new(db.connection.clone());
        let mut short = row(run_id, 1);
        short.values.truncate(4);
        let result = repo.insert_batch(&[row(run_id, 0), short]).await;
        assert!(matches!(result, Err(StorageError::ValidationFailed(_))));
        assert_eq!(repo.count(run_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_delete_removes_rows_and_run() {
        let db = TestDatabase::new().await.unwrap();
        let run_id = seeded_run(&db).await;
        let other = seeded_run(&db).await;
        let repo = RowRepository::new(db.connection.clone());
        let runs = RunRepository::new(db.connection.clone());

        repo.insert_batch(&[row(run_id, 0), row(run_id, 1)]).await.unwrap();
        repo.insert_batch(&[row(other, 0)]).await.unwrap();

        assert!(runs.delete_with_rows(run_id).await.unwrap());
        assert_eq!(repo.count(run_id).await.unwrap(), 0);
        assert!(runs.find(run_id).await.unwrap().is_none());
        assert_eq!(repo.count(other).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_statement_rows_respects_bind_limit() {
        let db = TestDatabase::new().await.unwrap();
        let repo = RowRepository::new(db.connection.clone());
        assert_eq!(repo.statement_rows(200), 158);
        assert_eq!(repo.statement_rows(10), 2666);
        let capped = repo.with_rows_per_statement(500);
        assert_eq!(capped.statement_rows(10), 500);
        assert_eq!(capped.statement_rows(200), 158);
    }
}
