use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;

use loadbench_core::{LoadTestRun, MethodKind, RunId, RunStatus};
use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, Order, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::connection::DatabaseConnection;
use crate::entities::{self, load_test_runs, GeneratedRows, LoadTestRuns, RunColumn};
use crate::error::{StorageError, StorageResult};
use crate::transaction::ScopedTransaction;

/// Filters for run history queries
#[derive(Debug, Clone, Default)]
pub struct RunFilters {
    pub status: Option<RunStatus>,
    pub method: Option<MethodKind>,
}

/// Pagination settings for run history queries
#[derive(Debug, Clone, Copy)]
pub struct Pagination {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: 20, offset: 0 }
    }
}

/// One page of runs, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunPage {
    pub items: Vec<LoadTestRun>,
    pub total: u64,
    pub limit: u64,
    pub offset: u64,
}

/// Aggregated performance over completed runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// `None` when the summary spans every method
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<MethodKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    /// Number of completed runs
    pub count: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// completed / (completed + failed)
    pub success_rate: f64,
    pub best_total_ms: u64,
    pub average_total_ms: f64,
}

/// One row of the grouped aggregation query
#[derive(Debug, Clone)]
struct GroupRow {
    method: MethodKind,
    batch_size: Option<u32>,
    status: RunStatus,
    runs: u64,
    best_total_ms: Option<u64>,
    sum_total_ms: Option<u64>,
}

#[derive(Debug, Default)]
struct Accumulator {
    completed: u64,
    failed: u64,
    cancelled: u64,
    best_total_ms: Option<u64>,
    sum_total_ms: u64,
}

impl Accumulator {
    fn add(&mut self, row: &GroupRow) {
        match row.status {
            RunStatus::Completed => {
                self.completed += row.runs;
                self.sum_total_ms += row.sum_total_ms.unwrap_or(0);
                self.best_total_ms = match (self.best_total_ms, row.best_total_ms) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
            }
            RunStatus::Failed => self.failed += row.runs,
            RunStatus::Cancelled => self.cancelled += row.runs,
            RunStatus::Pending | RunStatus::Running => {}
        }
    }

    /// No completed history means no data, not a zero summary
    fn finish(self, method: Option<MethodKind>, batch_size: Option<u32>) -> Option<RunSummary> {
        if self.completed == 0 {
            return None;
        }
        Some(RunSummary {
            method,
            batch_size,
            count: self.completed,
            failed: self.failed,
            cancelled: self.cancelled,
            success_rate: self.completed as f64 / (self.completed + self.failed) as f64,
            best_total_ms: self.best_total_ms.unwrap_or(0),
            average_total_ms: self.sum_total_ms as f64 / self.completed as f64,
        })
    }
}

fn live_statuses() -> [load_test_runs::RunStatus; 2] {
    [load_test_runs::RunStatus::Pending, load_test_runs::RunStatus::Running]
}

/// Repository for the run ledger
#[derive(Clone)]
pub struct RunRepository {
    db: DatabaseConnection,
}

impl RunRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Insert a new run record
    pub async fn create(&self, run: &LoadTestRun) -> StorageResult<()> {
        entities::to_active_model(run).insert(self.db.get_connection()).await?;
        debug!(run_id = %run.id, "Run record created");
        Ok(())
    }

    /// Find run by id
    pub async fn find(&self, id: RunId) -> StorageResult<Option<LoadTestRun>> {
        let model = LoadTestRuns::find()
            .filter(RunColumn::Uuid.eq(id.0))
            .one(self.db.get_connection())
            .await?;
        model.map(LoadTestRun::try_from).transpose()
    }

    /// Fetch run by id, failing when it does not exist
    pub async fn get(&self, id: RunId) -> StorageResult<LoadTestRun> {
        self.find(id).await?.ok_or_else(|| StorageError::NotFound(id.to_string()))
    }

    /// Page through run history, newest first
    pub async fn list(
        &self,
        filters: RunFilters,
        pagination: Pagination,
    ) -> StorageResult<RunPage> {
        let mut query = LoadTestRuns::find();

        if let Some(status) = filters.status {
            query = query.filter(RunColumn::Status.eq(load_test_runs::RunStatus::from(status)));
        }
        if let Some(method) = filters.method {
            query = query.filter(RunColumn::Method.eq(load_test_runs::InsertMethod::from(method)));
        }

        let total = query.clone().count(self.db.get_connection()).await?;
        let models = query
            .order_by(RunColumn::Id, Order::Desc)
            .limit(pagination.limit)
            .offset(pagination.offset)
            .all(self.db.get_connection())
            .await?;

        let items = models
            .into_iter()
            .map(LoadTestRun::try_from)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(RunPage {
            items,
            total,
            limit: pagination.limit,
            offset: pagination.offset,
        })
    }

    /// Persist the mutable state of a run.
    ///
    /// Returns `false` when the stored record is already terminal (or gone);
    /// terminal runs are never modified.
    pub async fn save(&self, run: &LoadTestRun) -> StorageResult<bool> {
        let terminal: Vec<load_test_runs::RunStatus> = RunStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .map(Into::into)
            .collect();

        let result = LoadTestRuns::update_many()
            .set(entities::to_active_model(run))
            .filter(RunColumn::Uuid.eq(run.id.0))
            .filter(RunColumn::Status.is_not_in(terminal))
            .exec(self.db.get_connection())
            .await?;

        if result.rows_affected == 0 {
            warn!(
                run_id = %run.id,
                state = %run.state,
                "Run update ignored; record is terminal or missing"
            );
            return Ok(false);
        }
        Ok(true)
    }

    /// Delete a run and all of its rows in one transaction.
    ///
    /// Returns `false` when no such run exists.
    pub async fn delete_with_rows(&self, id: RunId) -> StorageResult<bool> {
        let backend = self.db.get_connection().get_database_backend();

        let delete_rows = Query::delete()
            .from_table(GeneratedRows::Table)
            .and_where(Expr::col(GeneratedRows::RunId).eq(id.0))
            .to_owned();

        let mut tx = ScopedTransaction::begin(&self.db, "delete_run").await?;
        let rows = tx.execute(backend.build(&delete_rows)).await?;
        let runs = LoadTestRuns::delete_many()
            .filter(RunColumn::Uuid.eq(id.0))
            .exec(tx.connection()?)
            .await?
            .rows_affected;
        if runs == 0 {
            tx.rollback().await?;
            return Ok(false);
        }
        tx.commit().await?;

        info!(run_id = %id, rows_deleted = rows, "Run deleted");
        Ok(true)
    }

    /// Insert a new run record owned by an engine instance, with a fresh heartbeat
    pub async fn create_leased(&self, run: &LoadTestRun, owner: &str) -> StorageResult<()> {
        let mut model = entities::to_active_model(run);
        model.owner = Set(Some(owner.to_string()));
        model.heartbeat_at = Set(Some(Utc::now()));
        model.insert(self.db.get_connection()).await?;
        debug!(run_id = %run.id, owner, "Leased run record created");
        Ok(())
    }

    /// Renew the owner's lease on a live run.
    ///
    /// Returns the persisted cancel request, or `None` once the run is
    /// terminal, gone, or owned by someone else.
    pub async fn heartbeat(&self, id: RunId, owner: &str) -> StorageResult<Option<bool>> {
        let result = LoadTestRuns::update_many()
            .col_expr(RunColumn::HeartbeatAt, Expr::value(Utc::now()))
            .filter(RunColumn::Uuid.eq(id.0))
            .filter(RunColumn::Owner.eq(owner))
            .filter(RunColumn::Status.is_in(live_statuses()))
            .exec(self.db.get_connection())
            .await?;
        if result.rows_affected == 0 {
            return Ok(None);
        }

        let model = LoadTestRuns::find()
            .filter(RunColumn::Uuid.eq(id.0))
            .one(self.db.get_connection())
            .await?;
        Ok(model.map(|m| m.cancel_requested))
    }

    /// Ask whichever process owns a live run to cancel it.
    ///
    /// Returns `false` when the run is already terminal or missing.
    pub async fn request_cancel(&self, id: RunId) -> StorageResult<bool> {
        let result = LoadTestRuns::update_many()
            .col_expr(RunColumn::CancelRequested, Expr::value(true))
            .filter(RunColumn::Uuid.eq(id.0))
            .filter(RunColumn::Status.is_in(live_statuses()))
            .exec(self.db.get_connection())
            .await?;
        if result.rows_affected > 0 {
            info!(run_id = %id, "Cancel requested");
        }
        Ok(result.rows_affected > 0)
    }

    /// Fail live runs whose owner stopped renewing its lease.
    ///
    /// Runs without any heartbeat count as stale.
    pub async fn fail_stale_runs(&self, lease_timeout: Duration) -> StorageResult<u64> {
        let timeout = chrono::Duration::from_std(lease_timeout)
            .map_err(|e| StorageError::ConfigError(format!("lease timeout out of range: {}", e)))?;
        let cutoff = Utc::now() - timeout;

        let models = LoadTestRuns::find()
            .filter(RunColumn::Status.is_in(live_statuses()))
            .all(self.db.get_connection())
            .await?;

        let mut failed = 0;
        for model in models {
            if model.heartbeat_at.is_some_and(|at| at > cutoff) {
                continue;
            }
            let owner = model.owner.clone();
            let mut run = LoadTestRun::try_from(model)?;
            run.fail("interrupted: engine stopped renewing its lease before the run finished")?;
            if self.save(&run).await? {
                debug!(run_id = %run.id, owner = ?owner, "Stale run failed");
                failed += 1;
            }
        }
        if failed > 0 {
            warn!(count = failed, "Marked runs with expired leases as failed");
        }
        Ok(failed)
    }

    /// Summary over completed runs, optionally restricted to one method
    pub async fn summarize(&self, method: Option<MethodKind>) -> StorageResult<Option<RunSummary>> {
        let mut acc = Accumulator::default();
        for row in self.aggregate_groups().await? {
            if method.is_none_or(|m| m == row.method) {
                acc.add(&row);
            }
        }
        Ok(acc.finish(method, None))
    }

    /// One summary per (method, batch size) with completed runs
    pub async fn strategy_breakdown(&self) -> StorageResult<Vec<RunSummary>> {
        let mut groups: BTreeMap<(&'static str, Option<u32>), (MethodKind, Accumulator)> =
            BTreeMap::new();
        for row in self.aggregate_groups().await? {
            groups
                .entry((row.method.as_str(), row.batch_size))
                .or_insert_with(|| (row.method, Accumulator::default()))
                .1
                .add(&row);
        }

        Ok(groups
            .into_iter()
            .filter_map(|((_, batch_size), (method, acc))| acc.finish(Some(method), batch_size))
            .collect())
    }

    async fn aggregate_groups(&self) -> StorageResult<Vec<GroupRow>> {
        type Grouped = (String, Option<i32>, String, i64, Option<i64>, Option<i64>);
        let rows: Vec<Grouped> = LoadTestRuns::find()
            .select_only()
            .column(RunColumn::Method)
            .column(RunColumn::BatchSize)
            .column(RunColumn::Status)
            .column_as(Expr::col(RunColumn::Id).count(), "runs")
            .column_as(Expr::col(RunColumn::TotalMs).min(), "best_total_ms")
            .column_as(Expr::col(RunColumn::TotalMs).sum(), "sum_total_ms")
            .group_by(RunColumn::Method)
            .group_by(RunColumn::BatchSize)
            .group_by(RunColumn::Status)
            .into_tuple()
            .all(self.db.get_connection())
            .await?;

        rows.into_iter()
            .map(|(method, batch_size, status, runs, best, sum)| -> StorageResult<GroupRow> {
                Ok(GroupRow {
                    method: method.parse()?,
                    batch_size: batch_size.map(|b| b.max(0) as u32),
                    status: status.parse()?,
                    runs: runs.max(0) as u64,
                    best_total_ms: best.map(|v| v.max(0) as u64),
                    sum_total_ms: sum.map(|v| v.max(0) as u64),
                })
            })
            .collect()
    }
}
