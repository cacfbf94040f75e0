//! Engine facade: starts, tracks, cancels and deletes runs
//!
//! Every run executes in its own tokio task. A semaphore sized by
//! `max_concurrent_runs` admits runs; the rest wait in `pending`. Each active
//! run is tracked by its cancellation token and a watch channel that flips
//! once the run's task has finished.
//!
//! Several engines may share one database. The engine that starts a run owns
//! it and renews a lease on the record while the task lives; other engines
//! cancel through a persisted flag the owner picks up on its next renewal, and
//! only runs whose lease expired are ever failed by recovery.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use loadbench_config::LoadBenchConfig;
use loadbench_core::{
    BatchSizeRange, LoadTestRun, MethodKind, Phase, ProgressSnapshot, RunId, RunRequest, RunState,
};
use loadbench_storage::{
    DatabaseConnection, Pagination, RowRepository, RowWriter, RunFilters, RunPage, RunRepository,
    RunSummary, StorageError, StoredRow,
};
use tokio::sync::{watch, Semaphore};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExecutionError, ExecutionResult};
use crate::runner::{RunContext, RunExecutor};
use crate::telemetry::{ProgressHub, ProgressStream};

struct ActiveRun {
    cancel: CancellationToken,
    done: watch::Receiver<bool>,
}

/// Load test engine shared by all callers
#[derive(Clone)]
pub struct LoadTestEngine {
    ctx: RunContext,
    rows: RowRepository,
    batch_sizes: BatchSizeRange,
    admission: Arc<Semaphore>,
    active: Arc<Mutex<HashMap<RunId, ActiveRun>>>,
    /// Lease holder name written on every run this engine starts
    owner: Arc<str>,
}

impl LoadTestEngine {
    /// Engine writing rows through the row repository
    pub fn new(db: DatabaseConnection, config: &LoadBenchConfig) -> ExecutionResult<Self> {
        let writer = Arc::new(RowRepository::new(db.clone()));
        Self::with_writer(db, config, writer)
    }

    /// Engine writing rows through a custom writer
    pub fn with_writer(
        db: DatabaseConnection,
        config: &LoadBenchConfig,
        writer: Arc<dyn RowWriter>,
    ) -> ExecutionResult<Self> {
        let engine = &config.engine;
        let batch_sizes = BatchSizeRange::new(
            engine.batch_size_min,
            engine.batch_size_max,
            engine.default_batch_size,
        )?;
        let slots = engine.max_concurrent_runs.max(1) as usize;
        if (db.get_config().max_connections as usize) <= slots {
            warn!(
                max_connections = db.get_config().max_connections,
                max_concurrent_runs = slots,
                "Connection pool is not larger than the number of concurrent runs"
            );
        }

        Ok(Self {
            ctx: RunContext {
                runs: RunRepository::new(db.clone()),
                writer,
                hub: ProgressHub::new(config.telemetry.channel_capacity),
                engine: engine.clone(),
                telemetry: config.telemetry.clone(),
            },
            rows: RowRepository::new(db),
            batch_sizes,
            admission: Arc::new(Semaphore::new(slots)),
            active: Arc::new(Mutex::new(HashMap::new())),
            owner: format!("{}-{:08x}", std::process::id(), rand::random::<u32>()).into(),
        })
    }

    /// Connect and migrate when configured
    pub async fn from_config(config: &LoadBenchConfig) -> ExecutionResult<Self> {
        let db = DatabaseConnection::new(config.database.clone()).await?;
        if config.database.auto_migrate {
            db.migrate().await?;
        }
        Self::new(db, config)
    }

    /// Fail `pending`/`running` runs whose owner stopped renewing its lease.
    ///
    /// Runs still owned by a live engine, in this process or another, are left alone.
    pub async fn recover(&self) -> ExecutionResult<u64> {
        let timeout = Duration::from_millis(self.ctx.engine.lease_timeout_ms);
        Ok(self.ctx.runs.fail_stale_runs(timeout).await?)
    }

    /// Lease holder name of this engine
    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn batch_sizes(&self) -> BatchSizeRange {
        self.batch_sizes
    }

    fn active(&self) -> MutexGuard<'_, HashMap<RunId, ActiveRun>> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Validate the request, record a pending run and schedule it.
    ///
    /// Invalid requests fail here and leave no record behind.
    pub async fn start_run(&self, request: RunRequest) -> ExecutionResult<LoadTestRun> {
        if request.rows > self.ctx.engine.max_rows {
            return Err(ExecutionError::Configuration(format!(
                "rows must not exceed {}, got {}",
                self.ctx.engine.max_rows, request.rows
            )));
        }
        let config = request.into_config(&self.batch_sizes)?;
        let seed = config.seed.unwrap_or_else(rand::random);
        let run = LoadTestRun::new(config.with_seed(seed));

        self.ctx.runs.create_leased(&run, &self.owner).await?;
        self.ctx.hub.register(run.id);

        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(false);
        self.active().insert(
            run.id,
            ActiveRun {
                cancel: cancel.clone(),
                done: done_rx,
            },
        );

        let run_id = run.id;
        let ctx = self.ctx.clone();
        let admission = self.admission.clone();
        let active = self.active.clone();
        let pending = run.clone();
        let lease = tokio::spawn(keep_lease(
            self.ctx.runs.clone(),
            run.id,
            self.owner.clone(),
            Duration::from_millis(self.ctx.engine.lease_heartbeat_ms),
            cancel.clone(),
        ));

        tokio::spawn(async move {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                permit = admission.acquire_owned() => permit.ok(),
            };
            debug!(run_id = %run_id, admitted = permit.is_some(), "Run left the admission queue");

            let finished = RunExecutor::new(ctx, pending, cancel).execute().await;
            drop(permit);
            lease.abort();

            active.lock().unwrap_or_else(|e| e.into_inner()).remove(&run_id);
            // receivers may all be gone; nothing to report then
            let _ = done_tx.send(true);
            debug!(run_id = %run_id, state = %finished.state, "Run task finished");
        });

        info!(
            run_id = %run.id,
            method = %run.config.method,
            rows = run.config.rows,
            "Run scheduled"
        );
        Ok(run)
    }

    /// Current state of a run
    pub async fn get_run(&self, id: RunId) -> ExecutionResult<LoadTestRun> {
        self.ctx.runs.get(id).await.map_err(not_found)
    }

    /// Run history, newest first
    pub async fn list_runs(
        &self,
        filters: RunFilters,
        pagination: Pagination,
    ) -> ExecutionResult<RunPage> {
        Ok(self.ctx.runs.list(filters, pagination).await?)
    }

    /// Request cooperative cancellation.
    ///
    /// Runs owned by another engine are flagged on the ledger and cancelled by
    /// their owner. Returns `false` when the run already finished.
    pub async fn cancel_run(&self, id: RunId) -> ExecutionResult<bool> {
        if let Some(active) = self.active().get(&id) {
            active.cancel.cancel();
            info!(run_id = %id, "Cancellation requested");
            return Ok(true);
        }
        if self.ctx.runs.request_cancel(id).await? {
            return Ok(true);
        }
        self.get_run(id).await?;
        Ok(false)
    }

    /// Cancel if running, wait for the task, then remove the run and its rows
    pub async fn delete_run(&self, id: RunId) -> ExecutionResult<()> {
        self.cancel_run(id).await?;
        self.wait(id).await?;
        self.ctx.hub.close(id);
        if !self.ctx.runs.delete_with_rows(id).await? {
            return Err(ExecutionError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Resolve once the run reaches a terminal state.
    ///
    /// Local runs are awaited directly. Runs owned elsewhere are polled on the
    /// ledger, and failed by recovery if their owner's lease expires meanwhile.
    pub async fn wait(&self, id: RunId) -> ExecutionResult<LoadTestRun> {
        let done = self.active().get(&id).map(|active| active.done.clone());
        if let Some(mut done) = done {
            // an error means the task is gone, which is as good as done
            if done.wait_for(|finished| *finished).await.is_err() {
                warn!(run_id = %id, "Run task ended without signalling completion");
            }
            return self.get_run(id).await;
        }

        let poll = Duration::from_millis(self.ctx.engine.lease_heartbeat_ms);
        loop {
            let run = self.get_run(id).await?;
            if run.is_terminal() {
                return Ok(run);
            }
            self.recover().await?;
            tokio::time::sleep(poll).await;
        }
    }

    /// Aggregate over completed runs; `None` when there is no completed history
    pub async fn summarize(
        &self,
        method: Option<MethodKind>,
    ) -> ExecutionResult<Option<RunSummary>> {
        Ok(self.ctx.runs.summarize(method).await?)
    }

    /// One summary per (method, batch size) with completed runs
    pub async fn strategy_breakdown(&self) -> ExecutionResult<Vec<RunSummary>> {
        Ok(self.ctx.runs.strategy_breakdown().await?)
    }

    /// Live progress of a run.
    ///
    /// A run that already finished yields a single snapshot of its final state.
    pub async fn subscribe(&self, id: RunId) -> ExecutionResult<ProgressStream> {
        if let Some(stream) = self.ctx.hub.subscribe(id) {
            return Ok(stream);
        }
        let run = self.get_run(id).await?;
        Ok(Box::pin(tokio_stream::once(snapshot_of(&run))))
    }

    /// Committed rows of a run in ordinal order
    pub async fn rows(&self, id: RunId, limit: u64) -> ExecutionResult<Vec<StoredRow>> {
        let run = self.get_run(id).await?;
        Ok(self.rows.fetch(id, run.config.columns as usize, limit).await?)
    }

    /// Number of committed rows of a run
    pub async fn row_count(&self, id: RunId) -> ExecutionResult<u64> {
        self.get_run(id).await?;
        Ok(self.rows.count(id).await?)
    }

    /// Ids of runs whose task has not finished
    pub fn active_runs(&self) -> Vec<RunId> {
        self.active().keys().copied().collect()
    }
}

fn not_found(err: StorageError) -> ExecutionError {
    match err {
        StorageError::NotFound(id) => ExecutionError::NotFound(id),
        other => ExecutionError::Storage(other),
    }
}

/// Renew the lease on a run until it is terminal, turning a persisted cancel
/// request into a cancellation of the local token.
async fn keep_lease(
    runs: RunRepository,
    id: RunId,
    owner: Arc<str>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut ticks = tokio::time::interval(every);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the record was created with a fresh heartbeat
    ticks.tick().await;

    loop {
        ticks.tick().await;
        match runs.heartbeat(id, &owner).await {
            Ok(Some(true)) if !cancel.is_cancelled() => {
                info!(run_id = %id, "Cancel request picked up from the ledger");
                cancel.cancel();
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(run_id = %id, "Lease released");
                return;
            }
            Err(err) => warn!(run_id = %id, error = %err, "Lease renewal failed"),
        }
    }
}

/// Snapshot describing a run from its ledger record
fn snapshot_of(run: &LoadTestRun) -> ProgressSnapshot {
    let overall = match run.state {
        RunState::Completed => 100.0,
        state => state.phase().map_or(0.0, |phase: Phase| phase.base_progress()),
    };
    ProgressSnapshot {
        kind: ProgressSnapshot::kind_for(run.state),
        test_id: run.id,
        phase: run.state,
        overall_progress: overall,
        phase_progress: if run.state == RunState::Completed { 100.0 } else { 0.0 },
        rows_processed: run.counters.rows_inserted,
        rows_per_second: 0.0,
        eta: if run.is_terminal() { "0s".to_string() } else { "unknown".to_string() },
        message: run
            .error_message
            .clone()
            .unwrap_or_else(|| format!("Run {}", run.state)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loadbench_core::SnapshotKind;
    use loadbench_storage::testing::TestDatabase;
    use tokio_stream::StreamExt;

    fn config() -> LoadBenchConfig {
        let mut config = LoadBenchConfig::default();
        config.engine.batch_size_min = 1;
        config.engine.batch_size_max = 5000;
        config.engine.default_batch_size = 100;
        config.engine.max_concurrent_runs = 2;
        config
    }

    async fn engine(db: &TestDatabase) -> LoadTestEngine {
        LoadTestEngine::new(db.connection.clone(), &config()).unwrap()
    }

    #[tokio::test]
    async fn test_invalid_request_creates_no_record() {
        let db = TestDatabase::new().await.unwrap();
        let engine = engine(&db).await;

        let bad = [
            RunRequest::new(0, 10, 0, "batched"),
            RunRequest::new(10, 201, 0, "batched"),
            RunRequest::new(10, 10, 11, "single_row"),
            RunRequest::new(10, 10, 0, "bulk_copy"),
            RunRequest::new(10, 10, 0, "batched").with_batch_size(9000),
        ];
        for request in bad {
            let err = engine.start_run(request).await.unwrap_err();
            assert!(matches!(err, ExecutionError::Configuration(_)), "{err}");
        }
        let page = engine.list_runs(RunFilters::default(), Pagination::default()).await.unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn test_row_cap_rejects_oversized_runs() {
        let db = TestDatabase::new().await.unwrap();
        let mut config = config();
        config.engine.max_rows = 500;
        let engine = LoadTestEngine::new(db.connection.clone(), &config).unwrap();

        let err = engine.start_run(RunRequest::new(501, 10, 0, "batched")).await.unwrap_err();
        assert!(
            matches!(err, ExecutionError::Configuration(ref msg) if msg.contains("500")),
            "{err}"
        );
        let page = engine.list_runs(RunFilters::default(), Pagination::default()).await.unwrap();
        assert_eq!(page.total, 0);

        let run = engine.start_run(RunRequest::new(500, 10, 0, "batched")).await.unwrap();
        assert_eq!(engine.wait(run.id).await.unwrap().state, RunState::Completed);
    }

    #[tokio::test]
    async fn test_lease_is_released_with_the_run() {
        let db = TestDatabase::new().await.unwrap();
        let engine = engine(&db).await;
        let runs = RunRepository::new(db.connection.clone());

        let run = engine.start_run(RunRequest::new(30, 10, 0, "single_row")).await.unwrap();
        engine.wait(run.id).await.unwrap();

        // terminal runs hold no lease, so nothing is left to recover
        assert_eq!(runs.heartbeat(run.id, engine.owner()).await.unwrap(), None);
        assert_eq!(engine.recover().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_start_wait_and_inspect() {
        let db = TestDatabase::new().await.unwrap();
        let engine = engine(&db).await;

        let run = engine
            .start_run(RunRequest::new(120, 10, 2, "batched").with_batch_size(50).with_seed(5))
            .await
            .unwrap();
        assert_eq!(run.state, RunState::Pending);

        let finished = engine.wait(run.id).await.unwrap();
        assert_eq!(finished.state, RunState::Completed);
        assert_eq!(finished.counters.commit_count, 3);
        assert_eq!(engine.row_count(run.id).await.unwrap(), 120);

        let rows = engine.rows(run.id, 5).await.unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].values.len(), 10);
        assert!(engine.active_runs().is_empty());
        assert!(!engine.cancel_run(run.id).await.unwrap());

        // finished runs still answer subscriptions with their final state
        let events: Vec<_> = engine.subscribe(run.id).await.unwrap().collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SnapshotKind::Complete);
    }

    #[tokio::test]
    async fn test_unseeded_runs_record_their_seed() {
        let db = TestDatabase::new().await.unwrap();
        let engine = engine(&db).await;
        let run = engine.start_run(RunRequest::new(5, 10, 1, "single_row")).await.unwrap();
        assert!(run.config.seed.is_some());
        let finished = engine.wait(run.id).await.unwrap();
        assert_eq!(finished.config.seed, run.config.seed);
    }

    #[tokio::test]
    async fn test_delete_removes_run_and_rows() {
        let db = TestDatabase::new().await.unwrap();
        let engine = engine(&db).await;
        let run = engine.start_run(RunRequest::new(60, 10, 0, "single_row")).await.unwrap();
        engine.wait(run.id).await.unwrap();

        engine.delete_run(run.id).await.unwrap();
        assert!(matches!(engine.get_run(run.id).await, Err(ExecutionError::NotFound(_))));
        assert!(matches!(engine.row_count(run.id).await, Err(ExecutionError::NotFound(_))));
        assert!(matches!(engine.delete_run(run.id).await, Err(ExecutionError::NotFound(_))));
        assert_eq!(RowRepository::new(db.connection.clone()).count(run.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unknown_run() {
        let db = TestDatabase::new().await.unwrap();
        let engine = engine(&db).await;
        let id = RunId::new();
        assert!(matches!(engine.cancel_run(id).await, Err(ExecutionError::NotFound(_))));
        assert!(matches!(engine.subscribe(id).await, Err(ExecutionError::NotFound(_))));
        assert!(matches!(engine.wait(id).await, Err(ExecutionError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_summary_has_no_data_without_completed_runs() {
        let db = TestDatabase::new().await.unwrap();
        let engine = engine(&db).await;
        assert!(engine.summarize(None).await.unwrap().is_none());

        let run = engine.start_run(RunRequest::new(20, 10, 0, "single_row")).await.unwrap();
        engine.wait(run.id).await.unwrap();
        let summary = engine.summarize(Some(MethodKind::SingleRow)).await.unwrap().unwrap();
        assert_eq!(summary.count, 1);
        assert_eq!(summary.success_rate, 1.0);
        assert!(engine.summarize(Some(MethodKind::Batched)).await.unwrap().is_none());
    }
}
