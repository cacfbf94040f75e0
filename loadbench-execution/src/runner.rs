//! Drives one run through generating, validating and inserting
//!
//! The executor is the only writer of its run's ledger record. It persists
//! the run at every phase boundary and once more in its terminal state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use loadbench_config::{EngineConfig, TelemetryConfig};
use loadbench_core::{DatasetSchema, GeneratedRow, LoadTestRun, Phase, RunState};
use loadbench_storage::{RowWriter, RunRepository};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::error::{ExecutionError, ExecutionResult};
use crate::generator::DatasetGenerator;
use crate::strategy::{self, StopReason};
use crate::telemetry::{ProgressHub, ProgressReporter};
use crate::validation::{RowValidator, ValidationStats};

/// Shared collaborators of every run
#[derive(Clone)]
pub struct RunContext {
    pub runs: RunRepository,
    pub writer: Arc<dyn RowWriter>,
    pub hub: ProgressHub,
    pub engine: EngineConfig,
    pub telemetry: TelemetryConfig,
}

/// How a phase ended
enum Step<T> {
    Continue(T),
    Cancelled,
}

/// Executes a single run to a terminal state
pub struct RunExecutor {
    ctx: RunContext,
    run: LoadTestRun,
    cancel: CancellationToken,
    reporter: ProgressReporter,
}

impl RunExecutor {
    pub fn new(ctx: RunContext, run: LoadTestRun, cancel: CancellationToken) -> Self {
        let reporter = ProgressReporter::new(ctx.hub.clone(), run.id, &ctx.telemetry);
        Self {
            ctx,
            run,
            cancel,
            reporter,
        }
    }

    /// Run to completion, failure or cancellation and return the final record
    pub async fn execute(self) -> LoadTestRun {
        let span = info_span!("load_test_run", run_id = %self.run.id);
        self.execute_inner().instrument(span).await
    }

    async fn execute_inner(mut self) -> LoadTestRun {
        let started = Instant::now();
        info!(
            rows = self.run.config.rows,
            columns = self.run.config.columns,
            date_columns = self.run.config.date_columns,
            method = %self.run.config.method,
            "Run started"
        );

        let (terminal, message) = match self.drive_phases().await {
            Ok(state) => (state, None),
            Err(err) => {
                error!(error = %err, state = %self.run.state, "Run failed");
                (RunState::Failed, Some(err.to_string()))
            }
        };

        self.finalize(terminal, message, started.elapsed()).await;
        self.run
    }

    async fn drive_phases(&mut self) -> ExecutionResult<RunState> {
        let (schema, rows) = match self.generate().await? {
            Step::Continue(generated) => generated,
            Step::Cancelled => return Ok(RunState::Cancelled),
        };
        let rows = match self.validate(&schema, rows).await? {
            Step::Continue(rows) => rows,
            Step::Cancelled => return Ok(RunState::Cancelled),
        };
        self.insert(rows).await
    }

    async fn enter(&mut self, state: RunState, total_rows: u64) -> ExecutionResult<()> {
        self.run.transition(state)?;
        self.persist().await?;
        self.reporter.enter_phase(state, total_rows);
        info!(phase = %state, rows = total_rows, "Phase started");
        Ok(())
    }

    async fn generate(&mut self) -> ExecutionResult<Step<(DatasetSchema, Vec<GeneratedRow>)>> {
        if self.cancel.is_cancelled() {
            return Ok(Step::Cancelled);
        }
        self.enter(RunState::Generating, self.run.config.rows).await?;

        let phase_start = Instant::now();
        let generator = DatasetGenerator::new(self.run.id, &self.run.config)
            .map_err(|e| ExecutionError::Generation(e.to_string()))?;
        // persisted with the next checkpoint so the run can be replayed
        self.run.config.seed = Some(generator.seed());
        let chunk_size = self.ctx.engine.generation_chunk_size.max(1) as usize;

        let mut rows = Vec::with_capacity(generator.row_count() as usize);
        let mut stream = generator.rows();
        loop {
            let before = rows.len();
            rows.extend(stream.by_ref().take(chunk_size));
            if rows.len() == before {
                break;
            }
            self.run.counters.rows_generated = rows.len() as u64;
            self.reporter.advance(rows.len() as u64);
            tokio::task::yield_now().await;
            if self.cancel.is_cancelled() {
                self.record(Phase::Generation, phase_start);
                return Ok(Step::Cancelled);
            }
        }

        self.record(Phase::Generation, phase_start);
        debug!(rows = rows.len(), seed = generator.seed(), "Dataset generated");
        Ok(Step::Continue((generator.schema().clone(), rows)))
    }

    async fn validate(
        &mut self,
        schema: &DatasetSchema,
        rows: Vec<GeneratedRow>,
    ) -> ExecutionResult<Step<Vec<GeneratedRow>>> {
        self.enter(RunState::Validating, rows.len() as u64).await?;

        let phase_start = Instant::now();
        let validator = RowValidator::new(self.ctx.engine.validation_policy, schema);
        let chunk_size = self.ctx.engine.validation_chunk_size.max(1) as usize;

        let mut stats = ValidationStats::default();
        let mut kept = Vec::with_capacity(rows.len());
        let mut pending = rows.into_iter().peekable();
        while pending.peek().is_some() {
            let chunk: Vec<GeneratedRow> = pending.by_ref().take(chunk_size).collect();
            let result = validator.validate_chunk(chunk, &mut stats);
            self.run.counters.rows_skipped = stats.rows_skipped;
            match result {
                Ok(valid) => kept.extend(valid),
                Err(err) => {
                    self.record(Phase::Validation, phase_start);
                    return Err(err);
                }
            }
            self.reporter.advance(stats.rows_checked);
            tokio::task::yield_now().await;
            if self.cancel.is_cancelled() {
                self.record(Phase::Validation, phase_start);
                return Ok(Step::Cancelled);
            }
        }

        self.record(Phase::Validation, phase_start);
        if stats.rows_skipped > 0 || stats.fields_nulled > 0 {
            warn!(
                skipped = stats.rows_skipped,
                nulled = stats.fields_nulled,
                policy = %validator.policy(),
                "Rows with unparseable dates"
            );
        }
        Ok(Step::Continue(kept))
    }

    async fn insert(&mut self, rows: Vec<GeneratedRow>) -> ExecutionResult<RunState> {
        self.enter(RunState::Inserting, rows.len() as u64).await?;

        let phase_start = Instant::now();
        let strategy = strategy::strategy_for(self.run.config.method);
        let outcome = strategy::drive(
            strategy.as_ref(),
            self.ctx.writer.as_ref(),
            &rows,
            &self.cancel,
            &mut self.reporter,
        )
        .await;

        self.record(Phase::Insertion, phase_start);
        self.run.counters.rows_inserted = outcome.rows_committed;
        self.run.counters.commit_count = outcome.commits;
        info!(
            strategy = strategy.name(),
            rows = outcome.rows_committed,
            commits = outcome.commits,
            "Insertion finished"
        );

        match outcome.stop {
            StopReason::Finished => Ok(RunState::Completed),
            StopReason::Cancelled => Ok(RunState::Cancelled),
            StopReason::Failed(err) => Err(err.into()),
        }
    }

    fn record(&mut self, phase: Phase, started: Instant) {
        let ms = started.elapsed().as_millis() as u64;
        self.run.timings.record(phase, ms);
    }

    async fn persist(&self) -> ExecutionResult<()> {
        if !self.ctx.runs.save(&self.run).await? {
            return Err(ExecutionError::InvalidState(format!(
                "run {} is no longer writable",
                self.run.id
            )));
        }
        Ok(())
    }

    async fn finalize(&mut self, terminal: RunState, message: Option<String>, elapsed: Duration) {
        let transition = match (&terminal, message) {
            (RunState::Failed, Some(message)) => self.run.fail(message),
            (RunState::Failed, None) => self.run.fail("run failed"),
            (state, _) => self.run.transition(*state),
        };
        if let Err(err) = transition {
            error!(error = %err, "Could not record terminal state");
        }

        // rounded up so the total never undercuts the floored phase times
        let total_ms = elapsed.as_micros().div_ceil(1000) as u64;
        self.run.timings.total_ms = Some(total_ms.max(self.run.timings.phase_sum()));

        if let Err(err) = self.persist().await {
            error!(error = %err, "Failed to persist terminal run state");
        }

        let summary = match self.run.state {
            RunState::Completed => format!(
                "Completed: {} rows inserted, {} skipped, {} ms",
                self.run.counters.rows_inserted, self.run.counters.rows_skipped, total_ms
            ),
            RunState::Cancelled => {
                format!("Cancelled after {} rows", self.run.counters.rows_inserted)
            }
            _ => self
                .run
                .error_message
                .clone()
                .unwrap_or_else(|| "Run failed".to_string()),
        };
        self.reporter.finish(self.run.state, summary);
        info!(state = %self.run.state, total_ms, "Run finished");
    }
}
