//! Database entities

pub mod generated_rows;
pub mod load_test_runs;

pub use generated_rows::GeneratedRows;
pub use load_test_runs::{
    ActiveModel as RunActiveModel, Column as RunColumn, Entity as LoadTestRuns, Model as RunModel,
};

use loadbench_core::{
    InsertMethod as CoreInsertMethod, LoadTestRun, MethodKind, PhaseTimings, RowCounters, RunConfig,
    RunId, RunState, RunStatus as CoreRunStatus,
};
use sea_orm::Set;

use crate::error::{StorageError, StorageResult};

impl From<CoreRunStatus> for load_test_runs::RunStatus {
    fn from(status: CoreRunStatus) -> Self {
        match status {
            CoreRunStatus::Pending => Self::Pending,
            CoreRunStatus::Running => Self::Running,
            CoreRunStatus::Completed => Self::Completed,
            CoreRunStatus::Failed => Self::Failed,
            CoreRunStatus::Cancelled => Self::Cancelled,
        }
    }
}

impl From<load_test_runs::RunStatus> for CoreRunStatus {
    fn from(status: load_test_runs::RunStatus) -> Self {
        use load_test_runs::RunStatus as S;
        match status {
            S::Pending => Self::Pending,
            S::Running => Self::Running,
            S::Completed => Self::Completed,
            S::Failed => Self::Failed,
            S::Cancelled => Self::Cancelled,
        }
    }
}

impl From<MethodKind> for load_test_runs::InsertMethod {
    fn from(kind: MethodKind) -> Self {
        match kind {
            MethodKind::SingleRow => Self::SingleRow,
            MethodKind::Batched => Self::Batched,
        }
    }
}

impl From<load_test_runs::InsertMethod> for MethodKind {
    fn from(method: load_test_runs::InsertMethod) -> Self {
        match method {
            load_test_runs::InsertMethod::SingleRow => Self::SingleRow,
            load_test_runs::InsertMethod::Batched => Self::Batched,
        }
    }
}

fn to_db_ms(ms: Option<u64>) -> Option<i64> {
    ms.map(|v| v as i64)
}

fn from_db_ms(ms: Option<i64>) -> Option<u64> {
    ms.map(|v| v.max(0) as u64)
}

/// Active model carrying every column of a run, for insert
pub fn to_active_model(run: &LoadTestRun) -> RunActiveModel {
    RunActiveModel {
        uuid: Set(run.id.0),
        rows: Set(run.config.rows as i64),
        columns: Set(run.config.columns as i32),
        date_columns: Set(run.config.date_columns as i32),
        method: Set(run.config.method.kind().into()),
        batch_size: Set(run.config.method.batch_size().map(|s| s as i32)),
        // u64 -> i64 keeps the bit pattern; reversed on load
        seed: Set(run.config.seed.map(|s| s as i64)),
        invalid_date_ratio: Set(run.config.invalid_date_ratio),
        status: Set(run.status().into()),
        phase: Set(run.state.as_str().to_string()),
        generation_ms: Set(to_db_ms(run.timings.generation_ms)),
        validation_ms: Set(to_db_ms(run.timings.validation_ms)),
        insertion_ms: Set(to_db_ms(run.timings.insertion_ms)),
        total_ms: Set(to_db_ms(run.timings.total_ms)),
        rows_generated: Set(run.counters.rows_generated as i64),
        rows_skipped: Set(run.counters.rows_skipped as i64),
        rows_inserted: Set(run.counters.rows_inserted as i64),
        commit_count: Set(run.counters.commit_count as i64),
        error_message: Set(run.error_message.clone()),
        created_at: Set(run.created_at),
        started_at: Set(run.started_at),
        completed_at: Set(run.completed_at),
        ..Default::default()
    }
}

impl TryFrom<RunModel> for LoadTestRun {
    type Error = StorageError;

    fn try_from(model: RunModel) -> StorageResult<Self> {
        let batch_size = model
            .batch_size
            .map(|s| {
                u32::try_from(s)
                    .map_err(|_| StorageError::CorruptRecord(format!("negative batch size {}", s)))
            })
            .transpose()?;
        let method = CoreInsertMethod::from_parts(model.method.into(), batch_size)?;
        let state: RunState = model.phase.parse()?;
        let status: CoreRunStatus = model.status.into();
        if state.status() != status {
            return Err(StorageError::CorruptRecord(format!(
                "run {} has status '{}' but phase '{}'",
                model.uuid, status, state
            )));
        }

        Ok(LoadTestRun {
            id: RunId(model.uuid),
            config: RunConfig {
                rows: model.rows.max(0) as u64,
                columns: model.columns.max(0) as u32,
                date_columns: model.date_columns.max(0) as u32,
                method,
                seed: model.seed.map(|s| s as u64),
                invalid_date_ratio: model.invalid_date_ratio,
            },
            state,
            timings: PhaseTimings {
                generation_ms: from_db_ms(model.generation_ms),
                validation_ms: from_db_ms(model.validation_ms),
                insertion_ms: from_db_ms(model.insertion_ms),
                total_ms: from_db_ms(model.total_ms),
            },
            counters: RowCounters {
                rows_generated: model.rows_generated.max(0) as u64,
                rows_skipped: model.rows_skipped.max(0) as u64,
                rows_inserted: model.rows_inserted.max(0) as u64,
                commit_count: model.commit_count.max(0) as u64,
            },
            error_message: model.error_message,
            created_at: model.created_at,
            started_at: model.started_at,
            completed_at: model.completed_at,
        })
    }
}
