//! Load-test run domain model and its state machine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::config::{InsertMethod, MethodKind, RunConfig};
use crate::error::{LoadBenchError, Result};

/// Unique identifier for a run (newtype pattern for type safety)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(pub Uuid);

impl RunId {
    /// Create a new random run ID
    pub fn new() -> Self {
        RunId(Uuid::new_v4())
    }

}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RunId {
    fn from(uuid: Uuid) -> Self {
        RunId(uuid)
    }
}

impl From<RunId> for Uuid {
    fn from(id: RunId) -> Self {
        id.0
    }
}

impl FromStr for RunId {
    type Err = LoadBenchError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s.trim())
            .map(RunId)
            .map_err(|e| LoadBenchError::Parse(format!("invalid run id '{}': {}", s, e)))
    }
}

/// Coarse run status exposed to callers and persisted on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub const ALL: [RunStatus; 5] = [
        RunStatus::Pending,
        RunStatus::Running,
        RunStatus::Completed,
        RunStatus::Failed,
        RunStatus::Cancelled,
    ];

    /// Check if the status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = LoadBenchError;

    fn from_str(s: &str) -> Result<Self> {
        RunStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| LoadBenchError::UnknownStatus(s.to_string()))
    }
}

/// Fine-grained run state driven by the executor.
///
/// States only move forward: `pending -> generating -> validating -> inserting
/// -> completed`. `failed` and `cancelled` are reachable from every
/// non-terminal state. Nothing leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Pending,
    Generating,
    Validating,
    Inserting,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    pub const ALL: [RunState; 7] = [
        RunState::Pending,
        RunState::Generating,
        RunState::Validating,
        RunState::Inserting,
        RunState::Completed,
        RunState::Failed,
        RunState::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Pending => "pending",
            RunState::Generating => "generating",
            RunState::Validating => "validating",
            RunState::Inserting => "inserting",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
            RunState::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Completed | RunState::Failed | RunState::Cancelled)
    }

    /// Collapse to the coarse status
    pub fn status(&self) -> RunStatus {
        match self {
            RunState::Pending => RunStatus::Pending,
            RunState::Generating | RunState::Validating | RunState::Inserting => RunStatus::Running,
            RunState::Completed => RunStatus::Completed,
            RunState::Failed => RunStatus::Failed,
            RunState::Cancelled => RunStatus::Cancelled,
        }
    }

    /// The timed phase this state belongs to, if any
    pub fn phase(&self) -> Option<Phase> {
        match self {
            RunState::Generating => Some(Phase::Generation),
            RunState::Validating => Some(Phase::Validation),
            RunState::Inserting => Some(Phase::Insertion),
            _ => None,
        }
    }

    /// Next state on the success path
    pub fn successor(&self) -> Option<RunState> {
        match self {
            RunState::Pending => Some(RunState::Generating),
            RunState::Generating => Some(RunState::Validating),
            RunState::Validating => Some(RunState::Inserting),
            RunState::Inserting => Some(RunState::Completed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: RunState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            RunState::Failed | RunState::Cancelled => true,
            other => self.successor() == Some(other),
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RunState {
    type Err = LoadBenchError;

    fn from_str(s: &str) -> Result<Self> {
        RunState::ALL
            .into_iter()
            .find(|state| state.as_str() == s.trim().to_ascii_lowercase())
            .ok_or_else(|| LoadBenchError::Parse(format!("unknown run phase '{}'", s)))
    }
}

/// A timed stage of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Generation,
    Validation,
    Insertion,
}

impl Phase {
    /// Share of overall progress attributed to this phase, in percent
    pub fn weight(&self) -> f64 {
        match self {
            Phase::Generation => 20.0,
            Phase::Validation => 10.0,
            Phase::Insertion => 70.0,
        }
    }

    /// Overall progress already accumulated when this phase starts
    pub fn base_progress(&self) -> f64 {
        match self {
            Phase::Generation => 0.0,
            Phase::Validation => Phase::Generation.weight(),
            Phase::Insertion => Phase::Generation.weight() + Phase::Validation.weight(),
        }
    }

    /// Map phase-local progress (0-100) onto overall progress (0-100)
    pub fn overall(&self, phase_progress: f64) -> f64 {
        let clamped = phase_progress.clamp(0.0, 100.0);
        self.base_progress() + self.weight() * clamped / 100.0
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Generation => "generation",
            Phase::Validation => "validation",
            Phase::Insertion => "insertion",
        };
        write!(f, "{}", name)
    }
}

/// Per-phase wall-clock durations in milliseconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseTimings {
    pub generation_ms: Option<u64>,
    pub validation_ms: Option<u64>,
    pub insertion_ms: Option<u64>,
    pub total_ms: Option<u64>,
}

impl PhaseTimings {
    pub fn record(&mut self, phase: Phase, ms: u64) {
        match phase {
            Phase::Generation => self.generation_ms = Some(ms),
            Phase::Validation => self.validation_ms = Some(ms),
            Phase::Insertion => self.insertion_ms = Some(ms),
        }
    }

    pub fn get(&self, phase: Phase) -> Option<u64> {
        match phase {
            Phase::Generation => self.generation_ms,
            Phase::Validation => self.validation_ms,
            Phase::Insertion => self.insertion_ms,
        }
    }

    /// Sum of the recorded phase durations
    pub fn phase_sum(&self) -> u64 {
        [self.generation_ms, self.validation_ms, self.insertion_ms]
            .into_iter()
            .flatten()
            .sum()
    }
}

/// Row bookkeeping for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowCounters {
    pub rows_generated: u64,
    pub rows_skipped: u64,
    pub rows_inserted: u64,
    /// Number of committed storage transactions
    pub commit_count: u64,
}

/// One benchmark execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTestRun {
    pub id: RunId,
    pub config: RunConfig,
    pub state: RunState,
    pub timings: PhaseTimings,
    pub counters: RowCounters,
    /// Set only when the run failed
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl LoadTestRun {
    /// Create a new pending run
    pub fn new(config: RunConfig) -> Self {
        Self {
            id: RunId::new(),
            config,
            state: RunState::Pending,
            timings: PhaseTimings::default(),
            counters: RowCounters::default(),
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Move to `next`, stamping start/completion times on the way
    pub fn transition(&mut self, next: RunState) -> Result<()> {
        if !self.state.can_transition_to(next) {
            return Err(LoadBenchError::InvalidTransition { from: self.state, to: next });
        }
        if self.state == RunState::Pending {
            self.started_at = Some(Utc::now());
        }
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        self.state = next;
        Ok(())
    }

    /// Mark the run failed with the triggering error
    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        self.transition(RunState::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }

    /// Project to the camelCase payload returned to callers
    pub fn to_resource(&self) -> RunResource {
        RunResource {
            id: self.id,
            rows: self.config.rows,
            columns: self.config.columns,
            date_columns: self.config.date_columns,
            method: self.config.method.kind(),
            batch_size: self.config.method.batch_size(),
            seed: self.config.seed,
            invalid_date_ratio: self.config.invalid_date_ratio,
            status: self.status(),
            phase: self.state,
            generation_ms: self.timings.generation_ms,
            validation_ms: self.timings.validation_ms,
            insertion_ms: self.timings.insertion_ms,
            total_ms: self.timings.total_ms,
            error_message: self.error_message.clone(),
            rows_generated: self.counters.rows_generated,
            rows_skipped: self.counters.rows_skipped,
            rows_inserted: self.counters.rows_inserted,
            commit_count: self.counters.commit_count,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// Run status payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResource {
    pub id: RunId,
    pub rows: u64,
    pub columns: u32,
    pub date_columns: u32,
    pub method: MethodKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub invalid_date_ratio: f64,
    pub status: RunStatus,
    pub phase: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insertion_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub rows_generated: u64,
    pub rows_skipped: u64,
    pub rows_inserted: u64,
    pub commit_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunResource {
    pub fn insert_method(&self) -> Result<InsertMethod> {
        InsertMethod::from_parts(self.method, self.batch_size)
    }
}
