use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};

/// Persisted coarse run status
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum RunStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "running")]
    Running,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Persisted insert method
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
pub enum InsertMethod {
    #[sea_orm(string_value = "single_row")]
    SingleRow,
    #[sea_orm(string_value = "batched")]
    Batched,
}

/// One load-test run on the ledger
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "load_test_runs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Public run identifier
    #[sea_orm(unique)]
    pub uuid: Uuid,

    pub rows: i64,
    pub columns: i32,
    pub date_columns: i32,
    pub method: InsertMethod,
    pub batch_size: Option<i32>,
    /// Generator seed, stored bit-for-bit as a signed integer
    pub seed: Option<i64>,
    pub invalid_date_ratio: f64,

    pub status: RunStatus,
    /// Fine-grained state name (generating, validating, ...)
    pub phase: String,

    pub generation_ms: Option<i64>,
    pub validation_ms: Option<i64>,
    pub insertion_ms: Option<i64>,
    pub total_ms: Option<i64>,

    pub rows_generated: i64,
    pub rows_skipped: i64,
    pub rows_inserted: i64,
    pub commit_count: i64,

    pub error_message: Option<String>,

    pub created_at: ChronoDateTimeUtc,
    pub started_at: Option<ChronoDateTimeUtc>,
    pub completed_at: Option<ChronoDateTimeUtc>,

    /// Engine instance executing the run
    pub owner: Option<String>,
    /// Last liveness signal from the owner
    pub heartbeat_at: Option<ChronoDateTimeUtc>,
    /// Set by any process; the owner cancels at its next checkpoint
    pub cancel_requested: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
