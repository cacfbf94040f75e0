use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(LoadTestRuns::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LoadTestRuns::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LoadTestRuns::Uuid).uuid().not_null().unique_key())
                    .col(ColumnDef::new(LoadTestRuns::Rows).big_integer().not_null())
                    .col(ColumnDef::new(LoadTestRuns::Columns).integer().not_null())
                    .col(ColumnDef::new(LoadTestRuns::DateColumns).integer().not_null())
                    .col(ColumnDef::new(LoadTestRuns::Method).string_len(20).not_null())
                    .col(ColumnDef::new(LoadTestRuns::BatchSize).integer())
                    .col(ColumnDef::new(LoadTestRuns::Seed).big_integer())
                    .col(
                        ColumnDef::new(LoadTestRuns::InvalidDateRatio)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(LoadTestRuns::Status)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(
                        ColumnDef::new(LoadTestRuns::Phase)
                            .string_len(20)
                            .not_null()
                            .default("pending"),
                    )
                    .col(ColumnDef::new(LoadTestRuns::GenerationMs).big_integer())
                    .col(ColumnDef::new(LoadTestRuns::ValidationMs).big_integer())
                    .col(ColumnDef::new(LoadTestRuns::InsertionMs).big_integer())
                    .col(ColumnDef::new(LoadTestRuns::TotalMs).big_integer())
                    .col(
                        ColumnDef::new(LoadTestRuns::RowsGenerated)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LoadTestRuns::RowsSkipped)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LoadTestRuns::RowsInserted)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(LoadTestRuns::CommitCount)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(LoadTestRuns::ErrorMessage).text())
                    .col(
                        ColumnDef::new(LoadTestRuns::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(LoadTestRuns::StartedAt).timestamp_with_time_zone())
                    .col(ColumnDef::new(LoadTestRuns::CompletedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Index on status for history filters and aggregation
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_load_test_runs_status")
                    .table(LoadTestRuns::Table)
                    .col(LoadTestRuns::Status)
                    .to_owned(),
            )
            .await?;

        // Index on (method, batch_size) for per-strategy summaries
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_load_test_runs_method_batch")
                    .table(LoadTestRuns::Table)
                    .col(LoadTestRuns::Method)
                    .col(LoadTestRuns::BatchSize)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LoadTestRuns::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum LoadTestRuns {
    Table,
    Id,
    Uuid,
    Rows,
    Columns,
    DateColumns,
    Method,
    BatchSize,
    Seed,
    InvalidDateRatio,
    Status,
    Phase,
    GenerationMs,
    ValidationMs,
    InsertionMs,
    TotalMs,
    RowsGenerated,
    RowsSkipped,
    RowsInserted,
    CommitCount,
    ErrorMessage,
    CreatedAt,
    StartedAt,
    CompletedAt,
}
