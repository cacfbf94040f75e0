use loadbench_core::{column_name, MAX_COLUMNS};
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let mut table = Table::create();
        table
            .table(GeneratedRows::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(GeneratedRows::Id)
                    .integer()
                    .not_null()
                    .auto_increment()
                    .primary_key(),
            )
            .col(ColumnDef::new(GeneratedRows::RunId).uuid().not_null())
            .col(ColumnDef::new(GeneratedRows::Ordinal).big_integer().not_null());

        // Wide value columns col_1..col_200, all nullable text
        for index in 0..MAX_COLUMNS as usize {
            table.col(ColumnDef::new(Alias::new(column_name(index))).text().null());
        }

        table.foreign_key(
            ForeignKey::create()
                .name("fk_generated_rows_run_id")
                .from(GeneratedRows::Table, GeneratedRows::RunId)
                .to(LoadTestRuns::Table, LoadTestRuns::Uuid)
                .on_delete(ForeignKeyAction::Cascade),
        );

        manager.create_table(table.to_owned()).await?;

        // Index on run_id for per-run counts and bulk deletion
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_generated_rows_run_id")
                    .table(GeneratedRows::Table)
                    .col(GeneratedRows::RunId)
                    .to_owned(),
            )
            .await?;

        // A row position exists at most once per run
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_generated_rows_run_ordinal")
                    .table(GeneratedRows::Table)
                    .col(GeneratedRows::RunId)
                    .col(GeneratedRows::Ordinal)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(GeneratedRows::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum GeneratedRows {
    Table,
    Id,
    RunId,
    Ordinal,
}

#[derive(Iden)]
enum LoadTestRuns {
    Table,
    Uuid,
}
