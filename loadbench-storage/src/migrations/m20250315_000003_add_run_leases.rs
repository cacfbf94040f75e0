use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // SQLite adds one column per ALTER TABLE
        manager
            .alter_table(
                Table::alter()
                    .table(LoadTestRuns::Table)
                    .add_column(ColumnDef::new(LoadTestRuns::Owner).string_len(64).null())
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(LoadTestRuns::Table)
                    .add_column(
                        ColumnDef::new(LoadTestRuns::HeartbeatAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(LoadTestRuns::Table)
                    .add_column(
                        ColumnDef::new(LoadTestRuns::CancelRequested)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let columns = [
            LoadTestRuns::CancelRequested,
            LoadTestRuns::HeartbeatAt,
            LoadTestRuns::Owner,
        ];
        for column in columns {
            manager
                .alter_table(
                    Table::alter()
                        .table(LoadTestRuns::Table)
                        .drop_column(column)
                        .to_owned(),
                )
                .await?;
        }
        Ok(())
    }
}

#[derive(Iden)]
enum LoadTestRuns {
    Table,
    Owner,
    HeartbeatAt,
    CancelRequested,
}
