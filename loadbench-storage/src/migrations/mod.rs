use sea_orm_migration::prelude::*;

mod m20250301_000001_create_load_test_runs;
mod m20250301_000002_create_generated_rows;
mod m20250315_000003_add_run_leases;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_load_test_runs::Migration),
            Box::new(m20250301_000002_create_generated_rows::Migration),
            Box::new(m20250315_000003_add_run_leases::Migration),
        ]
    }
}
