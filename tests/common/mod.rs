//! Shared fixtures for the loadbench integration tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loadbench_config::LoadBenchConfig;
use loadbench_core::GeneratedRow;
use loadbench_execution::LoadTestEngine;
use loadbench_storage::testing::TestDatabase;
use loadbench_storage::{RowRepository, RowWriter, StorageError, StorageResult};
use tokio::sync::Notify;

/// Engine configuration suitable for small test datasets
pub fn test_config() -> LoadBenchConfig {
    let mut config = LoadBenchConfig::default();
    config.engine.batch_size_min = 1;
    config.engine.batch_size_max = 5000;
    config.engine.default_batch_size = 100;
    config.engine.max_concurrent_runs = 4;
    config.telemetry.publish_interval_ms = 1;
    // short lease renewals so ledger cancel requests land quickly
    config.engine.lease_heartbeat_ms = 20;
    config
}

/// Opt-in log output with `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn engine(db: &TestDatabase) -> LoadTestEngine {
    engine_with(db, test_config(), Arc::new(RowRepository::new(db.connection.clone())))
}

pub fn engine_with(
    db: &TestDatabase,
    config: LoadBenchConfig,
    writer: Arc<dyn RowWriter>,
) -> LoadTestEngine {
    LoadTestEngine::with_writer(db.connection.clone(), &config, writer)
        .expect("engine config is valid")
}

/// Row writer that wraps the real repository with hooks for timing and failures
pub struct InstrumentedWriter {
    inner: RowRepository,
    delay: Duration,
    fail_on_unit: Option<u64>,
    units: AtomicU64,
    pub first_unit: Notify,
}

impl InstrumentedWriter {
    pub fn new(db: &TestDatabase) -> Self {
        Self {
            inner: RowRepository::new(db.connection.clone()),
            delay: Duration::ZERO,
            fail_on_unit: None,
            units: AtomicU64::new(0),
            first_unit: Notify::new(),
        }
    }

    /// Sleep before every committed unit
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail the n-th unit (1-based) without writing anything
    pub fn failing_on(mut self, unit: u64) -> Self {
        self.fail_on_unit = Some(unit);
        self
    }

    pub fn units(&self) -> u64 {
        self.units.load(Ordering::SeqCst)
    }

    async fn before_unit(&self) -> StorageResult<()> {
        let unit = self.units.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_unit == Some(unit) {
            return Err(StorageError::QueryFailed(format!("injected failure on unit {}", unit)));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }

    fn after_unit(&self) {
        if self.units() == 1 {
            self.first_unit.notify_one();
        }
    }
}

#[async_trait]
impl RowWriter for InstrumentedWriter {
    async fn insert_one(&self, row: &GeneratedRow) -> StorageResult<()> {
        self.before_unit().await?;
        self.inner.insert_one(row).await?;
        self.after_unit();
        Ok(())
    }

    async fn insert_batch(&self, rows: &[GeneratedRow]) -> StorageResult<u64> {
        self.before_unit().await?;
        let inserted = self.inner.insert_batch(rows).await?;
        self.after_unit();
        Ok(inserted)
    }
}

/// Whether a value is a canonical `YYYY-MM-DD` calendar date
pub fn is_canonical_date(value: &str) -> bool {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(|date| date.format("%Y-%m-%d").to_string() == value)
        .unwrap_or(false)
}
