//! Insertion strategies
//!
//! A strategy splits validated rows into write units and commits each unit
//! through a [`RowWriter`]. Units run strictly in sequence. Cancellation is
//! observed only between units: once a unit's transaction is open it always
//! ends in commit or rollback before the token is looked at again.

use async_trait::async_trait;
use loadbench_core::{GeneratedRow, InsertMethod};
use loadbench_storage::{RowWriter, StorageError, StorageResult};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::telemetry::ProgressReporter;

/// How rows are grouped into committed units
#[async_trait]
pub trait InsertStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rows per committed unit
    fn unit_size(&self) -> usize;

    /// Commit one unit; nothing of it is visible on error
    async fn insert_unit(
        &self,
        writer: &dyn RowWriter,
        unit: &[GeneratedRow],
    ) -> StorageResult<u64>;
}

/// One insert and one commit per row
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleRowStrategy;

#[async_trait]
impl InsertStrategy for SingleRowStrategy {
    fn name(&self) -> &'static str {
        "single_row"
    }

    fn unit_size(&self) -> usize {
        1
    }

    async fn insert_unit(
        &self,
        writer: &dyn RowWriter,
        unit: &[GeneratedRow],
    ) -> StorageResult<u64> {
        let mut inserted = 0;
        for row in unit {
            writer.insert_one(row).await?;
            inserted += 1;
        }
        Ok(inserted)
    }
}

/// Fixed-size batches, each inside one explicit transaction
#[derive(Debug, Clone, Copy)]
pub struct BatchedStrategy {
    pub batch_size: usize,
}

#[async_trait]
impl InsertStrategy for BatchedStrategy {
    fn name(&self) -> &'static str {
        "batched"
    }

    fn unit_size(&self) -> usize {
        self.batch_size.max(1)
    }

    async fn insert_unit(
        &self,
        writer: &dyn RowWriter,
        unit: &[GeneratedRow],
    ) -> StorageResult<u64> {
        writer.insert_batch(unit).await
    }
}

/// Strategy implementing an insert method
pub fn strategy_for(method: InsertMethod) -> Box<dyn InsertStrategy> {
    match method {
        InsertMethod::SingleRow => Box::new(SingleRowStrategy),
        InsertMethod::Batched { batch_size } => Box::new(BatchedStrategy {
            batch_size: batch_size as usize,
        }),
    }
}

/// Why the insertion loop stopped
#[derive(Debug)]
pub enum StopReason {
    Finished,
    Cancelled,
    Failed(StorageError),
}

/// Result of driving a strategy over a set of rows
#[derive(Debug)]
pub struct InsertOutcome {
    pub rows_committed: u64,
    pub commits: u64,
    pub stop: StopReason,
}

/// Commit `rows` unit by unit, checking for cancellation between units
pub async fn drive(
    strategy: &dyn InsertStrategy,
    writer: &dyn RowWriter,
    rows: &[GeneratedRow],
    cancel: &CancellationToken,
    reporter: &mut ProgressReporter,
) -> InsertOutcome {
    let mut outcome = InsertOutcome {
        rows_committed: 0,
        commits: 0,
        stop: StopReason::Finished,
    };

    for (index, unit) in rows.chunks(strategy.unit_size()).enumerate() {
        if cancel.is_cancelled() {
            debug!(
                strategy = strategy.name(),
                batch = index,
                "Cancellation observed between units"
            );
            outcome.stop = StopReason::Cancelled;
            return outcome;
        }

        match strategy.insert_unit(writer, unit).await {
            Ok(inserted) => {
                outcome.rows_committed += inserted;
                outcome.commits += 1;
                if strategy.unit_size() > 1 {
                    debug!(
                        strategy = strategy.name(),
                        batch = index,
                        rows = inserted,
                        "Unit committed"
                    );
                }
                reporter.advance(outcome.rows_committed);
            }
            Err(error) => {
                outcome.stop = StopReason::Failed(error);
                return outcome;
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::ProgressHub;
    use loadbench_config::TelemetryConfig;
    use loadbench_core::RunId;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Records committed rows; fails the unit containing `fail_at`
    #[derive(Default)]
    struct MemoryWriter {
        committed: AtomicU64,
        transactions: AtomicU64,
        fail_at: Option<u64>,
        cancel_after: Option<(u64, CancellationToken)>,
    }

    impl MemoryWriter {
        fn commit(&self, rows: &[GeneratedRow]) -> StorageResult<u64> {
            if let Some(fail_at) = self.fail_at {
                if rows.iter().any(|r| r.ordinal == fail_at) {
                    return Err(StorageError::QueryFailed("disk full".into()));
                }
            }
            let count = rows.len() as u64;
            let total = self.committed.fetch_add(count, Ordering::SeqCst) + count;
            self.transactions.fetch_add(1, Ordering::SeqCst);
            if let Some((after, token)) = &self.cancel_after {
                if total >= *after {
                    token.cancel();
                }
            }
            Ok(rows.len() as u64)
        }
    }

    #[async_trait]
    impl RowWriter for MemoryWriter {
        async fn insert_one(&self, row: &GeneratedRow) -> StorageResult<()> {
            self.commit(std::slice::from_ref(row)).map(|_| ())
        }

        async fn insert_batch(&self, rows: &[GeneratedRow]) -> StorageResult<u64> {
            self.commit(rows)
        }
    }

    fn rows(n: u64) -> Vec<GeneratedRow> {
        let run_id = RunId::new();
        (0..n)
            .map(|ordinal| GeneratedRow {
                run_id,
                ordinal,
                values: vec![Some("x".into()); 10],
            })
            .collect()
    }

    fn reporter() -> ProgressReporter {
        let hub = ProgressHub::new(4);
        ProgressReporter::new(hub, RunId::new(), &TelemetryConfig::default())
    }

    async fn drive_all(
        strategy: &dyn InsertStrategy,
        writer: &MemoryWriter,
        rows: &[GeneratedRow],
    ) -> InsertOutcome {
        drive(strategy, writer, rows, &CancellationToken::new(), &mut reporter()).await
    }

    #[tokio::test]
    async fn test_batched_commits_in_units() {
        let writer = MemoryWriter::default();
        let strategy = strategy_for(InsertMethod::Batched { batch_size: 500 });
        let outcome = drive_all(strategy.as_ref(), &writer, &rows(1000)).await;
        assert!(matches!(outcome.stop, StopReason::Finished));
        assert_eq!(outcome.rows_committed, 1000);
        assert_eq!(outcome.commits, 2);
        assert_eq!(writer.transactions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_single_row_commits_each_row() {
        let writer = MemoryWriter::default();
        let strategy = strategy_for(InsertMethod::SingleRow);
        let outcome = drive_all(strategy.as_ref(), &writer, &rows(10)).await;
        assert_eq!(outcome.rows_committed, 10);
        assert_eq!(outcome.commits, 10);
    }

    #[tokio::test]
    async fn test_failure_stops_at_failing_batch() {
        let writer = MemoryWriter {
            fail_at: Some(250),
            ..Default::default()
        };
        let strategy = BatchedStrategy { batch_size: 100 };
        let outcome = drive_all(&strategy, &writer, &rows(1000)).await;
        assert!(matches!(outcome.stop, StopReason::Failed(_)));
        assert_eq!(outcome.rows_committed, 200);
        assert_eq!(writer.committed.load(Ordering::SeqCst), 200);
    }

    #[tokio::test]
    async fn test_cancellation_between_batches() {
        let token = CancellationToken::new();
        let writer = MemoryWriter {
            cancel_after: Some((300, token.clone())),
            ..Default::default()
        };
        let strategy = BatchedStrategy { batch_size: 100 };
        let outcome = drive(&strategy, &writer, &rows(1000), &token, &mut reporter()).await;
        assert!(matches!(outcome.stop, StopReason::Cancelled));
        // the batch in flight when cancel arrived still committed in full
        assert_eq!(outcome.rows_committed, 300);
        assert_eq!(outcome.rows_committed % 100, 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_commits_nothing() {
        let token = CancellationToken::new();
        token.cancel();
        let writer = MemoryWriter::default();
        let outcome = drive(&SingleRowStrategy, &writer, &rows(5), &token, &mut reporter()).await;
        assert!(matches!(outcome.stop, StopReason::Cancelled));
        assert_eq!(outcome.commits, 0);
    }
}
