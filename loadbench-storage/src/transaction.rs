//! Scoped transactions with guaranteed commit-or-rollback
//!
//! A [`ScopedTransaction`] is opened per unit of work (one row or one batch).
//! It ends in exactly one of three ways: an explicit commit, an explicit
//! rollback, or a drop. A dropped transaction (early return, task abort or
//! panic) is rolled back by the underlying connection, so partially staged
//! work is never visible to other readers.

use sea_orm::{ConnectionTrait, DatabaseTransaction, Statement, TransactionTrait};
use tracing::{debug, warn};

use crate::connection::DatabaseConnection;
use crate::error::{StorageError, StorageResult};

/// Transaction wrapper tracking its own completion state
pub struct ScopedTransaction {
    inner: Option<DatabaseTransaction>,
    label: &'static str,
    statements: usize,
    committed: bool,
    rolled_back: bool,
}

impl ScopedTransaction {
    /// Begin a new transaction on a pooled connection
    pub async fn begin(db: &DatabaseConnection, label: &'static str) -> StorageResult<Self> {
        let tx = db
            .get_connection()
            .begin()
            .await
            .map_err(|e| {
                StorageError::TransactionFailed(format!("{}: begin failed: {}", label, e))
            })?;
        Ok(Self {
            inner: Some(tx),
            label,
            statements: 0,
            committed: false,
            rolled_back: false,
        })
    }

    /// Borrow the open transaction for entity operations
    pub fn connection(&self) -> StorageResult<&DatabaseTransaction> {
        self.check_state()?;
        self.inner.as_ref().ok_or_else(|| self.finalized())
    }

    /// Execute one statement inside the transaction
    pub async fn execute(&mut self, statement: Statement) -> StorageResult<u64> {
        let result = self.connection()?.execute(statement).await?;
        self.statements += 1;
        Ok(result.rows_affected())
    }

    /// Execute statements in order; the first failure rolls everything back
    pub async fn execute_all(mut self, statements: Vec<Statement>) -> StorageResult<u64> {
        let mut affected = 0;
        for statement in statements {
            match self.execute(statement).await {
                Ok(rows) => affected += rows,
                Err(error) => {
                    if let Err(rollback_error) = self.rollback().await {
                        warn!(
                            label = self.label,
                            error = %rollback_error,
                            "Rollback after failed statement also failed"
                        );
                    }
                    return Err(error);
                }
            }
        }
        self.commit().await?;
        Ok(affected)
    }

    /// Number of statements executed so far
    pub fn statement_count(&self) -> usize {
        self.statements
    }

    /// Commit the transaction
    pub async fn commit(&mut self) -> StorageResult<()> {
        self.check_state()?;
        let tx = self.take()?;
        tx.commit()
            .await
            .map_err(|e| {
                StorageError::TransactionFailed(format!("{}: commit failed: {}", self.label, e))
            })?;
        self.committed = true;
        debug!(label = self.label, statements = self.statements, "Transaction committed");
        Ok(())
    }

    /// Roll back the transaction
    pub async fn rollback(&mut self) -> StorageResult<()> {
        self.check_state()?;
        let tx = self.take()?;
        self.rolled_back = true;
        tx.rollback()
            .await
            .map_err(|e| {
                StorageError::TransactionFailed(format!("{}: rollback failed: {}", self.label, e))
            })?;
        debug!(label = self.label, statements = self.statements, "Transaction rolled back");
        Ok(())
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    fn take(&mut self) -> StorageResult<DatabaseTransaction> {
        let label = self.label;
        self.inner.take().ok_or_else(|| finalized(label))
    }

    fn finalized(&self) -> StorageError {
        finalized(self.label)
    }

    /// Check if transaction is in valid state
    fn check_state(&self) -> StorageResult<()> {
        if self.committed {
            return Err(StorageError::TransactionFailed(format!(
                "{}: transaction already committed",
                self.label
            )));
        }
        if self.rolled_back {
            return Err(StorageError::TransactionFailed(format!(
                "{}: transaction already rolled back",
                self.label
            )));
        }
        Ok(())
    }
}

fn finalized(label: &str) -> StorageError {
    StorageError::TransactionFailed(format!("{}: transaction already finalized", label))
}

impl Drop for ScopedTransaction {
    fn drop(&mut self) {
        if self.inner.is_some() {
            // DatabaseTransaction rolls back on drop
            warn!(
                label = self.label,
                statements = self.statements,
                "Transaction dropped before commit; rolling back"
            );
        }
    }
}
