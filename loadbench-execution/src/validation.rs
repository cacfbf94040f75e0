//! Date normalisation pass applied to every row before insertion

use loadbench_config::ValidationPolicy;
use loadbench_core::{dates, column_name, DatasetSchema, GeneratedRow};
use tracing::debug;

use crate::error::{ExecutionError, ExecutionResult};

/// Counters accumulated over a validation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationStats {
    pub rows_checked: u64,
    pub rows_skipped: u64,
    pub fields_nulled: u64,
}

/// Rewrites date cells to `YYYY-MM-DD` and applies the configured policy to
/// cells that do not resolve
#[derive(Debug, Clone)]
pub struct RowValidator {
    policy: ValidationPolicy,
    date_positions: Vec<usize>,
}

impl RowValidator {
    pub fn new(policy: ValidationPolicy, schema: &DatasetSchema) -> Self {
        Self {
            policy,
            date_positions: schema.date_positions(),
        }
    }

    pub fn policy(&self) -> ValidationPolicy {
        self.policy
    }

    /// Normalise one row. `Ok(None)` means the row was skipped.
    pub fn validate(
        &self,
        mut row: GeneratedRow,
        stats: &mut ValidationStats,
    ) -> ExecutionResult<Option<GeneratedRow>> {
        stats.rows_checked += 1;

        for &position in &self.date_positions {
            let Some(cell) = row.values.get_mut(position) else {
                return Err(ExecutionError::Validation(format!(
                    "row {} has no column {}",
                    row.ordinal,
                    column_name(position)
                )));
            };
            let Some(raw) = cell.as_deref() else {
                continue;
            };

            if let Some(canonical) = dates::normalize(raw) {
                *cell = Some(canonical);
                continue;
            }

            match self.policy {
                ValidationPolicy::SkipRow => {
                    debug!(
                        ordinal = row.ordinal,
                        column = %column_name(position),
                        value = raw,
                        "Skipping row with unparseable date"
                    );
                    stats.rows_skipped += 1;
                    return Ok(None);
                }
                ValidationPolicy::NullField => {
                    *cell = None;
                    stats.fields_nulled += 1;
                }
                ValidationPolicy::FailRun => {
                    return Err(ExecutionError::Validation(format!(
                        "row {} column {}: unparseable date '{}'",
                        row.ordinal,
                        column_name(position),
                        raw
                    )));
                }
            }
        }
        Ok(Some(row))
    }

    /// Normalise a chunk, keeping surviving rows in order
    pub fn validate_chunk(
        &self,
        rows: Vec<GeneratedRow>,
        stats: &mut ValidationStats,
    ) -> ExecutionResult<Vec<GeneratedRow>> {
        let mut kept = Vec::with_capacity(rows.len());
        for row in rows {
            if let Some(row) = self.validate(row, stats)? {
                kept.push(row);
            }
        }
        Ok(kept)
    }
}
