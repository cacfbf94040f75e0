//! Wide generated-row table.
//!
//! The value columns `col_1..col_200` are addressed dynamically, so the
//! table is described by identifiers rather than a fixed entity model.

use loadbench_core::column_name;
use sea_orm::sea_query::Alias;
use sea_orm::DeriveIden;

#[derive(DeriveIden, Clone, Copy)]
pub enum GeneratedRows {
    Table,
    Id,
    RunId,
    Ordinal,
}

/// Identifier of the value column at a zero-based position
pub fn value_column(index: usize) -> Alias {
    Alias::new(column_name(index))
}
