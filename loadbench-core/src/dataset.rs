//! Dataset shape and generated row representation

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::run::RunId;

/// Storage column name for a zero-based position, `col_1..col_N`
pub fn column_name(index: usize) -> String {
    format!("col_{}", index + 1)
}

/// Semantic kind of a non-date column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    FirstName,
    LastName,
    FullName,
    Email,
    Phone,
    Company,
    JobTitle,
    Department,
    StreetAddress,
    City,
    State,
    PostalCode,
    Country,
    Username,
    Website,
    Notes,
}

impl FieldKind {
    pub const ALL: [FieldKind; 16] = [
        FieldKind::FirstName,
        FieldKind::LastName,
        FieldKind::FullName,
        FieldKind::Email,
        FieldKind::Phone,
        FieldKind::Company,
        FieldKind::JobTitle,
        FieldKind::Department,
        FieldKind::StreetAddress,
        FieldKind::City,
        FieldKind::State,
        FieldKind::PostalCode,
        FieldKind::Country,
        FieldKind::Username,
        FieldKind::Website,
        FieldKind::Notes,
    ];
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// What a column position holds for the duration of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "field", rename_all = "snake_case")]
pub enum ColumnKind {
    Date,
    Field(FieldKind),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn is_date(&self) -> bool {
        matches!(self.kind, ColumnKind::Date)
    }
}

/// Column layout of one run, fixed for all of its rows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSchema {
    pub columns: Vec<ColumnSpec>,
}

impl DatasetSchema {
    pub fn from_kinds(kinds: Vec<ColumnKind>) -> Self {
        let columns = kinds
            .into_iter()
            .enumerate()
            .map(|(i, kind)| ColumnSpec {
                name: column_name(i),
                kind,
            })
            .collect();
        Self { columns }
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Zero-based positions of the date columns, ascending
    pub fn date_positions(&self) -> Vec<usize> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_date())
            .map(|(i, _)| i)
            .collect()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// One synthetic record belonging to exactly one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedRow {
    pub run_id: RunId,
    /// Zero-based position in the run's dataset
    pub ordinal: u64,
    /// Values by column position; `None` maps to NULL
    pub values: Vec<Option<String>>,
}

impl GeneratedRow {
    /// Ordered (column name, value) pairs
    pub fn fields(&self) -> impl Iterator<Item = (String, Option<&str>)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(i, v)| (column_name(i), v.as_deref()))
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }
}
