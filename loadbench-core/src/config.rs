//! Run configuration: the immutable shape of a single load-test run

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LoadBenchError, Result};

/// Smallest accepted column count
pub const MIN_COLUMNS: u32 = 10;

/// Largest accepted column count, matches the width of the row table
pub const MAX_COLUMNS: u32 = 200;

/// Insert method discriminant, as it appears on the wire and in the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    /// One transaction per row
    SingleRow,
    /// One transaction per fixed-size batch
    Batched,
}

impl MethodKind {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodKind::SingleRow => "single_row",
            MethodKind::Batched => "batched",
        }
    }
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MethodKind {
    type Err = LoadBenchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single_row" | "single-row" | "single" => Ok(MethodKind::SingleRow),
            "batched" | "batch" => Ok(MethodKind::Batched),
            other => Err(LoadBenchError::UnknownMethod(other.to_string())),
        }
    }
}

/// Fully resolved insertion strategy selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsertMethod {
    SingleRow,
    Batched { batch_size: u32 },
}

impl InsertMethod {
    pub fn kind(&self) -> MethodKind {
        match self {
            InsertMethod::SingleRow => MethodKind::SingleRow,
            InsertMethod::Batched { .. } => MethodKind::Batched,
        }
    }

    /// Batch size for batched runs, `None` for single-row
    pub fn batch_size(&self) -> Option<u32> {
        match self {
            InsertMethod::SingleRow => None,
            InsertMethod::Batched { batch_size } => Some(*batch_size),
        }
    }

    /// Rebuild from the persisted (method, batch size) pair
    pub fn from_parts(kind: MethodKind, batch_size: Option<u32>) -> Result<Self> {
        match (kind, batch_size) {
            (MethodKind::SingleRow, _) => Ok(InsertMethod::SingleRow),
            (MethodKind::Batched, Some(size)) if size > 0 => {
                Ok(InsertMethod::Batched { batch_size: size })
            }
            (MethodKind::Batched, _) => Err(LoadBenchError::InvalidConfig(
                "batched method requires a positive batch size".to_string(),
            )),
        }
    }
}

impl fmt::Display for InsertMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsertMethod::SingleRow => write!(f, "single_row"),
            InsertMethod::Batched { batch_size } => write!(f, "batched({})", batch_size),
        }
    }
}

/// Permitted batch sizes for batched runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSizeRange {
    pub min: u32,
    pub max: u32,
    /// Used when a batched request carries no explicit size
    pub default: u32,
}

impl BatchSizeRange {
    pub fn new(min: u32, max: u32, default: u32) -> Result<Self> {
        let range = Self { min, max, default };
        range.check()?;
        Ok(range)
    }

    fn check(&self) -> Result<()> {
        if self.min == 0 {
            return Err(LoadBenchError::InvalidConfig(
                "batch size minimum must be at least 1".to_string(),
            ));
        }
        if !(self.min <= self.default && self.default <= self.max) {
            return Err(LoadBenchError::InvalidConfig(format!(
                "batch size range must satisfy min <= default <= max, got {}..={} default {}",
                self.min, self.max, self.default
            )));
        }
        Ok(())
    }

    pub fn contains(&self, size: u32) -> bool {
        size >= self.min && size <= self.max
    }
}

impl Default for BatchSizeRange {
    fn default() -> Self {
        Self {
            min: 2000,
            max: 5000,
            default: 3000,
        }
    }
}

/// Start-run request payload as received from callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    pub rows: u64,
    pub columns: u32,
    #[serde(default)]
    pub date_columns: u32,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_date_ratio: Option<f64>,
}

impl RunRequest {
    pub fn new(rows: u64, columns: u32, date_columns: u32, method: impl Into<String>) -> Self {
        Self {
            rows,
            columns,
            date_columns,
            method: method.into(),
            batch_size: None,
            seed: None,
            invalid_date_ratio: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_invalid_date_ratio(mut self, ratio: f64) -> Self {
        self.invalid_date_ratio = Some(ratio);
        self
    }

    /// Resolve the method string and batch size, then validate every bound
    pub fn into_config(self, batch_sizes: &BatchSizeRange) -> Result<RunConfig> {
        let kind: MethodKind = self.method.parse()?;
        let method = match kind {
            MethodKind::SingleRow => InsertMethod::SingleRow,
            MethodKind::Batched => {
                let batch_size = self.batch_size.unwrap_or(batch_sizes.default);
                if !batch_sizes.contains(batch_size) {
                    return Err(LoadBenchError::InvalidConfig(format!(
                        "batch size {} outside permitted range {}..={}",
                        batch_size, batch_sizes.min, batch_sizes.max
                    )));
                }
                InsertMethod::Batched { batch_size }
            }
        };

        let config = RunConfig {
            rows: self.rows,
            columns: self.columns,
            date_columns: self.date_columns,
            method,
            seed: self.seed,
            invalid_date_ratio: self.invalid_date_ratio.unwrap_or(0.0),
        };
        config.validate()?;
        Ok(config)
    }
}

/// Validated, immutable configuration of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub rows: u64,
    pub columns: u32,
    pub date_columns: u32,
    pub method: InsertMethod,
    /// Generator seed; unseeded configs get one drawn when the run starts
    pub seed: Option<u64>,
    /// Probability that a generated date cell is deliberately invalid
    pub invalid_date_ratio: f64,
}

impl RunConfig {
    /// Check shape bounds. Batch size range is checked by [`RunRequest::into_config`].
    pub fn validate(&self) -> Result<()> {
        if self.rows < 1 {
            return Err(LoadBenchError::InvalidConfig("rows must be at least 1".to_string()));
        }
        if self.columns < MIN_COLUMNS || self.columns > MAX_COLUMNS {
            return Err(LoadBenchError::InvalidConfig(format!(
                "columns must be between {} and {}, got {}",
                MIN_COLUMNS, MAX_COLUMNS, self.columns
            )));
        }
        if self.date_columns > self.columns {
            return Err(LoadBenchError::InvalidConfig(format!(
                "dateColumns ({}) cannot exceed columns ({})",
                self.date_columns, self.columns
            )));
        }
        if let InsertMethod::Batched { batch_size: 0 } = self.method {
            return Err(LoadBenchError::InvalidConfig("batch size must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.invalid_date_ratio) {
            return Err(LoadBenchError::InvalidConfig(format!(
                "invalidDateRatio must be within [0, 1], got {}",
                self.invalid_date_ratio
            )));
        }
        Ok(())
    }

    /// Same config with the seed fixed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> BatchSizeRange {
        BatchSizeRange::default()
    }

    #[test]
    fn test_method_kind_parsing() {
        assert_eq!("single_row".parse::<MethodKind>().unwrap(), MethodKind::SingleRow);
        assert_eq!("Batched".parse::<MethodKind>().unwrap(), MethodKind::Batched);
        assert!(matches!(
            "bulk".parse::<MethodKind>(),
            Err(LoadBenchError::UnknownMethod(_))
        ));
    }

    #[test]
    fn test_batched_request_uses_default_size() {
        let config = RunRequest::new(100, 20, 5, "batched").into_config(&range()).unwrap();
        assert_eq!(config.method, InsertMethod::Batched { batch_size: 3000 });
        assert_eq!(config.invalid_date_ratio, 0.0);
    }

    #[test]
    fn test_batch_size_outside_range_rejected() {
        let err = RunRequest::new(100, 20, 5, "batched")
            .with_batch_size(500)
            .into_config(&range())
            .unwrap_err();
        assert!(matches!(err, LoadBenchError::InvalidConfig(_)));

        let relaxed = BatchSizeRange::new(1, 5000, 3000).unwrap();
        let config = RunRequest::new(100, 20, 5, "batched")
            .with_batch_size(500)
            .into_config(&relaxed)
            .unwrap();
        assert_eq!(config.method.batch_size(), Some(500));
    }

    #[test]
    fn test_single_row_ignores_batch_size() {
        let config = RunRequest::new(10, 10, 0, "single_row")
            .with_batch_size(1)
            .into_config(&range())
            .unwrap();
        assert_eq!(config.method, InsertMethod::SingleRow);
    }

    #[test]
    fn test_shape_bounds() {
        let cases = [
            RunRequest::new(0, 20, 0, "single_row"),
            RunRequest::new(10, 9, 0, "single_row"),
            RunRequest::new(10, 201, 0, "single_row"),
            RunRequest::new(10, 20, 21, "single_row"),
            RunRequest::new(10, 20, 2, "single_row").with_invalid_date_ratio(1.5),
        ];
        for request in cases {
            assert!(
                request.clone().into_config(&range()).is_err(),
                "{:?} should be rejected",
                request
            );
        }

        assert!(RunRequest::new(1, 10, 10, "single_row").into_config(&range()).is_ok());
        assert!(RunRequest::new(1, 200, 0, "single_row").into_config(&range()).is_ok());
    }

    #[test]
    fn test_batch_range_validation() {
        assert!(BatchSizeRange::new(0, 10, 5).is_err());
        assert!(BatchSizeRange::new(10, 5, 7).is_err());
        assert!(BatchSizeRange::new(10, 20, 30).is_err());
        assert!(BatchSizeRange::new(10, 20, 10).is_ok());
    }

    #[test]
    fn test_request_wire_format() {
        let json = r#"{"rows":1000,"columns":20,"dateColumns":5,
            "method":"batched","batchSize":2500}"#;
        let request: RunRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.date_columns, 5);
        assert_eq!(request.batch_size, Some(2500));
        assert!(request.seed.is_none());
    }

    #[test]
    fn test_insert_method_from_parts() {
        assert_eq!(
            InsertMethod::from_parts(MethodKind::Batched, Some(10)).unwrap(),
            InsertMethod::Batched { batch_size: 10 }
        );
        assert!(InsertMethod::from_parts(MethodKind::Batched, None).is_err());
        assert_eq!(
            InsertMethod::from_parts(MethodKind::SingleRow, Some(10)).unwrap(),
            InsertMethod::SingleRow
        );
    }
}
