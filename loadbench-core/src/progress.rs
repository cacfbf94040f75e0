//! Progress event payload pushed to subscribers

use serde::{Deserialize, Serialize};

use crate::run::{RunId, RunState};

/// Event discriminant as it appears in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKind {
    Progress,
    Complete,
    Error,
}

/// Ephemeral view of a run's progress. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressSnapshot {
    #[serde(rename = "type")]
    pub kind: SnapshotKind,
    pub test_id: RunId,
    pub phase: RunState,
    /// 0-100 across the whole run
    pub overall_progress: f64,
    /// 0-100 within the current phase
    pub phase_progress: f64,
    pub rows_processed: u64,
    pub rows_per_second: f64,
    /// Human-readable remaining time, e.g. `1m 12s`
    pub eta: String,
    pub message: String,
}

impl ProgressSnapshot {
    /// Whether this is the last event a subscriber will receive
    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Event kind implied by a run state
    pub fn kind_for(state: RunState) -> SnapshotKind {
        match state {
            RunState::Failed => SnapshotKind::Error,
            // cancelled runs finish normally from the subscriber's view
            RunState::Completed | RunState::Cancelled => SnapshotKind::Complete,
            _ => SnapshotKind::Progress,
        }
    }

    /// Serialize as one JSON line
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_wire_shape() {
        let snapshot = ProgressSnapshot {
            kind: SnapshotKind::Progress,
            test_id: RunId::new(),
            phase: RunState::Inserting,
            overall_progress: 65.0,
            phase_progress: 50.0,
            rows_processed: 500,
            rows_per_second: 1200.5,
            eta: "1s".to_string(),
            message: "Inserted 500 of 1000 rows".to_string(),
        };
        let value: serde_json::Value = serde_json::from_str(&snapshot.to_json()).unwrap();
        assert_eq!(value["type"], "progress");
        assert_eq!(value["phase"], "inserting");
        assert_eq!(value["rowsProcessed"], 500);
        assert!(value.get("testId").is_some());
        assert!(!snapshot.is_terminal());
    }

    #[test]
    fn test_kind_for_terminal_states() {
        assert_eq!(ProgressSnapshot::kind_for(RunState::Completed), SnapshotKind::Complete);
        assert_eq!(ProgressSnapshot::kind_for(RunState::Cancelled), SnapshotKind::Complete);
        assert_eq!(ProgressSnapshot::kind_for(RunState::Failed), SnapshotKind::Error);
        assert_eq!(ProgressSnapshot::kind_for(RunState::Validating), SnapshotKind::Progress);
    }
}
