//! Progress snapshots and live status frames exported for monitoring.

use serde::{Deserialize, Serialize};

use crate::task::TaskStatus;

/// Nested progress snapshot for one walker and its subtree.
///
/// This shape is the export contract for downstream tooling: `level`,
/// `status`, `what`, `why`, the root-first `provenance` chain, and one nested
/// snapshot per child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub level: u8,
    pub status: TaskStatus,
    pub what: Option<String>,
    pub why: Option<String>,
    pub provenance: Vec<String>,
    pub children: Vec<ProgressSnapshot>,
}

/// One live frame emitted by a walker's status stream.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalkerStatus {
    pub walker_id: String,
    pub level: u8,
    pub status: TaskStatus,
    pub what: Option<String>,
    pub progress_pct: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_export_shape() {
        let snapshot = ProgressSnapshot {
            level: 3,
            status: TaskStatus::Paused,
            what: Some("Build feature".to_string()),
            why: Some("Launch product".to_string()),
            provenance: vec!["Launch product".to_string(), "Build feature".to_string()],
            children: vec![],
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["level"], 3);
        assert_eq!(json["status"], "paused");
        assert_eq!(json["what"], "Build feature");
        assert_eq!(json["why"], "Launch product");
        assert_eq!(json["provenance"].as_array().unwrap().len(), 2);
        assert!(json["children"].as_array().unwrap().is_empty());
    }
}
