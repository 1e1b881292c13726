//! Lifecycle states and status update messages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Lifecycle states for a [`Task`](crate::task::Task).
///
/// `Completed` and `Failed` are terminal: a task in either state never
/// transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// Created but not yet started.
    Pending,
    /// Actively executing.
    Running,
    /// Gracefully paused, can be resumed.
    Paused,
    /// Finished successfully.
    Completed,
    /// Hit an error and cannot continue.
    Failed,
}

impl TaskStatus {
    /// Whether this state forbids any further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Only running tasks can be paused.
    pub fn can_pause(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Only paused tasks can be resumed.
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status update pushed to subscribers on every transition.
///
/// Carries the new status plus whatever result or error the transition
/// stored. `metadata` is an open map for caller-defined context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(!TaskStatus::Paused.is_terminal());
    }

    #[test]
    fn test_pause_resume_guards() {
        assert!(TaskStatus::Running.can_pause());
        assert!(!TaskStatus::Pending.can_pause());
        assert!(!TaskStatus::Paused.can_pause());

        assert!(TaskStatus::Paused.can_resume());
        assert!(!TaskStatus::Running.can_resume());
        assert!(!TaskStatus::Completed.can_resume());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Paused).unwrap(),
            "\"paused\""
        );
        assert_eq!(TaskStatus::Running.to_string(), "running");
    }

    #[test]
    fn test_update_wire_shape() {
        let update = StatusUpdate {
            task_id: "task-1".to_string(),
            status: TaskStatus::Completed,
            result: Some(Value::String("done".to_string())),
            error: None,
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["taskId"], "task-1");
        assert_eq!(json["status"], "completed");
        assert_eq!(json["result"], "done");
        assert!(json.get("error").is_none());
    }
}
