//! Pluggable decision seams: strategy policies and ground execution.
//!
//! Walkers make two kinds of decisions they do not hard-code: how to turn a
//! goal into candidate sub-goals (and how to score what came back), and what
//! actually happens at the bottom of the hierarchy. Both are injected via the
//! traits here so embedders can wire in real planners and executors.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::goal::{Dimension, Goal};
use crate::workspace::Workspace;

/// Outcome of scoring one execution result.
///
/// Portfolio selection picks winners by `score` among candidates whose
/// `passed` flag is set; `details` is free-text for humans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub score: f64,
    pub passed: bool,
    pub details: String,
}

impl ValidationResult {
    /// A passing result with the given score.
    pub fn pass(score: f64, details: impl Into<String>) -> Self {
        Self {
            score,
            passed: true,
            details: details.into(),
        }
    }

    /// A failing result, scored zero.
    pub fn fail(details: impl Into<String>) -> Self {
        Self {
            score: 0.0,
            passed: false,
            details: details.into(),
        }
    }
}

/// Errors raised by ground-level execution.
#[derive(Debug, Error)]
pub enum GroundError {
    /// The ground action could not produce a result.
    #[error("{0}")]
    Failed(String),

    /// Cooperative interruption was requested mid-action.
    #[error("ground execution interrupted")]
    Interrupted,
}

/// Per-level decision policy.
///
/// One implementor is injected per hierarchy level; the walker never
/// specializes itself by inheritance.
#[async_trait]
pub trait StrategyPolicy: Send + Sync {
    /// Produce `n` candidate sub-goal descriptions for `goal`.
    async fn generate_candidates(&self, goal: &Goal, n: usize) -> Vec<String>;

    /// Score an execution result for portfolio selection.
    async fn validate(&self, result: &Value) -> ValidationResult;
}

/// Executor invoked when a walker reaches the ground level.
///
/// Implementations may signal [`GroundError::Interrupted`] to request a
/// graceful pause; the walker records the in-flight goal and parks its task.
#[async_trait]
pub trait GroundExecutor: Send + Sync {
    async fn run(&self, goal: &Goal, workspace: &Workspace) -> Result<Value, GroundError>;
}

/// Default ground executor: records a human-readable completion line
/// combining the goal's WHAT with its inherited WHY.
#[derive(Debug, Default)]
pub struct CompletionRecorder;

#[async_trait]
impl GroundExecutor for CompletionRecorder {
    async fn run(&self, goal: &Goal, workspace: &Workspace) -> Result<Value, GroundError> {
        let what = goal.get(Dimension::What).unwrap_or("unspecified action");
        let why = goal.get(Dimension::Why).unwrap_or("unspecified purpose");
        let record = format!("EXECUTED: {what} (because: {why})");
        workspace.set("last_ground_record", Value::String(record.clone()));
        Ok(Value::String(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_completion_recorder_combines_what_and_why() {
        let base = tempdir().unwrap();
        let ws = Workspace::new("w", base.path()).unwrap();
        let goal = Goal::new()
            .with(Dimension::What, "Run tests")
            .with(Dimension::Why, "Verify implementation");

        let result = CompletionRecorder.run(&goal, &ws).await.unwrap();
        let text = result.as_str().unwrap();
        assert!(text.contains("Run tests"));
        assert!(text.contains("Verify implementation"));
        assert!(ws.has("last_ground_record"));
    }

    #[tokio::test]
    async fn test_completion_recorder_tolerates_missing_dimensions() {
        let base = tempdir().unwrap();
        let ws = Workspace::new("w", base.path()).unwrap();
        let result = CompletionRecorder.run(&Goal::new(), &ws).await.unwrap();
        assert!(result.as_str().unwrap().contains("unspecified action"));
    }

    #[test]
    fn test_validation_result_constructors() {
        let ok = ValidationResult::pass(0.9, "all good");
        assert!(ok.passed);
        assert_eq!(ok.score, 0.9);

        let bad = ValidationResult::fail("broke");
        assert!(!bad.passed);
        assert_eq!(bad.score, 0.0);
        assert_eq!(bad.details, "broke");
    }
}
