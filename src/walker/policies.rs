//! Built-in strategy policies and the per-level registry.
//!
//! These are deterministic template policies: useful defaults for tests and
//! demos, and stand-ins for real planner-backed implementations. Candidate
//! lists are generated in a fixed order so portfolio selection stays
//! reproducible.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::goal::{Dimension, Goal, Level};
use crate::walker::strategy::{StrategyPolicy, ValidationResult};

fn result_text(result: &Value) -> String {
    match result {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Generic fallback policy used where no level-specific policy is installed.
#[derive(Debug, Default)]
pub struct DefaultPolicy;

#[async_trait]
impl StrategyPolicy for DefaultPolicy {
    async fn generate_candidates(&self, goal: &Goal, n: usize) -> Vec<String> {
        let base = goal.get(Dimension::What).unwrap_or("achieve goal");
        (0..n).map(|i| format!("{base} - approach {}", i + 1)).collect()
    }

    async fn validate(&self, result: &Value) -> ValidationResult {
        if result.is_null() {
            return ValidationResult::fail("no result returned");
        }
        let text = result_text(result);
        if text.contains("EXECUTED") {
            ValidationResult::pass(0.85, "execution completed")
        } else if !text.is_empty() {
            ValidationResult::pass(0.7, "result returned")
        } else {
            ValidationResult {
                score: 0.1,
                passed: false,
                details: "empty result".to_string(),
            }
        }
    }
}

/// Top-level policy: candidate strategies are radically different paths to
/// the same ultimate purpose.
#[derive(Debug, Default)]
pub struct MissionPolicy;

const MISSION_TEMPLATES: &[&str] = &[
    "through organic growth",
    "through acquisition strategy",
    "through market expansion",
    "through product innovation",
    "through operational excellence",
    "through partnership ecosystem",
    "through vertical integration",
    "through platform approach",
];

#[async_trait]
impl StrategyPolicy for MissionPolicy {
    async fn generate_candidates(&self, goal: &Goal, n: usize) -> Vec<String> {
        let base = goal.get(Dimension::What).unwrap_or("achieve mission");
        (0..n)
            .map(|i| match MISSION_TEMPLATES.get(i) {
                Some(t) => format!("{base} {t}"),
                None => format!("{base} - alternative strategy {}", i + 1),
            })
            .collect()
    }

    async fn validate(&self, result: &Value) -> ValidationResult {
        if result.is_null() {
            return ValidationResult::fail("no result returned");
        }
        let text = result_text(result);
        if text.contains("EXECUTED") {
            ValidationResult::pass(0.9, "strategy executed")
        } else if !text.is_empty() {
            ValidationResult::pass(0.6, "result returned")
        } else {
            ValidationResult::fail("empty result")
        }
    }
}

/// Capability-level policy: candidates are different technical approaches to
/// the same implementation goal.
#[derive(Debug, Default)]
pub struct CapabilityPolicy;

const CAPABILITY_TEMPLATES: &[&str] = &[
    "using standard library",
    "using third-party service",
    "using custom implementation",
    "using existing framework",
    "using microservice pattern",
    "using monolithic approach",
    "using serverless functions",
    "using event-driven architecture",
];

#[async_trait]
impl StrategyPolicy for CapabilityPolicy {
    async fn generate_candidates(&self, goal: &Goal, n: usize) -> Vec<String> {
        let base = goal.get(Dimension::What).unwrap_or("implement capability");
        (0..n)
            .map(|i| match CAPABILITY_TEMPLATES.get(i) {
                Some(t) => format!("{base} {t}"),
                None => format!("{base} - alternative approach {}", i + 1),
            })
            .collect()
    }

    async fn validate(&self, result: &Value) -> ValidationResult {
        if result.is_null() {
            return ValidationResult::fail("no result returned");
        }
        let text = result_text(result);
        if text.contains("EXECUTED") {
            // A recorded reason means the purpose chain survived to ground.
            if text.contains("because:") {
                ValidationResult::pass(1.0, "implementation executed with full context")
            } else {
                ValidationResult::pass(0.8, "implementation executed")
            }
        } else if !text.is_empty() {
            ValidationResult::pass(0.6, "implementation completed with result")
        } else {
            ValidationResult {
                score: 0.1,
                passed: false,
                details: "empty result".to_string(),
            }
        }
    }
}

/// Per-level policy registry with a fallback.
pub struct PolicyRegistry {
    by_level: HashMap<Level, Arc<dyn StrategyPolicy>>,
    fallback: Arc<dyn StrategyPolicy>,
}

impl PolicyRegistry {
    /// Empty registry with the given fallback policy.
    pub fn with_fallback(fallback: Arc<dyn StrategyPolicy>) -> Self {
        Self {
            by_level: HashMap::new(),
            fallback,
        }
    }

    /// Install a policy for one level, replacing any previous one.
    pub fn insert(&mut self, level: Level, policy: Arc<dyn StrategyPolicy>) {
        self.by_level.insert(level, policy);
    }

    /// The policy for `level`, or the fallback.
    pub fn policy_for(&self, level: Level) -> Arc<dyn StrategyPolicy> {
        self.by_level
            .get(&level)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::clone(&self.fallback))
    }
}

impl Default for PolicyRegistry {
    /// Built-in policies: mission and capability levels get their template
    /// policies, everything else falls back to [`DefaultPolicy`].
    fn default() -> Self {
        let mut registry = Self::with_fallback(Arc::new(DefaultPolicy));
        registry.insert(Level::Mission, Arc::new(MissionPolicy));
        registry.insert(Level::Capability, Arc::new(CapabilityPolicy));
        registry
    }
}

impl std::fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("levels", &self.by_level.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_default_policy_generates_n_candidates() {
        let goal = Goal::new().with(Dimension::What, "Build feature");
        let candidates = DefaultPolicy.generate_candidates(&goal, 3).await;
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.starts_with("Build feature")));
        // Distinct candidates.
        assert_ne!(candidates[0], candidates[1]);
    }

    #[tokio::test]
    async fn test_mission_candidates_are_strategic_variations() {
        let goal = Goal::new().with(Dimension::What, "Grow revenue");
        let candidates = MissionPolicy.generate_candidates(&goal, 10).await;
        assert_eq!(candidates.len(), 10);
        assert_eq!(candidates[0], "Grow revenue through organic growth");
        // Overflow past the template list stays deterministic.
        assert_eq!(candidates[9], "Grow revenue - alternative strategy 10");
    }

    #[tokio::test]
    async fn test_capability_validation_rewards_full_context() {
        let full = json!("EXECUTED: Integrate payment (because: Launch premium)");
        let validation = CapabilityPolicy.validate(&full).await;
        assert!(validation.passed);
        assert_eq!(validation.score, 1.0);

        let bare = json!("EXECUTED: Integrate payment");
        assert_eq!(CapabilityPolicy.validate(&bare).await.score, 0.8);

        let nothing = Value::Null;
        assert!(!CapabilityPolicy.validate(&nothing).await.passed);
    }

    #[tokio::test]
    async fn test_default_validation_scores() {
        assert_eq!(
            DefaultPolicy.validate(&json!("EXECUTED: x")).await.score,
            0.85
        );
        assert_eq!(DefaultPolicy.validate(&json!("some text")).await.score, 0.7);
        assert!(!DefaultPolicy.validate(&json!("")).await.passed);
    }

    #[test]
    fn test_registry_falls_back() {
        let registry = PolicyRegistry::default();
        // Installed levels resolve to their policies, others to the fallback.
        let mission = registry.policy_for(Level::Mission);
        let beliefs = registry.policy_for(Level::Beliefs);
        let a = Arc::as_ptr(&mission) as *const ();
        let b = Arc::as_ptr(&beliefs) as *const ();
        assert_ne!(a, b);
    }
}
