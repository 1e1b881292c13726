//! Dimensional goal records and the abstraction hierarchy.
//!
//! The engine consumes goals as opaque dimensional records: a closed map from
//! [`Dimension`] to string values with point lookup, derived copies, and a
//! completeness predicate. [`Level`] enumerates the hierarchy the walkers
//! descend, from [`Level::Mission`] at the top to [`Level::Environment`] at
//! ground.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The six dimensions a goal record can carry.
///
/// `What` (the current sub-goal) and `Why` (the inherited purpose) drive the
/// delegation engine; the remaining dimensions travel through untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Who,
    What,
    When,
    Where,
    How,
    Why,
}

impl Dimension {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Who => "who",
            Self::What => "what",
            Self::When => "when",
            Self::Where => "where",
            Self::How => "how",
            Self::Why => "why",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Abstraction levels walked from top to bottom.
///
/// Variants are declared in ascending order so the derived `Ord` ranks
/// `Environment` lowest and `Mission` highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// Ground level: concrete actions, zero autonomy.
    Environment,
    Behavior,
    Capability,
    Beliefs,
    Identity,
    /// Top level: purpose and direction, extreme autonomy.
    Mission,
}

impl Level {
    /// Highest level of the hierarchy.
    pub const TOP: Level = Level::Mission;
    /// Lowest level, where ground execution happens.
    pub const GROUND: Level = Level::Environment;

    /// Numeric rank, 1 (ground) through 6 (top).
    pub fn rank(&self) -> u8 {
        match self {
            Self::Environment => 1,
            Self::Behavior => 2,
            Self::Capability => 3,
            Self::Beliefs => 4,
            Self::Identity => 5,
            Self::Mission => 6,
        }
    }

    /// The level one step below, or `None` at ground.
    pub fn next_down(&self) -> Option<Level> {
        match self {
            Self::Mission => Some(Self::Identity),
            Self::Identity => Some(Self::Beliefs),
            Self::Beliefs => Some(Self::Capability),
            Self::Capability => Some(Self::Behavior),
            Self::Behavior => Some(Self::Environment),
            Self::Environment => None,
        }
    }

    /// Whether this is the bottom level.
    pub fn is_ground(&self) -> bool {
        matches!(self, Self::Environment)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Environment => "environment",
            Self::Behavior => "behavior",
            Self::Capability => "capability",
            Self::Beliefs => "beliefs",
            Self::Identity => "identity",
            Self::Mission => "mission",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A dimensional goal record.
///
/// Goals are value types: the engine never mutates a caller's goal, it builds
/// derived copies via [`Goal::with_dimensions`] when delegating downward.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    dimensions: BTreeMap<Dimension, String>,
}

impl Goal {
    /// Create an empty goal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style dimension assignment.
    pub fn with(mut self, dim: Dimension, value: impl Into<String>) -> Self {
        self.dimensions.insert(dim, value.into());
        self
    }

    /// Point lookup of a dimension value.
    pub fn get(&self, dim: Dimension) -> Option<&str> {
        self.dimensions.get(&dim).map(String::as_str)
    }

    /// Set a dimension value in place.
    pub fn set(&mut self, dim: Dimension, value: impl Into<String>) {
        self.dimensions.insert(dim, value.into());
    }

    /// Whether a dimension is set.
    pub fn has(&self, dim: Dimension) -> bool {
        self.dimensions.contains_key(&dim)
    }

    /// The full dimension map.
    pub fn dimensions(&self) -> &BTreeMap<Dimension, String> {
        &self.dimensions
    }

    /// Derived copy with the dimension map replaced wholesale.
    pub fn with_dimensions(&self, dimensions: BTreeMap<Dimension, String>) -> Goal {
        Goal { dimensions }
    }

    /// Whether every required dimension is set.
    pub fn is_complete(&self, required: &[Dimension]) -> bool {
        required.iter().all(|dim| self.has(*dim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_lookup_and_set() {
        let mut goal = Goal::new().with(Dimension::What, "Integrate payment");
        assert!(goal.has(Dimension::What));
        assert_eq!(goal.get(Dimension::What), Some("Integrate payment"));
        assert_eq!(goal.get(Dimension::Why), None);

        goal.set(Dimension::Why, "Launch premium tier");
        assert_eq!(goal.get(Dimension::Why), Some("Launch premium tier"));
    }

    #[test]
    fn test_derived_copy_replaces_dimensions() {
        let goal = Goal::new()
            .with(Dimension::What, "original")
            .with(Dimension::Where, "staging");

        let mut dims = goal.dimensions().clone();
        dims.insert(Dimension::Why, "because".to_string());
        let derived = goal.with_dimensions(dims);

        assert_eq!(derived.get(Dimension::What), Some("original"));
        assert_eq!(derived.get(Dimension::Why), Some("because"));
        // Original is untouched.
        assert!(!goal.has(Dimension::Why));
    }

    #[test]
    fn test_is_complete() {
        let goal = Goal::new()
            .with(Dimension::What, "a")
            .with(Dimension::Why, "b");
        assert!(goal.is_complete(&[Dimension::What, Dimension::Why]));
        assert!(!goal.is_complete(&[Dimension::What, Dimension::Who]));
        assert!(goal.is_complete(&[]));
    }

    #[test]
    fn test_level_ordering_and_navigation() {
        assert!(Level::Mission > Level::Environment);
        assert!(Level::Capability > Level::Behavior);
        assert_eq!(Level::TOP.rank(), 6);
        assert_eq!(Level::GROUND.rank(), 1);

        let mut level = Level::TOP;
        let mut hops = 0;
        while let Some(next) = level.next_down() {
            assert_eq!(next.rank(), level.rank() - 1);
            level = next;
            hops += 1;
        }
        assert_eq!(hops, 5);
        assert!(level.is_ground());
    }

    #[test]
    fn test_serde_lowercase_names() {
        let json = serde_json::to_string(&Level::Mission).unwrap();
        assert_eq!(json, "\"mission\"");
        let json = serde_json::to_string(&Dimension::Why).unwrap();
        assert_eq!(json, "\"why\"");
    }
}
