//! Walker module - recursive delegation over the abstraction hierarchy.
//!
//! A walker couples a lifecycle task, an isolated workspace, a purpose
//! context, and a strategy policy, then drives execution downward one level
//! at a time. The modules here split that into the engine itself, the
//! pluggable decision seams, the built-in policies, and the exported
//! progress shapes.

pub mod engine;
pub mod policies;
pub mod progress;
pub mod strategy;

pub use engine::{Engine, Walker, WalkerError};
pub use policies::{CapabilityPolicy, DefaultPolicy, MissionPolicy, PolicyRegistry};
pub use progress::{ProgressSnapshot, WalkerStatus};
pub use strategy::{
    CompletionRecorder, GroundError, GroundExecutor, StrategyPolicy, ValidationResult,
};
