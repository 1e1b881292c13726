//! # Taskwalker
//!
//! A hierarchical task engine with purpose propagation.
//!
//! This library provides:
//! - A strict task lifecycle state machine with cascading pause/resume
//! - A recursive delegation engine that walks a fixed abstraction hierarchy
//! - Portfolio execution: run several candidate strategies, keep the winner
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │           Walker (L6)            │
//!        │   WHAT ──────────────┐           │
//!        └──────────────────────┼───────────┘
//!                               ▼ becomes WHY
//!        ┌──────────────────────────────────┐
//!        │           Walker (L5)            │
//!        │  Task · Workspace · Policy       │
//!        └────────────────┬─────────────────┘
//!                         │   ... down to ...
//!                         ▼
//!        ┌──────────────────────────────────┐
//!        │        Walker (L1, ground)       │
//!        │        GroundExecutor            │
//!        └──────────────────────────────────┘
//! ```
//!
//! ## Execution Flow
//! 1. Build an [`Engine`](walker::Engine) (policies, ground executor,
//!    workspace root) and a root [`Walker`](walker::Walker)
//! 2. `execute` a goal; each level records its WHAT and hands it down as the
//!    child's WHY, until the ground executor runs
//! 3. Pause anywhere in the tree; inspect progress; resume or swap the
//!    approach with `update_what`, the purpose chain survives throughout
//!
//! ## Modules
//! - `task`: lifecycle state machine and status streaming
//! - `walker`: the delegation engine, policies, and progress export
//! - `workspace`: isolated per-walker scratch space
//! - `goal`: dimensional goal records and the level hierarchy

pub mod goal;
pub mod task;
pub mod walker;
pub mod workspace;

pub use goal::{Dimension, Goal, Level};
pub use task::{InvalidTransition, StatusUpdate, Task, TaskSnapshot, TaskStatus};
pub use walker::{
    CompletionRecorder, Engine, GroundError, GroundExecutor, ProgressSnapshot, StrategyPolicy,
    ValidationResult, Walker, WalkerError, WalkerStatus,
};
pub use workspace::{Workspace, WorkspaceError};
