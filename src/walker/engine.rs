//! Hierarchical delegation engine.
//!
//! A [`Walker`] owns one task, one lazily-created workspace, a level in the
//! abstraction hierarchy, and a purpose context. Executing a goal either runs
//! the ground executor (bottom level) or spawns a child one level down with
//! the walker's WHAT propagated as the child's WHY, recursing until ground.
//!
//! Interruption is cooperative: a pause observed mid-traversal unwinds as
//! [`WalkerError::Interrupted`], each frame parking its task and preserving
//! the in-flight goal so `resume` can continue exactly where it left off.
//!
//! At most one pause/resume operation per tree may be in flight at a time;
//! callers running multi-threaded serialize lifecycle calls themselves.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};

use async_recursion::async_recursion;
use async_stream::stream;
use futures::Stream;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::goal::{Dimension, Goal, Level};
use crate::task::{InvalidTransition, StatusUpdate, Task, TaskStatus};
use crate::walker::policies::PolicyRegistry;
use crate::walker::progress::{ProgressSnapshot, WalkerStatus};
use crate::walker::strategy::{
    CompletionRecorder, GroundError, GroundExecutor, StrategyPolicy, ValidationResult,
};
use crate::workspace::{Workspace, WorkspaceError};

/// Errors surfaced by walker operations.
#[derive(Debug, Error)]
pub enum WalkerError {
    /// A walker operation was attempted while its task forbids it.
    #[error("cannot {operation} walker in {status} state")]
    InvalidState {
        operation: &'static str,
        status: TaskStatus,
    },

    /// Every portfolio candidate failed or scored below the pass threshold.
    #[error("no candidate passed validation (best score: {best_score:.2})")]
    NoViableStrategy { best_score: f64 },

    /// Cooperative interruption: the traversal paused mid-flight.
    #[error("execution interrupted")]
    Interrupted,

    /// Ground-level execution failed somewhere beneath this walker.
    #[error("ground execution failed: {0}")]
    Ground(String),

    #[error(transparent)]
    Transition(#[from] InvalidTransition),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// Shared environment for one walker tree: the per-level policy registry,
/// the ground executor, and the workspace root.
///
/// The workspace root is threaded explicitly so the engine carries no global
/// mutable state; default path resolution is a construction-time concern.
pub struct Engine {
    policies: PolicyRegistry,
    ground: Arc<dyn GroundExecutor>,
    workspace_root: PathBuf,
}

impl Engine {
    pub fn new() -> Self {
        Self {
            policies: PolicyRegistry::default(),
            ground: Arc::new(CompletionRecorder),
            workspace_root: std::env::temp_dir().join("taskwalker"),
        }
    }

    /// Install a strategy policy for one level.
    pub fn with_policy(mut self, level: Level, policy: Arc<dyn StrategyPolicy>) -> Self {
        self.policies.insert(level, policy);
        self
    }

    /// Replace the ground executor.
    pub fn with_ground_executor(mut self, ground: Arc<dyn GroundExecutor>) -> Self {
        self.ground = ground;
        self
    }

    /// Set the directory walker workspaces are created under.
    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    /// The strategy policy in effect for `level`.
    pub fn policy_for(&self, level: Level) -> Arc<dyn StrategyPolicy> {
        self.policies.policy_for(level)
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("policies", &self.policies)
            .field("workspace_root", &self.workspace_root)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One node in the delegation tree.
///
/// Children are owned; the parent link is a non-owning back-pointer used for
/// provenance tracing only. If the parent has already computed its WHAT when
/// a child is constructed, the child's WHY is set from it immediately; this
/// holds for children spawned by the engine and for children built by hand.
pub struct Walker {
    walker_id: String,
    level: Level,
    engine: Arc<Engine>,
    task: Arc<Task>,
    me: Weak<Walker>,
    parent: Weak<Walker>,
    children: Mutex<Vec<Arc<Walker>>>,
    context: Mutex<BTreeMap<Dimension, String>>,
    workspace: OnceLock<Workspace>,
    current_goal: Mutex<Option<Goal>>,
    paused_goal: Mutex<Option<Goal>>,
    last_result: Mutex<Option<Value>>,
}

impl Walker {
    /// Construct the root walker of a tree.
    pub fn root(engine: Arc<Engine>, level: Level) -> Arc<Walker> {
        Self::build(engine, level, None)
    }

    /// Spawn a child one level down, or `None` when already at ground.
    ///
    /// Public so trees can be assembled by hand; the purpose-propagation
    /// invariant holds either way.
    pub fn spawn_child(&self) -> Option<Arc<Walker>> {
        self.level.next_down().map(|level| self.spawn(level))
    }

    fn spawn(&self, child_level: Level) -> Arc<Walker> {
        debug!(parent = %self.walker_id, level = %child_level, "spawning child walker");
        // Methods are only reachable through a live Arc, so the self handle
        // always upgrades.
        let me = self.me.upgrade().expect("walker self handle");
        Self::build(Arc::clone(&self.engine), child_level, Some(&me))
    }

    fn build(engine: Arc<Engine>, level: Level, parent: Option<&Arc<Walker>>) -> Arc<Walker> {
        let hex = Uuid::new_v4().simple().to_string();
        let walker_id = format!("walker-l{}-{}", level.rank(), &hex[..8]);
        let task = Task::new(Some(format!("task-{walker_id}")), parent.map(|p| &p.task));

        let mut context = BTreeMap::new();
        if let Some(parent) = parent {
            // Parent's WHAT becomes this walker's WHY.
            if let Some(what) = parent.context_value(Dimension::What) {
                context.insert(Dimension::Why, what);
            }
        }

        let walker = Arc::new_cyclic(|me| Walker {
            walker_id,
            level,
            engine,
            task,
            me: me.clone(),
            parent: parent.map(Arc::downgrade).unwrap_or_default(),
            children: Mutex::new(Vec::new()),
            context: Mutex::new(context),
            workspace: OnceLock::new(),
            current_goal: Mutex::new(None),
            paused_goal: Mutex::new(None),
            last_result: Mutex::new(None),
        });

        if let Some(parent) = parent {
            lock(&parent.children).push(Arc::clone(&walker));

            // Parent observes the child task's transitions.
            let observer = Arc::downgrade(parent);
            let child_id = walker.walker_id.clone();
            walker.task.on_status_change(move |update| {
                if let Some(parent) = observer.upgrade() {
                    parent.observe_child(&child_id, update);
                }
            });
        }

        walker
    }

    fn observe_child(&self, child: &str, update: &StatusUpdate) {
        match update.status {
            TaskStatus::Completed => {
                debug!(walker = %self.walker_id, child, "child completed")
            }
            TaskStatus::Failed => {
                warn!(walker = %self.walker_id, child, error = ?update.error, "child failed")
            }
            TaskStatus::Paused => {
                debug!(walker = %self.walker_id, child, "child paused")
            }
            _ => {}
        }
    }

    pub fn walker_id(&self) -> &str {
        &self.walker_id
    }

    pub fn level(&self) -> Level {
        self.level
    }

    /// The owned lifecycle task.
    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }

    pub fn parent(&self) -> Option<Arc<Walker>> {
        self.parent.upgrade()
    }

    pub fn children(&self) -> Vec<Arc<Walker>> {
        lock(&self.children).clone()
    }

    /// The workspace, if the walker has executed at least once.
    pub fn workspace(&self) -> Option<&Workspace> {
        self.workspace.get()
    }

    /// One dimension of the purpose context.
    pub fn context_value(&self, dim: Dimension) -> Option<String> {
        lock(&self.context).get(&dim).cloned()
    }

    /// Set one dimension of the purpose context.
    pub fn set_context(&self, dim: Dimension, value: impl Into<String>) {
        lock(&self.context).insert(dim, value.into());
    }

    /// Result of the most recent successful execution.
    pub fn last_result(&self) -> Option<Value> {
        lock(&self.last_result).clone()
    }

    /// Drive one full traversal from this level downward.
    ///
    /// Starts the owned task if pending, records this walker's WHAT from the
    /// goal, then either runs the ground executor or delegates to a fresh
    /// child one level down. Completes the task on success; on interruption
    /// preserves the in-flight goal, parks the task, and re-signals; on any
    /// other failure marks the task failed and re-raises.
    #[async_recursion]
    pub async fn execute(&self, goal: &Goal) -> Result<Value, WalkerError> {
        if self.task.status() == TaskStatus::Pending {
            self.task.start()?;
        }

        match self.traverse(goal).await {
            Ok(result) => {
                if self.task.status() == TaskStatus::Running {
                    self.task.complete(result.clone())?;
                }
                *lock(&self.last_result) = Some(result.clone());
                Ok(result)
            }
            Err(WalkerError::Interrupted) => {
                *lock(&self.paused_goal) = Some(goal.clone());
                if self.task.status().can_pause() {
                    self.task.pause()?;
                }
                Err(WalkerError::Interrupted)
            }
            Err(err) => {
                if !self.task.status().is_terminal() {
                    self.task.fail(err.to_string())?;
                }
                Err(err)
            }
        }
    }

    async fn traverse(&self, goal: &Goal) -> Result<Value, WalkerError> {
        *lock(&self.current_goal) = Some(goal.clone());
        if let Some(what) = goal.get(Dimension::What) {
            self.set_context(Dimension::What, what);
        }

        let workspace = self.ensure_workspace()?;

        // A pause that landed between frames surfaces here.
        if self.task.status().can_resume() {
            return Err(WalkerError::Interrupted);
        }

        match self.level.next_down() {
            None => {
                debug!(walker = %self.walker_id, "running ground action");
                self.engine
                    .ground
                    .run(goal, workspace)
                    .await
                    .map_err(|err| match err {
                        GroundError::Interrupted => WalkerError::Interrupted,
                        GroundError::Failed(msg) => WalkerError::Ground(msg),
                    })
            }
            Some(child_level) => {
                let child = self.spawn(child_level);
                let child_goal = self.derive_child_goal(goal);
                child.execute(&child_goal).await
            }
        }
    }

    fn ensure_workspace(&self) -> Result<&Workspace, WalkerError> {
        if let Some(workspace) = self.workspace.get() {
            return Ok(workspace);
        }
        let workspace = Workspace::new(&self.walker_id, self.engine.workspace_root())?;
        Ok(self.workspace.get_or_init(move || workspace))
    }

    /// Derived goal for a child: this walker's WHAT overwrites the child's
    /// WHY, everything else carries through.
    fn derive_child_goal(&self, goal: &Goal) -> Goal {
        let mut dimensions = goal.dimensions().clone();
        if let Some(what) = self.context_value(Dimension::What) {
            dimensions.insert(Dimension::Why, what);
        }
        goal.with_dimensions(dimensions)
    }

    /// Pause this walker and, via the task tree, every running descendant.
    pub fn pause(&self) -> Result<(), InvalidTransition> {
        self.task.pause()
    }

    /// Resume from a pause: children first, then continue execution from the
    /// preserved goal snapshot (or return the last stored result when there
    /// is nothing to continue).
    pub async fn resume(&self) -> Result<Value, WalkerError> {
        let status = self.task.status();
        if status != TaskStatus::Paused {
            return Err(WalkerError::InvalidState {
                operation: "resume",
                status,
            });
        }

        self.task.resume()?;

        let snapshot = lock(&self.paused_goal).take();
        match snapshot {
            Some(goal) => self.execute(&goal).await,
            None => Ok(lock(&self.last_result).clone().unwrap_or(Value::Null)),
        }
    }

    /// Swap this walker's WHAT while leaving its WHY untouched, so the
    /// approach can change mid-flight without losing the justification
    /// chain. Any in-flight or paused goal snapshot is rewritten to match.
    pub fn update_what(&self, new_what: impl Into<String>) {
        let what = new_what.into();
        self.set_context(Dimension::What, what.clone());
        if let Some(goal) = lock(&self.current_goal).as_mut() {
            goal.set(Dimension::What, what.clone());
        }
        if let Some(goal) = lock(&self.paused_goal).as_mut() {
            goal.set(Dimension::What, what);
        }
    }

    /// The WHAT chain from the root down to this walker. Pure read.
    pub fn trace_provenance(&self) -> Vec<String> {
        let mut chain = Vec::new();
        if let Some(what) = self.context_value(Dimension::What) {
            chain.push(what);
        }
        let mut cursor = self.parent();
        while let Some(walker) = cursor {
            if let Some(what) = walker.context_value(Dimension::What) {
                chain.push(what);
            }
            cursor = walker.parent();
        }
        chain.reverse();
        chain
    }

    /// Structured snapshot of this walker and its subtree, for inspection
    /// while paused or running.
    pub fn get_progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            level: self.level.rank(),
            status: self.task.status(),
            what: self.context_value(Dimension::What),
            why: self.context_value(Dimension::Why),
            provenance: self.trace_provenance(),
            children: self.children().iter().map(|c| c.get_progress()).collect(),
        }
    }

    /// Progress estimate in [0, 100]: 100 when completed, 0 when failed,
    /// otherwise the mean of the children's progress (or a flat running
    /// estimate when there are none yet).
    pub fn calculate_progress(&self) -> f64 {
        match self.task.status() {
            TaskStatus::Completed => 100.0,
            TaskStatus::Failed => 0.0,
            status => {
                let children = self.children();
                if children.is_empty() {
                    if status == TaskStatus::Running {
                        50.0
                    } else {
                        0.0
                    }
                } else {
                    let total: f64 = children.iter().map(|c| c.calculate_progress()).sum();
                    total / children.len() as f64
                }
            }
        }
    }

    /// Live status frames while the walker is active. Pull-based; stops once
    /// the status is paused or terminal.
    pub fn status_stream(&self) -> impl Stream<Item = WalkerStatus> + Send + 'static {
        let walker = self.me.upgrade().expect("walker self handle");
        stream! {
            loop {
                let status = walker.task.status();
                if status.is_terminal() {
                    break;
                }
                yield WalkerStatus {
                    walker_id: walker.walker_id.clone(),
                    level: walker.level.rank(),
                    status,
                    what: walker.context_value(Dimension::What),
                    progress_pct: walker.calculate_progress(),
                };
                if walker.task.status() == TaskStatus::Paused {
                    break;
                }
            }
        }
    }

    /// Run `n` candidate strategies concurrently and return the result of
    /// the best-scoring candidate that passed validation.
    ///
    /// One child walker is spawned per candidate; a failing candidate is
    /// scored as failed rather than propagated. Ties on the top score go to
    /// the earliest-generated candidate.
    pub async fn execute_portfolio(&self, goal: &Goal, n: usize) -> Result<Value, WalkerError> {
        if n == 0 {
            return Err(WalkerError::NoViableStrategy { best_score: 0.0 });
        }
        let Some(child_level) = self.level.next_down() else {
            return Err(WalkerError::InvalidState {
                operation: "spawn portfolio candidates for",
                status: self.task.status(),
            });
        };

        *lock(&self.current_goal) = Some(goal.clone());
        if let Some(what) = goal.get(Dimension::What) {
            self.set_context(Dimension::What, what);
        }

        let policy = self.engine.policy_for(self.level);
        let candidates = policy.generate_candidates(goal, n).await;
        let my_what = self.context_value(Dimension::What);

        let mut runs = Vec::with_capacity(candidates.len());
        for candidate in &candidates {
            let child = self.spawn(child_level);
            let mut dimensions = goal.dimensions().clone();
            if let Some(what) = &my_what {
                dimensions.insert(Dimension::Why, what.clone());
            }
            dimensions.insert(Dimension::What, candidate.clone());
            runs.push((child, goal.with_dimensions(dimensions)));
        }

        info!(walker = %self.walker_id, candidates = runs.len(), "executing portfolio");
        let mut tasks = JoinSet::new();
        for (index, (child, child_goal)) in runs.iter().enumerate() {
            let child = Arc::clone(child);
            let child_goal = child_goal.clone();
            tasks.spawn(async move { (index, child.execute(&child_goal).await) });
        }

        let mut outcomes: Vec<Option<Result<Value, WalkerError>>> =
            runs.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => outcomes[index] = Some(outcome),
                Err(err) => warn!(walker = %self.walker_id, error = %err, "portfolio candidate aborted"),
            }
        }

        let mut best: Option<(usize, ValidationResult, Value)> = None;
        let mut best_score = 0.0_f64;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            let (result, validation) = match outcome {
                Some(Ok(result)) => {
                    let validation = policy.validate(&result).await;
                    (Some(result), validation)
                }
                Some(Err(err)) => (None, ValidationResult::fail(err.to_string())),
                None => (None, ValidationResult::fail("candidate task aborted")),
            };
            debug!(
                walker = %self.walker_id,
                candidate = index,
                score = validation.score,
                passed = validation.passed,
                "scored portfolio candidate"
            );
            best_score = best_score.max(validation.score);

            if validation.passed {
                if let Some(result) = result {
                    // Strictly-greater keeps the earliest candidate on ties.
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, current, _)| validation.score > current.score);
                    if better {
                        best = Some((index, validation, result));
                    }
                }
            }
        }

        match best {
            Some((index, validation, result)) => {
                info!(
                    walker = %self.walker_id,
                    winner = index,
                    score = validation.score,
                    "portfolio candidate selected"
                );
                Ok(result)
            }
            None => Err(WalkerError::NoViableStrategy { best_score }),
        }
    }
}

impl std::fmt::Debug for Walker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Walker")
            .field("walker_id", &self.walker_id)
            .field("level", &self.level)
            .field("status", &self.task.status())
            .finish()
    }
}
