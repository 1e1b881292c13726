//! Task: the lifecycle state machine at the heart of the engine.
//!
//! Tasks form a strict tree: children are owned (`Arc`), the parent link is a
//! non-owning `Weak` back-pointer used only for upward observation. Pause
//! cascades parent-first; resume cascades children-first. Subscribers are
//! notified synchronously on every transition and their failures are
//! swallowed at the notification boundary.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_stream::stream;
use chrono::Utc;
use futures::Stream;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use super::status::{StatusUpdate, TaskStatus};

/// A lifecycle operation was attempted from a state that forbids it.
///
/// This is a programming-contract violation, never retried automatically.
#[derive(Debug, Error)]
#[error("cannot {operation} task in {status} state")]
pub struct InvalidTransition {
    /// The operation that was attempted.
    pub operation: &'static str,
    /// The status the task was in at the time.
    pub status: TaskStatus,
}

type StatusCallback = Arc<dyn Fn(&StatusUpdate) + Send + Sync>;

struct TaskState {
    status: TaskStatus,
    result: Option<Value>,
    error: Option<String>,
}

/// Serializable snapshot of a task's current state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSnapshot {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Ids of direct children.
    pub children: Vec<String>,
}

/// A task in the delegation tree.
///
/// Created in [`TaskStatus::Pending`]; status changes only through the
/// guarded transition methods. The children list only grows.
pub struct Task {
    task_id: String,
    state: Mutex<TaskState>,
    parent: Weak<Task>,
    children: Mutex<Vec<Arc<Task>>>,
    callbacks: Mutex<Vec<StatusCallback>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Task {
    /// Create a task, generating an id when none is given, and register it
    /// with its parent.
    pub fn new(task_id: Option<String>, parent: Option<&Arc<Task>>) -> Arc<Task> {
        let task_id = task_id.unwrap_or_else(|| {
            let hex = Uuid::new_v4().simple().to_string();
            format!("task-{}", &hex[..8])
        });

        let task = Arc::new(Task {
            task_id,
            state: Mutex::new(TaskState {
                status: TaskStatus::Pending,
                result: None,
                error: None,
            }),
            parent: parent.map(Arc::downgrade).unwrap_or_default(),
            children: Mutex::new(Vec::new()),
            callbacks: Mutex::new(Vec::new()),
        });

        if let Some(parent) = parent {
            parent.add_child(&task);
        }

        task
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn status(&self) -> TaskStatus {
        lock(&self.state).status
    }

    /// Result stored by a successful completion.
    pub fn result(&self) -> Option<Value> {
        lock(&self.state).result.clone()
    }

    /// Error stored by a failure.
    pub fn error(&self) -> Option<String> {
        lock(&self.state).error.clone()
    }

    /// Upgraded parent link, if the parent is still alive.
    pub fn parent(&self) -> Option<Arc<Task>> {
        self.parent.upgrade()
    }

    pub fn children(&self) -> Vec<Arc<Task>> {
        lock(&self.children).clone()
    }

    /// Add a child task. Duplicate ids are ignored.
    pub fn add_child(&self, child: &Arc<Task>) {
        let mut children = lock(&self.children);
        if !children.iter().any(|c| c.task_id == child.task_id) {
            children.push(Arc::clone(child));
        }
    }

    /// Register a subscriber invoked synchronously on every status change,
    /// in registration order.
    pub fn on_status_change(&self, callback: impl Fn(&StatusUpdate) + Send + Sync + 'static) {
        lock(&self.callbacks).push(Arc::new(callback));
    }

    fn current_update(&self) -> StatusUpdate {
        let state = lock(&self.state);
        StatusUpdate {
            task_id: self.task_id.clone(),
            status: state.status,
            result: state.result.clone(),
            error: state.error.clone(),
            metadata: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Notify subscribers of the current state. A subscriber that panics must
    /// not abort the transition or affect sibling subscribers.
    fn notify(&self) {
        let update = self.current_update();
        debug!(task = %self.task_id, status = %update.status, "task status changed");

        let callbacks = lock(&self.callbacks).clone();
        for callback in callbacks {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(&update))).is_err() {
                warn!(task = %self.task_id, "status subscriber panicked; ignoring");
            }
        }
    }

    /// Start execution: `Pending` → `Running`.
    pub fn start(&self) -> Result<(), InvalidTransition> {
        {
            let mut state = lock(&self.state);
            if state.status != TaskStatus::Pending {
                return Err(InvalidTransition {
                    operation: "start",
                    status: state.status,
                });
            }
            state.status = TaskStatus::Running;
        }
        self.notify();
        Ok(())
    }

    /// Pause execution: `Running` → `Paused`, then cascade to every child
    /// whose own status permits pausing. Parent-first: this task's status is
    /// authoritative before any child starts pausing.
    pub fn pause(&self) -> Result<(), InvalidTransition> {
        {
            let mut state = lock(&self.state);
            if !state.status.can_pause() {
                return Err(InvalidTransition {
                    operation: "pause",
                    status: state.status,
                });
            }
            state.status = TaskStatus::Paused;
        }
        self.notify();

        for child in self.children() {
            if child.status().can_pause() {
                child.pause()?;
            }
        }
        Ok(())
    }

    /// Resume execution: `Paused` → `Running`. Children resume first, so a
    /// resuming parent never reports running while a child is still paused.
    pub fn resume(&self) -> Result<(), InvalidTransition> {
        {
            let state = lock(&self.state);
            if !state.status.can_resume() {
                return Err(InvalidTransition {
                    operation: "resume",
                    status: state.status,
                });
            }
        }

        for child in self.children() {
            if child.status().can_resume() {
                child.resume()?;
            }
        }

        {
            let mut state = lock(&self.state);
            state.status = TaskStatus::Running;
        }
        self.notify();
        Ok(())
    }

    /// Mark completed and store the result. Allowed from any non-terminal
    /// state.
    pub fn complete(&self, result: Value) -> Result<(), InvalidTransition> {
        {
            let mut state = lock(&self.state);
            if state.status.is_terminal() {
                return Err(InvalidTransition {
                    operation: "complete",
                    status: state.status,
                });
            }
            state.status = TaskStatus::Completed;
            state.result = Some(result);
        }
        self.notify();
        Ok(())
    }

    /// Mark failed and store the error. Allowed from any non-terminal state.
    pub fn fail(&self, error: impl Into<String>) -> Result<(), InvalidTransition> {
        {
            let mut state = lock(&self.state);
            if state.status.is_terminal() {
                return Err(InvalidTransition {
                    operation: "fail",
                    status: state.status,
                });
            }
            state.status = TaskStatus::Failed;
            state.error = Some(error.into());
        }
        self.notify();
        Ok(())
    }

    /// Cooperative status stream: produces updates reflecting current state
    /// while the task is non-terminal, stopping after the first update once
    /// the status is paused or terminal. Pull-based; never fires on its own.
    ///
    /// Not restartable: calling again starts a fresh stream over whatever
    /// the status is by then. The stream holds its own handle to the task.
    pub fn status_stream(self: Arc<Self>) -> impl Stream<Item = StatusUpdate> + Send + 'static {
        let task = self;
        stream! {
            loop {
                if task.status().is_terminal() {
                    break;
                }
                yield task.current_update();

                let status = task.status();
                if status == TaskStatus::Paused || status.is_terminal() {
                    break;
                }
            }
        }
    }

    /// Serializable snapshot of the current state.
    pub fn snapshot(&self) -> TaskSnapshot {
        let (status, result, error) = {
            let state = lock(&self.state);
            (state.status, state.result.clone(), state.error.clone())
        };
        TaskSnapshot {
            task_id: self.task_id.clone(),
            status,
            result,
            error,
            children: self.children().iter().map(|c| c.task_id.clone()).collect(),
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("task_id", &self.task_id)
            .field("status", &self.status())
            .finish()
    }
}
