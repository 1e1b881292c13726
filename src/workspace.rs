//! Isolated per-walker scratch space.
//!
//! Each walker gets its own workspace: an in-memory key/value map plus a
//! backing directory under an explicit base path. Two workspaces with
//! different identities never observe each other's memory or files.
//! Re-constructing a workspace for an identity that already has a backing
//! directory reuses that directory without data loss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

/// Errors from workspace file operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// A file was read before it was ever written.
    #[error("file not found in workspace: {0}")]
    NotFound(String),

    #[error("workspace io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Isolated scratch resource for one walker.
pub struct Workspace {
    walker_id: String,
    path: PathBuf,
    memory: Mutex<HashMap<String, Value>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Workspace {
    /// Create (or reopen) the workspace for `walker_id` under `base_path`.
    pub fn new(walker_id: impl Into<String>, base_path: &Path) -> Result<Self, WorkspaceError> {
        let walker_id = walker_id.into();
        let path = base_path.join(&walker_id);
        std::fs::create_dir_all(&path)?;
        debug!(walker = %walker_id, path = %path.display(), "workspace ready");

        Ok(Self {
            walker_id,
            path,
            memory: Mutex::new(HashMap::new()),
        })
    }

    pub fn walker_id(&self) -> &str {
        &self.walker_id
    }

    /// The backing directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Store a value in workspace memory.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        lock(&self.memory).insert(key.into(), value);
    }

    /// Retrieve a value from workspace memory.
    pub fn get(&self, key: &str) -> Option<Value> {
        lock(&self.memory).get(key).cloned()
    }

    /// Retrieve a value, falling back to `default` when the key is absent.
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).unwrap_or(default)
    }

    /// Whether a key exists in workspace memory.
    pub fn has(&self, key: &str) -> bool {
        lock(&self.memory).contains_key(key)
    }

    /// Write a file into the backing directory, returning its path.
    pub fn write_file(&self, filename: &str, content: &str) -> Result<PathBuf, WorkspaceError> {
        let file_path = self.path.join(filename);
        std::fs::write(&file_path, content)?;
        Ok(file_path)
    }

    /// Read a file from the backing directory.
    pub fn read_file(&self, filename: &str) -> Result<String, WorkspaceError> {
        let file_path = self.path.join(filename);
        if !file_path.exists() {
            return Err(WorkspaceError::NotFound(filename.to_string()));
        }
        Ok(std::fs::read_to_string(&file_path)?)
    }

    /// List entries in the backing directory, sorted for determinism.
    pub fn list_files(&self) -> Result<Vec<PathBuf>, WorkspaceError> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            files.push(entry?.path());
        }
        files.sort();
        Ok(files)
    }

    /// Remove the backing directory and clear memory. Idempotent.
    pub fn cleanup(&self) -> Result<(), WorkspaceError> {
        if self.path.exists() {
            std::fs::remove_dir_all(&self.path)?;
        }
        lock(&self.memory).clear();
        Ok(())
    }
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace")
            .field("walker_id", &self.walker_id)
            .field("path", &self.path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn test_workspace_creation() {
        let base = tempdir().unwrap();
        let ws = Workspace::new("walker-l3-abc", base.path()).unwrap();
        assert_eq!(ws.walker_id(), "walker-l3-abc");
        assert!(ws.path().exists());
        assert!(ws.path().ends_with("walker-l3-abc"));
    }

    #[test]
    fn test_memory_storage_and_defaults() {
        let base = tempdir().unwrap();
        let ws = Workspace::new("w", base.path()).unwrap();

        ws.set("progress", json!({"step": 1}));
        assert!(ws.has("progress"));
        assert_eq!(ws.get("progress"), Some(json!({"step": 1})));
        assert_eq!(ws.get("missing"), None);
        assert_eq!(ws.get_or("missing", json!("fallback")), json!("fallback"));
    }

    #[test]
    fn test_file_operations() {
        let base = tempdir().unwrap();
        let ws = Workspace::new("w", base.path()).unwrap();

        let path = ws.write_file("output.txt", "hello world").unwrap();
        assert!(path.exists());
        assert_eq!(ws.read_file("output.txt").unwrap(), "hello world");

        ws.write_file("second.txt", "b").unwrap();
        let files = ws.list_files().unwrap();
        assert_eq!(files.len(), 2);
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let base = tempdir().unwrap();
        let ws = Workspace::new("w", base.path()).unwrap();
        match ws.read_file("never-written.txt") {
            Err(WorkspaceError::NotFound(name)) => assert_eq!(name, "never-written.txt"),
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_isolation_between_workspaces() {
        let base = tempdir().unwrap();
        let a = Workspace::new("walker-a", base.path()).unwrap();
        let b = Workspace::new("walker-b", base.path()).unwrap();

        a.set("k", json!("from-a"));
        b.set("k", json!("from-b"));
        assert_eq!(a.get("k"), Some(json!("from-a")));
        assert_eq!(b.get("k"), Some(json!("from-b")));

        a.write_file("f.txt", "a").unwrap();
        assert!(b.read_file("f.txt").is_err());

        a.cleanup().unwrap();
        assert!(!a.path().exists());
        assert!(b.path().exists());
        assert_eq!(b.get("k"), Some(json!("from-b")));
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let base = tempdir().unwrap();
        let ws = Workspace::new("w", base.path()).unwrap();
        ws.set("k", json!(1));
        ws.cleanup().unwrap();
        assert!(!ws.has("k"));
        // Second cleanup is a no-op, not an error.
        ws.cleanup().unwrap();
    }

    #[test]
    fn test_reopen_reuses_directory() {
        let base = tempdir().unwrap();
        {
            let ws = Workspace::new("w", base.path()).unwrap();
            ws.write_file("keep.txt", "data").unwrap();
        }
        let reopened = Workspace::new("w", base.path()).unwrap();
        assert_eq!(reopened.read_file("keep.txt").unwrap(), "data");
    }

    #[test]
    fn test_empty_list_files() {
        let base = tempdir().unwrap();
        let ws = Workspace::new("w", base.path()).unwrap();
        assert!(ws.list_files().unwrap().is_empty());
    }
}
