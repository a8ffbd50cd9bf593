//! In-memory task store.
//!
//! Every mutation runs inside a single write-locked closure, so readers see
//! either the state before or the state after a change, never a mix.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::engine::ExecutionLog;
use crate::error::TaskError;
use crate::task::state::{Task, TaskId, TaskSnapshot};

pub struct TaskStore {
    next_id: AtomicU64,
    tasks: RwLock<BTreeMap<TaskId, Task>>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            tasks: RwLock::new(BTreeMap::new()),
        }
    }

    /// Create a Pending task under the next id.
    pub async fn create(&self, input: impl Into<String>) -> TaskSnapshot {
        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let task = Task::new(id, input);
        let snapshot = task.snapshot();
        self.tasks.write().await.insert(id, task);
        snapshot
    }

    pub async fn get(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.tasks.read().await.get(&id).map(Task::snapshot)
    }

    /// All tasks in submission order.
    pub async fn list(&self) -> Vec<TaskSnapshot> {
        self.tasks.read().await.values().map(Task::snapshot).collect()
    }

    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.tasks.read().await.is_empty()
    }

    /// Apply `f` to the task under the write lock and return the resulting
    /// snapshot.
    pub async fn update<F>(&self, id: TaskId, f: F) -> Result<TaskSnapshot, TaskError>
    where
        F: FnOnce(&mut Task) -> Result<(), TaskError>,
    {
        let mut tasks = self.tasks.write().await;
        let task = tasks.get_mut(&id).ok_or(TaskError::NotFound { id })?;
        f(task)?;
        Ok(task.snapshot())
    }

    /// Drop finished tasks whose last update is older than `ttl`.
    pub async fn prune_terminal(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;
        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, task| !(task.status().is_terminal() && task.updated_at() < cutoff));
        before - tasks.len()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes scheduler progress into one task's log.
#[derive(Clone)]
pub struct TaskRecorder {
    store: Arc<TaskStore>,
    id: TaskId,
}

impl TaskRecorder {
    pub fn new(store: Arc<TaskStore>, id: TaskId) -> Self {
        Self { store, id }
    }
}

#[async_trait]
impl ExecutionLog for TaskRecorder {
    async fn record(&self, message: String) {
        if let Err(e) = self.store.update(self.id, |task| task.append_log(message)).await {
            tracing::warn!(task_id = %self.id, error = %e, "Dropped log entry");
        }
    }
}
