//! Task coordinator.
//!
//! Accepts requests, assigns task ids, and drives each task through
//! planning and execution on the task pool:
//!
//! ```text
//! Pending -> Analyzing -> Executing -> Completed
//!    |           |            |
//!    +-----------+------------+--> Failed
//! ```
//!
//! Every status change is published on the event bus.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_stream::Stream;

use crate::capabilities::{CapabilityDescriptor, CapabilityRegistry};
use crate::config::EngineConfig;
use crate::engine::{Scheduler, WorkerPool};
use crate::error::TaskError;
use crate::plan::Plan;
use crate::planner::{Planner, fallback_plan};
use crate::task::{
    EventBus, Task, TaskEvent, TaskId, TaskRecorder, TaskSnapshot, TaskStatus, TaskStore,
};

struct Inner {
    store: Arc<TaskStore>,
    events: EventBus,
    registry: Arc<CapabilityRegistry>,
    planner: Arc<dyn Planner>,
    scheduler: Scheduler,
    task_pool: WorkerPool,
    task_ttl: Option<Duration>,
    retention_interval: Duration,
}

/// Handle to the engine. Cloning is cheap and clones share all state.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(
        config: &EngineConfig,
        registry: Arc<CapabilityRegistry>,
        planner: Arc<dyn Planner>,
    ) -> Self {
        let step_pool = WorkerPool::new("steps", config.max_concurrent_steps);
        let scheduler = Scheduler::new(Arc::clone(&registry), step_pool, config.parallel_timeout);

        Self {
            inner: Arc::new(Inner {
                store: Arc::new(TaskStore::new()),
                events: EventBus::new(config.event_capacity),
                registry,
                planner,
                scheduler,
                task_pool: WorkerPool::new("tasks", config.max_concurrent_tasks),
                task_ttl: config.task_ttl,
                retention_interval: config.retention_interval,
            }),
        }
    }

    /// Create a task for `input` and start working on it in the background.
    pub async fn submit_task(&self, input: impl Into<String>) -> TaskId {
        let input = input.into();
        let snapshot = self.inner.store.create(input.clone()).await;
        let id = snapshot.task_id;
        tracing::info!(task_id = %id, "Task submitted");
        self.inner.events.publish(TaskEvent::for_snapshot(snapshot));

        let inner = Arc::clone(&self.inner);
        self.inner.task_pool.spawn(async move {
            let outcome = AssertUnwindSafe(inner.run(id, &input)).catch_unwind().await;
            if outcome.is_err() {
                tracing::error!(task_id = %id, "Task worker panicked");
                let _ = inner
                    .apply(id, |task| task.fail("Task failed: worker panicked"))
                    .await;
            }
        });

        id
    }

    pub async fn get_task(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.inner.store.get(id).await
    }

    /// All known tasks in submission order.
    pub async fn list_tasks(&self) -> Vec<TaskSnapshot> {
        self.inner.store.list().await
    }

    pub async fn list_capabilities(&self) -> Vec<CapabilityDescriptor> {
        self.inner.registry.descriptors().await
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.inner.registry
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.inner.events.subscribe()
    }

    pub fn events(&self) -> impl Stream<Item = TaskEvent> + Send + 'static {
        self.inner.events.stream()
    }

    /// Wait until the task is Completed or Failed.
    pub async fn wait_for_terminal(
        &self,
        id: TaskId,
        timeout: Duration,
    ) -> Result<TaskSnapshot, TaskError> {
        // Subscribe before the first look so a transition in between is not missed.
        let mut rx = self.inner.events.subscribe();
        let wait = async {
            loop {
                match self.inner.store.get(id).await {
                    None => return Err(TaskError::NotFound { id }),
                    Some(snapshot) if snapshot.is_terminal() => return Ok(snapshot),
                    Some(_) => {}
                }

                loop {
                    match rx.recv().await {
                        Ok(event) if event.task().task_id == id && event.task().is_terminal() => {
                            return Ok(event.task().clone());
                        }
                        Ok(_) => {}
                        // Missed events; look at the store again.
                        Err(RecvError::Lagged(_)) => break,
                        Err(RecvError::Closed) => {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            break;
                        }
                    }
                }
            }
        };

        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| TaskError::WaitTimeout { id, timeout })?
    }

    /// Remove finished tasks older than the configured TTL. Returns the
    /// number removed; without a TTL nothing is removed.
    pub async fn prune_finished(&self) -> usize {
        match self.inner.task_ttl {
            Some(ttl) => self.inner.store.prune_terminal(ttl).await,
            None => 0,
        }
    }

    /// Spawn the periodic retention sweep. Returns `None` when no TTL is
    /// configured.
    pub fn spawn_retention_task(&self) -> Option<JoinHandle<()>> {
        let ttl = self.inner.task_ttl?;
        let coordinator = self.clone();
        let period = self.inner.retention_interval;
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let removed = coordinator.prune_finished().await;
                if removed > 0 {
                    tracing::info!(removed, ttl = ?ttl, "Swept finished tasks");
                }
            }
        }))
    }
}

impl Inner {
    /// Mutate the task and publish the resulting snapshot.
    async fn apply<F>(&self, id: TaskId, f: F) -> Result<(), TaskError>
    where
        F: FnOnce(&mut Task) -> Result<(), TaskError>,
    {
        match self.store.update(id, f).await {
            Ok(snapshot) => {
                self.events.publish(TaskEvent::for_snapshot(snapshot));
                Ok(())
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "Task update rejected");
                Err(e)
            }
        }
    }

    async fn run(&self, id: TaskId, input: &str) {
        if self
            .apply(id, |task| task.transition_to(TaskStatus::Analyzing, "Analyzing task"))
            .await
            .is_err()
        {
            return;
        }

        let plan = self.plan(id, input).await;

        if let Err(e) = plan.validate() {
            tracing::warn!(task_id = %id, error = %e, "Rejected plan");
            let _ = self.apply(id, |task| task.fail(e.to_string())).await;
            return;
        }

        if self
            .apply(id, |task| task.transition_to(TaskStatus::Executing, "Executing plan"))
            .await
            .is_err()
        {
            return;
        }

        let recorder = TaskRecorder::new(Arc::clone(&self.store), id);
        match self.scheduler.execute(&plan, &recorder).await {
            Ok(execution) => {
                tracing::info!(task_id = %id, steps = execution.results.len(), "Task completed");
                let _ = self
                    .apply(id, |task| task.complete(execution.aggregate, "Task completed"))
                    .await;
            }
            Err(e) => {
                tracing::warn!(task_id = %id, error = %e, "Task failed");
                let _ = self
                    .apply(id, |task| task.fail(format!("Task failed: {e}")))
                    .await;
            }
        }
    }

    /// Ask the planner, substituting the fallback plan on any planning error.
    async fn plan(&self, id: TaskId, input: &str) -> Plan {
        match self.planner.plan(input).await {
            Ok(plan) => {
                tracing::debug!(task_id = %id, planner = self.planner.name(), steps = plan.steps.len(), "Plan ready");
                self.log(id, format!("Plan ready: {} ({} step(s))", plan.description, plan.steps.len()))
                    .await;
                plan
            }
            Err(e) => {
                tracing::warn!(task_id = %id, planner = self.planner.name(), error = %e, "Planning failed, using fallback plan");
                self.log(id, format!("Planning failed ({e}); falling back to search"))
                    .await;
                fallback_plan(input)
            }
        }
    }

    async fn log(&self, id: TaskId, message: String) {
        if let Err(e) = self.store.update(id, |task| task.append_log(message)).await {
            tracing::warn!(task_id = %id, error = %e, "Dropped log entry");
        }
    }
}
