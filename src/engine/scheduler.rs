//! Plan scheduler.
//!
//! Chooses an execution strategy for a plan and drives its steps:
//! - DAG: layered topological passes, each layer fanned out on the pool
//! - parallel: every step at once under a timeout
//! - sequential: declaration order, each step seeing the previous result

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;

use crate::capabilities::CapabilityRegistry;
use crate::engine::dispatch::{joined, spawn_step};
use crate::engine::pool::WorkerPool;
use crate::engine::results::{ResultSet, StepResult};
use crate::engine::substitution::{resolve_sequential, resolve_step_refs};
use crate::error::ExecutionError;
use crate::plan::{ExecutionMode, Plan, Step, StepId};

/// Sink for progress lines produced while a plan runs.
#[async_trait]
pub trait ExecutionLog: Send + Sync {
    async fn record(&self, message: String);
}

/// A finished scheduler run.
#[derive(Debug)]
pub struct Execution {
    pub mode: ExecutionMode,
    pub results: ResultSet,
    pub aggregate: String,
}

pub struct Scheduler {
    registry: Arc<CapabilityRegistry>,
    pool: WorkerPool,
    parallel_timeout: Duration,
}

impl Scheduler {
    pub fn new(registry: Arc<CapabilityRegistry>, pool: WorkerPool, parallel_timeout: Duration) -> Self {
        Self {
            registry,
            pool,
            parallel_timeout,
        }
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    pub fn parallel_timeout(&self) -> Duration {
        self.parallel_timeout
    }

    /// Run every step of `plan`. Step failures end up as error text in the
    /// results; only plan-level problems are returned as errors.
    pub async fn execute(
        &self,
        plan: &Plan,
        log: &dyn ExecutionLog,
    ) -> Result<Execution, ExecutionError> {
        let mode = plan.execution_mode();
        tracing::info!(steps = plan.steps.len(), mode = %mode, "Executing plan");
        log.record(format!(
            "Executing {} step(s) in {mode} mode",
            plan.steps.len()
        ))
        .await;

        let results = match mode {
            ExecutionMode::Dag => self.run_dag(plan, log).await?,
            ExecutionMode::Parallel => self.run_parallel(plan, log).await?,
            ExecutionMode::Sequential => self.run_sequential(plan, log).await,
        };

        let aggregate = aggregate(mode, &results);
        Ok(Execution {
            mode,
            results,
            aggregate,
        })
    }

    async fn run_dag(
        &self,
        plan: &Plan,
        log: &dyn ExecutionLog,
    ) -> Result<ResultSet, ExecutionError> {
        let mut results = ResultSet::new();
        let mut remaining: Vec<&Step> = plan.steps.iter().collect();
        let mut layer = 0usize;

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<&Step>, Vec<&Step>) = remaining
                .into_iter()
                .partition(|step| step.depends_on.iter().all(|dep| results.contains(*dep)));

            if ready.is_empty() {
                let pending: Vec<StepId> = blocked.iter().map(|s| s.id).collect();
                tracing::warn!(?pending, "No step is ready; dependency cycle");
                log.record(format!(
                    "Dependency cycle: steps {pending:?} can never become ready"
                ))
                .await;
                return Err(ExecutionError::DependencyCycle { pending });
            }

            layer += 1;
            let ids: Vec<StepId> = ready.iter().map(|s| s.id).collect();
            tracing::debug!(layer, steps = ?ids, "Dispatching layer");
            log.record(format!("Layer {layer}: running steps {ids:?}")).await;

            let handles: Vec<_> = ready
                .iter()
                .map(|step| {
                    let parameters = resolve_step_refs(&step.parameters, &results);
                    spawn_step(&self.pool, Arc::clone(&self.registry), (*step).clone(), parameters)
                })
                .collect();

            let outcomes = join_all(handles).await;
            for (step, outcome) in ready.iter().zip(outcomes) {
                let result = joined(step, outcome);
                record_step(log, step, &result).await;
                results.insert(result);
            }

            remaining = blocked;
        }

        Ok(results)
    }

    async fn run_parallel(
        &self,
        plan: &Plan,
        log: &dyn ExecutionLog,
    ) -> Result<ResultSet, ExecutionError> {
        let handles: Vec<_> = plan
            .steps
            .iter()
            .map(|step| {
                spawn_step(
                    &self.pool,
                    Arc::clone(&self.registry),
                    step.clone(),
                    step.parameters.clone(),
                )
            })
            .collect();
        let aborts: Vec<_> = handles.iter().map(|h| h.abort_handle()).collect();

        let outcomes = match tokio::time::timeout(self.parallel_timeout, join_all(handles)).await {
            Ok(outcomes) => outcomes,
            Err(_) => {
                for abort in aborts {
                    abort.abort();
                }
                tracing::warn!(timeout = ?self.parallel_timeout, "Parallel execution timed out");
                log.record(format!(
                    "Parallel execution timed out after {:?}",
                    self.parallel_timeout
                ))
                .await;
                return Err(ExecutionError::ParallelTimeout {
                    timeout: self.parallel_timeout,
                });
            }
        };

        let mut results = ResultSet::new();
        for (step, outcome) in plan.steps.iter().zip(outcomes) {
            let result = joined(step, outcome);
            record_step(log, step, &result).await;
            results.insert(result);
        }
        Ok(results)
    }

    async fn run_sequential(&self, plan: &Plan, log: &dyn ExecutionLog) -> ResultSet {
        let mut results = ResultSet::new();
        let mut previous: Option<String> = None;

        for step in &plan.steps {
            let parameters = resolve_sequential(&step.parameters, &results, previous.as_deref());

            let handle = spawn_step(&self.pool, Arc::clone(&self.registry), step.clone(), parameters);
            let result = joined(step, handle.await);
            record_step(log, step, &result).await;

            previous = Some(result.text.clone());
            results.insert(result);
        }

        results
    }
}

async fn record_step(log: &dyn ExecutionLog, step: &Step, result: &StepResult) {
    let outcome = if result.is_error { "failed" } else { "completed" };
    log.record(format!(
        "Step {} ({}) {outcome}: {}",
        step.id,
        step.label(),
        result.text
    ))
    .await;
}

/// Join the step texts into the task result. DAG results are labelled with
/// their step id; the other modes only name the capability.
fn aggregate(mode: ExecutionMode, results: &ResultSet) -> String {
    results
        .iter()
        .map(|r| match mode {
            ExecutionMode::Dag => format!("[{}] {}\n{}", r.step_id, r.capability, r.text),
            ExecutionMode::Parallel | ExecutionMode::Sequential => {
                format!("[{}]\n{}", r.capability, r.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capability;
    use crate::error::CapabilityError;
    use crate::plan::{CollaborationHint, Parameters};
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct Lines(Mutex<Vec<String>>);

    #[async_trait]
    impl ExecutionLog for Lines {
        async fn record(&self, message: String) {
            self.0.lock().await.push(message);
        }
    }

    /// Replies with `<name>:<action>:<text param>`.
    struct Tag(&'static str);

    #[async_trait]
    impl Capability for Tag {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "tags its input"
        }
        async fn invoke(
            &self,
            action: &str,
            params: &Parameters,
        ) -> Result<String, CapabilityError> {
            let text = params.get("text").and_then(|v| v.as_str()).unwrap_or("-");
            Ok(format!("{}:{action}:{text}", self.0))
        }
    }

    async fn scheduler() -> Scheduler {
        let registry = Arc::new(CapabilityRegistry::new());
        registry.register_capability(Arc::new(Tag("a"))).await;
        registry.register_capability(Arc::new(Tag("b"))).await;
        Scheduler::new(registry, WorkerPool::new("steps", 4), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_sequential_aggregate_and_log() {
        let scheduler = scheduler().await;
        let plan = Plan::new("two", CollaborationHint::Sequential)
            .with_step(Step::new(1, "a", "x").with_param("text", "hi"))
            .with_step(Step::new(2, "b", "y").with_param("text", "{{previous}}!"));
        let lines = Lines::default();

        let execution = scheduler.execute(&plan, &lines).await.unwrap();
        assert_eq!(execution.mode, ExecutionMode::Sequential);
        assert_eq!(execution.aggregate, "[a]\na:x:hi\n\n[b]\nb:y:a:x:hi!");

        let lines = lines.0.lock().await;
        assert_eq!(lines[0], "Executing 2 step(s) in sequential mode");
        assert_eq!(lines[1], "Step 1 (a.x) completed: a:x:hi");
    }

    #[tokio::test]
    async fn test_dag_aggregate_labels_step_ids() {
        let scheduler = scheduler().await;
        let plan = Plan::new("dag", CollaborationHint::Dag)
            .with_step(Step::new(5, "b", "y").with_param("text", "step:9").depends_on([9]))
            .with_step(Step::new(9, "a", "x").with_param("text", "root"));
        let lines = Lines::default();

        let execution = scheduler.execute(&plan, &lines).await.unwrap();
        assert_eq!(execution.results.order(), &[9, 5]);
        assert_eq!(
            execution.aggregate,
            "[9] a\na:x:root\n\n[5] b\nb:y:a:x:root"
        );
        let lines = lines.0.lock().await;
        assert!(lines.contains(&"Layer 1: running steps [9]".to_string()));
        assert!(lines.contains(&"Layer 2: running steps [5]".to_string()));
    }

    #[tokio::test]
    async fn test_parallel_skips_substitution() {
        let scheduler = scheduler().await;
        let plan = Plan::new("fan-out", CollaborationHint::Parallel)
            .with_step(Step::new(1, "a", "x").with_param("text", "one"))
            .with_step(Step::new(2, "b", "y").with_param("text", "上一步结果"));

        let execution = scheduler.execute(&plan, &Lines::default()).await.unwrap();
        assert_eq!(execution.mode, ExecutionMode::Parallel);
        assert_eq!(execution.results.text(2), Some("b:y:上一步结果"));
    }
}
