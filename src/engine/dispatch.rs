//! Running one step against the capability registry.
//!
//! Nothing in here fails: every problem becomes error text on the
//! [`StepResult`], so a bad step never aborts the rest of the plan.

use std::sync::Arc;

use tokio::task::{JoinError, JoinHandle};

use crate::capabilities::CapabilityRegistry;
use crate::engine::pool::WorkerPool;
use crate::engine::results::StepResult;
use crate::error::CapabilityError;
use crate::plan::{Parameters, Step};

/// Invoke the step's capability with already-substituted parameters.
pub async fn execute_step(
    registry: &CapabilityRegistry,
    step: &Step,
    parameters: &Parameters,
) -> StepResult {
    let Some(capability) = registry.get(&step.capability).await else {
        let err = CapabilityError::NotFound {
            name: step.capability.clone(),
        };
        tracing::warn!(step = step.id, capability = %step.capability, "Capability not found");
        return StepResult::error(step, err.to_string());
    };

    let start = std::time::Instant::now();
    match capability.invoke(&step.action, parameters).await {
        Ok(text) => {
            tracing::debug!(
                step = step.id,
                capability = %step.capability,
                action = %step.action,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Step succeeded"
            );
            StepResult::success(step, text)
        }
        Err(e) => {
            tracing::warn!(
                step = step.id,
                capability = %step.capability,
                action = %step.action,
                error = %e,
                "Step failed"
            );
            StepResult::error(step, e.to_string())
        }
    }
}

/// Run [`execute_step`] on the pool.
pub fn spawn_step(
    pool: &WorkerPool,
    registry: Arc<CapabilityRegistry>,
    step: Step,
    parameters: Parameters,
) -> JoinHandle<StepResult> {
    pool.spawn(async move { execute_step(&registry, &step, &parameters).await })
}

/// Turn a joined step into a result, mapping a panicked handler to error text.
pub fn joined(step: &Step, outcome: Result<StepResult, JoinError>) -> StepResult {
    match outcome {
        Ok(result) => result,
        Err(e) if e.is_panic() => {
            tracing::error!(step = step.id, capability = %step.capability, "Capability panicked");
            StepResult::error(step, format!("capability {} panicked", step.capability))
        }
        Err(_) => StepResult::error(step, format!("capability {} was cancelled", step.capability)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::Capability;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Capability for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echo the text parameter"
        }
        async fn invoke(
            &self,
            action: &str,
            params: &Parameters,
        ) -> Result<String, CapabilityError> {
            match action {
                "say" => Ok(params
                    .get("text")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string()),
                "panic" => panic!("handler blew up"),
                other => Err(CapabilityError::UnknownAction {
                    capability: "echo".into(),
                    action: other.into(),
                }),
            }
        }
    }

    async fn registry() -> Arc<CapabilityRegistry> {
        let registry = Arc::new(CapabilityRegistry::new());
        registry.register_capability(Arc::new(Echo)).await;
        registry
    }

    #[tokio::test]
    async fn test_success_and_handler_error() {
        let registry = registry().await;
        let mut params = Parameters::new();
        params.insert("text".into(), "hi".into());

        let ok = execute_step(&registry, &Step::new(1, "echo", "say"), &params).await;
        assert_eq!(ok.text, "hi");
        assert!(!ok.is_error);

        let err = execute_step(&registry, &Step::new(2, "echo", "shout"), &params).await;
        assert!(err.is_error);
        assert_eq!(err.text, "echo does not support action 'shout'");
    }

    #[tokio::test]
    async fn test_missing_capability() {
        let registry = registry().await;
        let result = execute_step(&registry, &Step::new(1, "weather", "report"), &Parameters::new()).await;
        assert!(result.is_error);
        assert_eq!(result.text, "capability not found: weather");
    }

    #[tokio::test]
    async fn test_panic_becomes_error_text() {
        let registry = registry().await;
        let pool = WorkerPool::new("steps", 2);
        let step = Step::new(3, "echo", "panic");
        let handle = spawn_step(&pool, registry, step.clone(), Parameters::new());
        let result = joined(&step, handle.await);
        assert!(result.is_error);
        assert_eq!(result.text, "capability echo panicked");
        assert_eq!(pool.available(), 2);
    }
}
