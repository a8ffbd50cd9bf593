//! Error types for the plan engine.

use std::time::Duration;

use crate::plan::StepId;
use crate::task::TaskId;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Planning error: {0}")]
    Planning(#[from] PlanningError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// The planner could not produce a plan. The coordinator recovers from
/// these by substituting the fallback plan.
#[derive(Debug, thiserror::Error)]
pub enum PlanningError {
    #[error("Planner request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Invalid planner response: {reason}")]
    InvalidResponse { reason: String },

    #[error("Failed to parse plan: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Structural problems that make a plan impossible to execute.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("no capability identified")]
    Empty,

    #[error("malformed plan: duplicate step id {id}")]
    DuplicateStepId { id: StepId },
}

/// Plan-level failures raised while the scheduler is running.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("dependency cycle: steps {pending:?} can never become ready")]
    DependencyCycle { pending: Vec<StepId> },

    #[error("parallel execution timed out after {timeout:?}")]
    ParallelTimeout { timeout: Duration },
}

/// Per-step failures. These never abort a plan; the scheduler turns them
/// into error text on the step's result.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    #[error("capability not found: {name}")]
    NotFound { name: String },

    #[error("{capability} does not support action '{action}'")]
    UnknownAction { capability: String, action: String },

    #[error("invalid parameters for {capability}: {reason}")]
    InvalidParameters { capability: String, reason: String },

    #[error("{capability} failed: {reason}")]
    Failed { capability: String, reason: String },
}

/// Task lifecycle errors.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task {id} not found")]
    NotFound { id: TaskId },

    #[error("Task {id} cannot transition from {from} to {to}")]
    InvalidTransition { id: TaskId, from: String, to: String },

    #[error("Task {id} is already {state} and can no longer change")]
    Finished { id: TaskId, state: String },

    #[error("Timed out after {timeout:?} waiting for task {id} to finish")]
    WaitTimeout { id: TaskId, timeout: Duration },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
