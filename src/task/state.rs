//! Task state machine.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TaskError;

/// Identifier of a submitted task, rendered as `task-<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

impl TaskId {
    pub const PREFIX: &'static str = "task-";

    pub fn new(n: u64) -> Self {
        Self(n)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

impl FromStr for TaskId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().strip_prefix(Self::PREFIX).unwrap_or(s.trim());
        digits
            .parse::<u64>()
            .map(Self)
            .map_err(|_| format!("invalid task id '{s}', expected task-<n>"))
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Submitted, waiting for a worker.
    Pending,
    /// The planner is turning the input into a plan.
    Analyzing,
    /// The scheduler is running the plan.
    Executing,
    /// Finished with a result.
    Completed,
    /// Finished without a result.
    Failed,
}

impl TaskStatus {
    /// Check if this status allows transitioning to another status.
    pub fn can_transition_to(&self, target: TaskStatus) -> bool {
        use TaskStatus::*;

        matches!(
            (self, target),
            (Pending, Analyzing) | (Pending, Failed) |
            (Analyzing, Executing) | (Analyzing, Failed) |
            (Executing, Completed) | (Executing, Failed)
        )
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Upper-case label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Analyzing => "ANALYZING",
            Self::Executing => "EXECUTING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Analyzing => "analyzing",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// One line of a task's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    /// Set when the entry records a status transition.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    pub message: String,
}

impl LogEntry {
    fn new(status: Option<TaskStatus>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            status,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for LogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ts = self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f");
        match self.status {
            Some(status) => write!(f, "[{ts}] {}: {}", status.label(), self.message),
            None => write!(f, "[{ts}] {}", self.message),
        }
    }
}

/// Point-in-time copy of a task, safe to hand to observers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub task_id: TaskId,
    pub input: String,
    pub status: TaskStatus,
    pub status_message: String,
    pub log: Vec<LogEntry>,
    pub result: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// A submitted task. Only reachable through the task store, which hands out
/// [`TaskSnapshot`]s to everyone but the worker driving the task.
#[derive(Debug, Clone)]
pub struct Task {
    id: TaskId,
    input: String,
    status: TaskStatus,
    status_message: String,
    log: Vec<LogEntry>,
    result: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: TaskId, input: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            input: input.into(),
            status: TaskStatus::Pending,
            status_message: "Task submitted".to_string(),
            log: vec![LogEntry::new(None, format!("Task created: {id}"))],
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    fn ensure_active(&self) -> Result<(), TaskError> {
        if self.status.is_terminal() {
            return Err(TaskError::Finished {
                id: self.id,
                state: self.status.to_string(),
            });
        }
        Ok(())
    }

    /// Move to `status`, recording `message` as the status message and as a
    /// log entry.
    pub fn transition_to(
        &mut self,
        status: TaskStatus,
        message: impl Into<String>,
    ) -> Result<(), TaskError> {
        self.ensure_active()?;
        if !self.status.can_transition_to(status) {
            return Err(TaskError::InvalidTransition {
                id: self.id,
                from: self.status.to_string(),
                to: status.to_string(),
            });
        }

        let message = message.into();
        self.status = status;
        self.log.push(LogEntry::new(Some(status), message.clone()));
        self.status_message = message;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Append a log entry without changing status.
    pub fn append_log(&mut self, message: impl Into<String>) -> Result<(), TaskError> {
        self.ensure_active()?;
        self.log.push(LogEntry::new(None, message));
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Record the result and move to Completed in one step.
    pub fn complete(
        &mut self,
        result: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Completed, message)?;
        self.result = Some(result.into());
        Ok(())
    }

    /// Move to Failed from any non-terminal status.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), TaskError> {
        self.transition_to(TaskStatus::Failed, message)
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            task_id: self.id,
            input: self.input.clone(),
            status: self.status,
            status_message: self.status_message.clone(),
            log: self.log.clone(),
            result: self.result.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
