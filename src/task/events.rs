//! Task notifications for external observers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};

use crate::task::state::{TaskSnapshot, TaskStatus};

/// Published on every task status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskEvent {
    /// The task moved to a non-terminal status.
    Updated { task: TaskSnapshot },
    /// The task completed with a result.
    Completed { task: TaskSnapshot },
    /// The task failed.
    Failed { task: TaskSnapshot },
}

impl TaskEvent {
    /// Pick the event kind that matches the snapshot's status.
    pub fn for_snapshot(task: TaskSnapshot) -> Self {
        match task.status {
            TaskStatus::Completed => Self::Completed { task },
            TaskStatus::Failed => Self::Failed { task },
            _ => Self::Updated { task },
        }
    }

    pub fn task(&self) -> &TaskSnapshot {
        match self {
            Self::Updated { task } | Self::Completed { task } | Self::Failed { task } => task,
        }
    }

    /// Topic name used by push transports.
    pub fn topic(&self) -> &'static str {
        match self {
            Self::Updated { .. } => "task-update",
            Self::Completed { .. } => "task-completed",
            Self::Failed { .. } => "task-failed",
        }
    }
}

/// Fan-out channel for [`TaskEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<TaskEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish without blocking. Having no subscribers is not an error.
    pub fn publish(&self, event: TaskEvent) {
        tracing::trace!(
            task_id = %event.task().task_id,
            topic = event.topic(),
            "Publishing task event"
        );
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.tx.subscribe()
    }

    /// Events as a stream. A subscriber that falls behind skips the events it
    /// missed.
    pub fn stream(&self) -> impl Stream<Item = TaskEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|event| match event {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::warn!(error = %e, "Task event subscriber lagged");
                None
            }
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::state::{Task, TaskId};

    fn snapshot(status_changes: &[TaskStatus]) -> TaskSnapshot {
        let mut task = Task::new(TaskId::new(1), "input");
        for status in status_changes {
            match status {
                TaskStatus::Completed => task.complete("42", "done").unwrap(),
                other => task.transition_to(*other, "next").unwrap(),
            }
        }
        task.snapshot()
    }

    #[test]
    fn test_event_kind_follows_status() {
        let event = TaskEvent::for_snapshot(snapshot(&[TaskStatus::Analyzing]));
        assert_eq!(event.topic(), "task-update");

        let event = TaskEvent::for_snapshot(snapshot(&[
            TaskStatus::Analyzing,
            TaskStatus::Executing,
            TaskStatus::Completed,
        ]));
        assert_eq!(event.topic(), "task-completed");
        assert_eq!(event.task().result.as_deref(), Some("42"));

        let event = TaskEvent::for_snapshot(snapshot(&[TaskStatus::Failed]));
        assert_eq!(event.topic(), "task-failed");
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = TaskEvent::for_snapshot(snapshot(&[TaskStatus::Failed]));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "failed");
        assert_eq!(json["task"]["task_id"], "task-1");
        assert_eq!(json["task"]["status"], "failed");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish(TaskEvent::for_snapshot(snapshot(&[])));
    }

    #[tokio::test]
    async fn test_stream_receives_events() {
        let bus = EventBus::new(4);
        let mut stream = Box::pin(bus.stream());
        bus.publish(TaskEvent::for_snapshot(snapshot(&[TaskStatus::Analyzing])));
        let event = stream.next().await.unwrap();
        assert_eq!(event.task().status, TaskStatus::Analyzing);
    }
}
