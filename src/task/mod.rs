//! Task lifecycle: state machine, store, and observer notifications.

pub mod events;
pub mod state;
pub mod store;

pub use events::{EventBus, TaskEvent};
pub use state::{LogEntry, Task, TaskId, TaskSnapshot, TaskStatus};
pub use store::{TaskRecorder, TaskStore};
