//! Plan execution engine.

pub mod dispatch;
pub mod pool;
pub mod results;
pub mod scheduler;
pub mod substitution;

pub use pool::WorkerPool;
pub use results::{ResultSet, StepResult};
pub use scheduler::{Execution, ExecutionLog, Scheduler};
