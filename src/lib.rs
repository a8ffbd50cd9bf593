//! Plan engine. Executes planner-produced step graphs against pluggable
//! capabilities and tracks each submission as an observable task.

pub mod capabilities;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod error;
pub mod plan;
pub mod planner;
pub mod task;

pub use coordinator::Coordinator;
pub use error::{Error, Result};
