//! Built-in capabilities.

mod calculator;
mod file;
mod search;
mod time;
mod translator;
mod weather;

pub use calculator::CalculatorCapability;
pub use file::FileCapability;
pub use search::SearchCapability;
pub use time::TimeCapability;
pub use translator::TranslatorCapability;
pub use weather::WeatherCapability;

use std::path::PathBuf;
use std::sync::Arc;

use crate::capabilities::CapabilityRegistry;

/// Register every built-in capability. File access is confined to `workspace`.
pub async fn register_builtins(registry: &CapabilityRegistry, workspace: impl Into<PathBuf>) {
    registry
        .register_capability(Arc::new(CalculatorCapability::new()))
        .await;
    registry
        .register_capability(Arc::new(TimeCapability::new()))
        .await;
    registry
        .register_capability(Arc::new(TranslatorCapability::new()))
        .await;
    registry
        .register_capability(Arc::new(WeatherCapability::new()))
        .await;
    registry
        .register_capability(Arc::new(SearchCapability::new()))
        .await;
    registry
        .register_capability(Arc::new(FileCapability::new(workspace)))
        .await;

    tracing::debug!(count = registry.count().await, "Registered built-in capabilities");
}
