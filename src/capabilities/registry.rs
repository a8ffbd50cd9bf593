//! Capability registry for looking up step handlers by name.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::capabilities::Capability;

/// Name, description, and actions of a registered capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub actions: Vec<String>,
}

/// Registry of available capabilities.
pub struct CapabilityRegistry {
    capabilities: RwLock<HashMap<String, Arc<dyn Capability>>>,
}

impl CapabilityRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            capabilities: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler under `name`. An existing handler with the same
    /// name is replaced.
    pub async fn register(&self, name: impl Into<String>, capability: Arc<dyn Capability>) {
        let name = name.into();
        let previous = self
            .capabilities
            .write()
            .await
            .insert(name.clone(), capability);
        if previous.is_some() {
            tracing::debug!(capability = %name, "Replaced capability");
        } else {
            tracing::debug!(capability = %name, "Registered capability");
        }
    }

    /// Register a handler under its own [`Capability::name`].
    pub async fn register_capability(&self, capability: Arc<dyn Capability>) {
        let name = capability.name().to_string();
        self.register(name, capability).await;
    }

    /// Get a capability by name.
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.capabilities.read().await.get(name).cloned()
    }

    /// Check if a capability exists.
    pub async fn has(&self, name: &str) -> bool {
        self.capabilities.read().await.contains_key(name)
    }

    /// List all registered names.
    pub async fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.capabilities.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Get the number of registered capabilities.
    pub async fn count(&self) -> usize {
        self.capabilities.read().await.len()
    }

    /// Describe every registered capability, sorted by name.
    pub async fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        let mut descriptors: Vec<CapabilityDescriptor> = self
            .capabilities
            .read()
            .await
            .iter()
            .map(|(name, capability)| CapabilityDescriptor {
                name: name.clone(),
                description: capability.description().to_string(),
                actions: capability.actions().iter().map(|a| a.to_string()).collect(),
            })
            .collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
