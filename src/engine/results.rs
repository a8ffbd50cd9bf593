//! Step results collected during one scheduler run.

use std::collections::HashMap;

use serde::Serialize;

use crate::plan::{Step, StepId};

/// Outcome of one step. Failures are results too, with `is_error` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub step_id: StepId,
    pub capability: String,
    pub action: String,
    pub text: String,
    pub is_error: bool,
}

impl StepResult {
    pub fn success(step: &Step, text: impl Into<String>) -> Self {
        Self::build(step, text.into(), false)
    }

    pub fn error(step: &Step, text: impl Into<String>) -> Self {
        Self::build(step, text.into(), true)
    }

    fn build(step: &Step, text: String, is_error: bool) -> Self {
        Self {
            step_id: step.id,
            capability: step.capability.clone(),
            action: step.action.clone(),
            text,
            is_error,
        }
    }
}

/// Write-once map of step results that remembers insertion order.
#[derive(Debug, Default)]
pub struct ResultSet {
    results: HashMap<StepId, StepResult>,
    order: Vec<StepId>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result. Returns `false`, leaving the existing entry untouched,
    /// if the step already has one.
    pub fn insert(&mut self, result: StepResult) -> bool {
        if self.results.contains_key(&result.step_id) {
            tracing::warn!(step = result.step_id, "Ignoring second result for step");
            return false;
        }
        self.order.push(result.step_id);
        self.results.insert(result.step_id, result);
        true
    }

    pub fn get(&self, id: StepId) -> Option<&StepResult> {
        self.results.get(&id)
    }

    pub fn text(&self, id: StepId) -> Option<&str> {
        self.results.get(&id).map(|r| r.text.as_str())
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.results.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Results in the order they were inserted.
    pub fn iter(&self) -> impl Iterator<Item = &StepResult> {
        self.order.iter().filter_map(|id| self.results.get(id))
    }

    /// Step ids in the order their results were inserted.
    pub fn order(&self) -> &[StepId] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_once() {
        let step = Step::new(1, "calculator", "add");
        let mut results = ResultSet::new();
        assert!(results.insert(StepResult::success(&step, "5")));
        assert!(!results.insert(StepResult::error(&step, "late")));
        assert_eq!(results.text(1), Some("5"));
        assert_eq!(results.len(), 1);
        assert!(!results.get(1).unwrap().is_error);
    }

    #[test]
    fn test_iteration_follows_insertion() {
        let mut results = ResultSet::new();
        for id in [3, 1, 2] {
            results.insert(StepResult::success(&Step::new(id, "search", "search"), "x"));
        }
        let ids: Vec<_> = results.iter().map(|r| r.step_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(results.order(), &[3, 1, 2]);
    }
}
