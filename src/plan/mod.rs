//! Plan model: the step graph a planner hands to the scheduler.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::PlanError;

/// Identifier of a step, unique within one plan.
pub type StepId = u64;

/// Step parameters, in the order the planner wrote them.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// How the planner would like the steps to collaborate.
///
/// This is only a hint: explicit dependencies always win (see
/// [`Plan::execution_mode`]).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaborationHint {
    #[default]
    Sequential,
    Parallel,
    Dag,
}

/// Execution strategy actually chosen for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
    Dag,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Sequential => "sequential",
            Self::Parallel => "parallel",
            Self::Dag => "dag",
        };
        write!(f, "{s}")
    }
}

/// One unit of work: a capability, an action on it, and its inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: StepId,
    pub capability: String,
    pub action: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default, alias = "dependsOn")]
    pub depends_on: BTreeSet<StepId>,
}

impl Step {
    pub fn new(id: StepId, capability: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            id,
            capability: capability.into(),
            action: action.into(),
            parameters: Parameters::new(),
            depends_on: BTreeSet::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, ids: impl IntoIterator<Item = StepId>) -> Self {
        self.depends_on.extend(ids);
        self
    }

    /// `capability.action`, used in logs.
    pub fn label(&self) -> String {
        format!("{}.{}", self.capability, self.action)
    }
}

/// A step graph produced by the planner for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(
        default,
        alias = "collaborationHint",
        alias = "collaborationType",
        alias = "collaboration_type"
    )]
    pub collaboration_hint: CollaborationHint,
}

impl Plan {
    pub fn new(description: impl Into<String>, collaboration_hint: CollaborationHint) -> Self {
        Self {
            description: description.into(),
            steps: Vec::new(),
            collaboration_hint,
        }
    }

    pub fn with_step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    /// Check the structural invariants the scheduler relies on.
    ///
    /// Dependencies on ids that are not in the plan are accepted here; such
    /// steps simply never become ready.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.steps.is_empty() {
            return Err(PlanError::Empty);
        }

        let mut seen = HashSet::with_capacity(self.steps.len());
        for step in &self.steps {
            if !seen.insert(step.id) {
                return Err(PlanError::DuplicateStepId { id: step.id });
            }
        }

        Ok(())
    }

    /// Pick the execution strategy. Any dependency edge forces DAG mode.
    pub fn execution_mode(&self) -> ExecutionMode {
        if self.steps.iter().any(|s| !s.depends_on.is_empty()) {
            ExecutionMode::Dag
        } else if self.collaboration_hint == CollaborationHint::Parallel {
            ExecutionMode::Parallel
        } else {
            ExecutionMode::Sequential
        }
    }

    pub fn step_ids(&self) -> Vec<StepId> {
        self.steps.iter().map(|s| s.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_step_plan(hint: CollaborationHint) -> Plan {
        Plan::new("test", hint)
            .with_step(Step::new(1, "calculator", "add"))
            .with_step(Step::new(2, "translator", "translate"))
    }

    #[test]
    fn empty_plan_is_rejected() {
        let plan = Plan::new("nothing", CollaborationHint::Sequential);
        assert!(matches!(plan.validate(), Err(PlanError::Empty)));
        assert_eq!(PlanError::Empty.to_string(), "no capability identified");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let plan = Plan::new("dup", CollaborationHint::Sequential)
            .with_step(Step::new(7, "search", "search"))
            .with_step(Step::new(7, "calculator", "add"));
        assert!(matches!(
            plan.validate(),
            Err(PlanError::DuplicateStepId { id: 7 })
        ));
    }

    #[test]
    fn unknown_dependency_is_tolerated() {
        let plan = Plan::new("dangling", CollaborationHint::Dag)
            .with_step(Step::new(1, "search", "search").depends_on([42]));
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn dependencies_force_dag_mode() {
        let mut plan = two_step_plan(CollaborationHint::Parallel);
        plan.steps[1].depends_on.insert(1);
        assert_eq!(plan.execution_mode(), ExecutionMode::Dag);
    }

    #[test]
    fn hint_selects_parallel_or_sequential() {
        assert_eq!(
            two_step_plan(CollaborationHint::Parallel).execution_mode(),
            ExecutionMode::Parallel
        );
        assert_eq!(
            two_step_plan(CollaborationHint::Sequential).execution_mode(),
            ExecutionMode::Sequential
        );
        // A dag hint without edges has nothing to order by.
        assert_eq!(
            two_step_plan(CollaborationHint::Dag).execution_mode(),
            ExecutionMode::Sequential
        );
    }

    #[test]
    fn deserializes_camel_case_planner_output() {
        let json = r#"{
            "description": "weather then translate",
            "collaborationType": "parallel",
            "steps": [
                {"id": 3, "capability": "weather", "action": "report", "parameters": {"city": "Beijing"}},
                {"id": 1, "capability": "translator", "action": "translate", "dependsOn": [3]}
            ]
        }"#;
        let plan: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.collaboration_hint, CollaborationHint::Parallel);
        assert_eq!(plan.step_ids(), vec![3, 1]);
        assert!(plan.steps[1].depends_on.contains(&3));
        assert!(plan.steps[1].parameters.is_empty());
    }

    #[test]
    fn parameters_keep_declaration_order() {
        let step = Step::new(1, "calculator", "add")
            .with_param("b", 3)
            .with_param("a", 2);
        let keys: Vec<_> = step.parameters.keys().cloned().collect();
        assert_eq!(keys, vec!["b", "a"]);
    }
}
