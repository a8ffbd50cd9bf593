//! Planners turn a free-text request into a [`Plan`].
//!
//! Two implementations ship with the crate: [`llm::LlmPlanner`] asks an
//! OpenAI-compatible model for a plan, [`rules::KeywordPlanner`] routes on
//! keywords when no model is configured.

pub mod llm;
pub mod rules;

pub use llm::LlmPlanner;
pub use rules::KeywordPlanner;

use async_trait::async_trait;

use crate::error::PlanningError;
use crate::plan::{CollaborationHint, Plan, Step};

#[async_trait]
pub trait Planner: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Produce a plan for `input`. Errors make the coordinator fall back to
    /// [`fallback_plan`].
    async fn plan(&self, input: &str) -> Result<Plan, PlanningError>;
}

/// Parse planner output. The whole text must be one plan object.
pub fn parse_plan(text: &str) -> Result<Plan, PlanningError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PlanningError::InvalidResponse {
            reason: "empty plan text".to_string(),
        });
    }
    Ok(serde_json::from_str(text)?)
}

/// The plan used whenever planning fails: search for the raw input.
pub fn fallback_plan(input: &str) -> Plan {
    Plan::new("Search for the request", CollaborationHint::Sequential)
        .with_step(Step::new(1, "search", "search").with_param("query", input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ExecutionMode;

    #[test]
    fn test_parse_plan() {
        let plan = parse_plan(
            r#"
            {"description": "add then translate",
             "steps": [
               {"id": 1, "capability": "calculator", "action": "add", "parameters": {"a": 2, "b": 3}},
               {"id": 2, "capability": "translator", "action": "translate",
                "parameters": {"text": "step:1", "target_language": "英文"}, "depends_on": [1]}
             ]}
            "#,
        )
        .unwrap();
        assert_eq!(plan.steps.len(), 2);
        assert_eq!(plan.execution_mode(), ExecutionMode::Dag);
    }

    #[test]
    fn test_parse_plan_is_strict() {
        assert!(matches!(
            parse_plan("   "),
            Err(PlanningError::InvalidResponse { .. })
        ));
        assert!(matches!(
            parse_plan("Here is your plan: {\"steps\": []}"),
            Err(PlanningError::Parse(_))
        ));
        assert!(matches!(
            parse_plan("```json\n{\"steps\": []}\n```"),
            Err(PlanningError::Parse(_))
        ));
        assert!(matches!(
            parse_plan(r#"{"steps": [{"id": "one", "capability": "search", "action": "search"}]}"#),
            Err(PlanningError::Parse(_))
        ));
    }

    #[test]
    fn test_fallback_plan() {
        let plan = fallback_plan("what is rust");
        assert_eq!(plan.steps.len(), 1);
        let step = &plan.steps[0];
        assert_eq!((step.capability.as_str(), step.action.as_str()), ("search", "search"));
        assert_eq!(step.parameters["query"], "what is rust");
        assert!(plan.validate().is_ok());
    }
}
