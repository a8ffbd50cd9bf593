//! Planner backed by an OpenAI-compatible chat-completions API.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::capabilities::{CapabilityDescriptor, CapabilityRegistry};
use crate::config::PlannerConfig;
use crate::error::{ConfigError, Error, PlanningError};
use crate::plan::Plan;
use crate::planner::{Planner, parse_plan};

const PLAN_FORMAT: &str = r#"Reply with a single JSON object and nothing else:
{
  "description": "what the plan does",
  "collaboration_hint": "sequential" | "parallel" | "dag",
  "steps": [
    {"id": 1, "capability": "<name>", "action": "<action>", "parameters": {}, "depends_on": []}
  ]
}
Rules:
- Step ids are unique integers.
- To use the output of an earlier step, set a parameter to "step:<id>" and list that id in depends_on.
- In a sequential plan without depends_on, "{{previous}}" inside a string parameter is replaced with the previous step's result.
- Use "parallel" only for independent steps."#;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

pub struct LlmPlanner {
    client: reqwest::Client,
    api_key: SecretString,
    config: PlannerConfig,
    registry: Arc<CapabilityRegistry>,
}

impl LlmPlanner {
    /// Build a planner from `config`, which must carry an API key.
    pub fn new(config: PlannerConfig, registry: Arc<CapabilityRegistry>) -> Result<Self, Error> {
        let api_key = config.api_key.clone().ok_or_else(|| ConfigError::InvalidValue {
            key: "OPENAI_API_KEY".to_string(),
            message: "an API key is required for the LLM planner".to_string(),
        })?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PlanningError::RequestFailed {
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        tracing::info!(model = %config.model, base_url = %config.base_url, "Using LLM planner");
        Ok(Self {
            client,
            api_key,
            config,
            registry,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    async fn complete(&self, system: &str, input: &str) -> Result<String, PlanningError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: input,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| PlanningError::RequestFailed {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PlanningError::RequestFailed {
                reason: format!("HTTP {status}: {}", truncate(&body, 200)),
            });
        }

        let body: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| PlanningError::InvalidResponse {
                    reason: e.to_string(),
                })?;
        reply_content(body)
    }
}

/// The system prompt: available capabilities followed by the plan format.
pub fn build_prompt(descriptors: &[CapabilityDescriptor]) -> String {
    let mut prompt = String::from(
        "You split a user's request into steps, each handled by one capability.\n\nCapabilities:\n",
    );
    for descriptor in descriptors {
        prompt.push_str(&format!(
            "- {} [{}]: {}\n",
            descriptor.name,
            descriptor.actions.join(", "),
            descriptor.description
        ));
    }
    prompt.push('\n');
    prompt.push_str(PLAN_FORMAT);
    prompt
}

fn reply_content(response: ChatResponse) -> Result<String, PlanningError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| PlanningError::InvalidResponse {
            reason: "response contained no message content".to_string(),
        })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn plan(&self, input: &str) -> Result<Plan, PlanningError> {
        let prompt = build_prompt(&self.registry.descriptors().await);
        let content = self.complete(&prompt, input).await?;
        tracing::debug!(chars = content.len(), "Planner replied");
        parse_plan(&content)
    }
}
