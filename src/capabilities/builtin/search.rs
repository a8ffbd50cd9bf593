//! Lookup over a small in-memory knowledge base. Also the target of the
//! fallback plan, so it must answer every query with something.

use async_trait::async_trait;

use crate::capabilities::{Capability, optional_str, unknown_action};
use crate::error::CapabilityError;
use crate::plan::Parameters;

const NAME: &str = "search";

const KNOWLEDGE_BASE: &[(&str, &str)] = &[
    (
        "rust",
        "Rust is a systems programming language focused on memory safety without a garbage collector.",
    ),
    (
        "java",
        "Java is an object-oriented language originally from Sun Microsystems, now maintained by Oracle.",
    ),
    (
        "python",
        "Python is an interpreted, dynamically typed language known for its concise syntax.",
    ),
    (
        "javascript",
        "JavaScript is a lightweight, just-in-time compiled language used mainly for web development.",
    ),
    (
        "人工智能",
        "人工智能（AI）是计算机科学的一个分支，致力于创建能够执行通常需要人类智能的任务的系统。",
    ),
    (
        "机器学习",
        "机器学习是人工智能的一个子集，它使计算机能够在没有明确编程的情况下学习和改进。",
    ),
    (
        "深度学习",
        "深度学习是机器学习的一个分支，使用多层神经网络来模拟人脑的学习过程。",
    ),
    (
        "北京",
        "北京是中国的首都，政治、文化、国际交往中心，有着丰富的历史文化遗产。",
    ),
    (
        "上海",
        "上海是中国最大的经济中心，国际化大都市，金融、贸易、航运中心。",
    ),
    (
        "深圳",
        "深圳是中国改革开放的窗口，科技创新中心，现代化国际化城市。",
    ),
];

#[derive(Debug, Default)]
pub struct SearchCapability;

impl SearchCapability {
    pub fn new() -> Self {
        Self
    }

    fn lookup(query: &str) -> String {
        let lower = query.trim().to_lowercase();
        let hit = KNOWLEDGE_BASE
            .iter()
            .find(|(topic, _)| lower.contains(topic) || (!lower.is_empty() && topic.contains(&lower)));

        match hit {
            Some((_, entry)) => format!("Search results for '{query}': {entry}"),
            None => format!(
                "No detailed information about '{query}' in the knowledge base; try a more specific keyword."
            ),
        }
    }
}

#[async_trait]
impl Capability for SearchCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Search the knowledge base for a topic (query)"
    }

    fn actions(&self) -> &[&'static str] {
        &["search"]
    }

    async fn invoke(&self, action: &str, params: &Parameters) -> Result<String, CapabilityError> {
        if action != "search" {
            return Err(unknown_action(NAME, action));
        }
        let query = optional_str(params, "query")
            .or_else(|| optional_str(params, "topic"))
            .ok_or_else(|| CapabilityError::InvalidParameters {
                capability: NAME.to_string(),
                reason: "missing string parameter 'query'".to_string(),
            })?;
        Ok(Self::lookup(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_hit_and_miss() {
        let search = SearchCapability::new();
        let out = search
            .invoke("search", &params(json!({"query": "Tell me about Rust"})))
            .await
            .unwrap();
        assert!(out.contains("memory safety"));

        let out = search
            .invoke("search", &params(json!({"query": "quantum knitting"})))
            .await
            .unwrap();
        assert!(out.starts_with("No detailed information about 'quantum knitting'"));
    }

    #[tokio::test]
    async fn test_topic_alias() {
        let search = SearchCapability::new();
        let out = search
            .invoke("search", &params(json!({"topic": "机器学习是什么"})))
            .await
            .unwrap();
        assert!(out.contains("人工智能的一个子集"));
    }

    #[tokio::test]
    async fn test_requires_query() {
        let search = SearchCapability::new();
        assert!(search.invoke("search", &Parameters::new()).await.is_err());
        assert!(search
            .invoke("docs", &params(json!({"query": "rust"})))
            .await
            .is_err());
    }
}
