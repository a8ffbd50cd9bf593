//! Keyword planner: an ordered rule table used when no model is available.
//!
//! Each rule pairs a regex with a one-step plan template. Rules are tried in
//! order and the first match wins; input that matches nothing becomes a
//! search.

use async_trait::async_trait;
use regex::Regex;

use crate::error::PlanningError;
use crate::plan::{CollaborationHint, Plan, Step};
use crate::planner::{Planner, fallback_plan};

/// A routing rule with a compiled regex.
pub struct KeywordRule {
    /// Capability the rule routes to, for logs.
    pub name: &'static str,
    pub regex: Regex,
    /// Builds the step from the raw input.
    pub build: fn(&str) -> Step,
}

pub struct KeywordPlanner {
    rules: Vec<KeywordRule>,
}

fn translation_target(input: &str) -> &'static str {
    let lower = input.to_lowercase();
    if lower.contains("中文") || lower.contains("chinese") {
        "中文"
    } else if lower.contains("日文") || lower.contains("japanese") {
        "日文"
    } else if lower.contains("法文") || lower.contains("french") {
        "法文"
    } else {
        "英文"
    }
}

impl KeywordPlanner {
    /// Create a planner with the default routing table.
    pub fn default_rules() -> Self {
        let rules = vec![
            KeywordRule {
                name: "calculator",
                regex: Regex::new(
                    r"(?i)(计算|数学|\bcalculate\b|\bcompute\b|-?\d+(?:\.\d+)?\s*[+\-*/×÷]\s*-?\d+)",
                )
                .unwrap(),
                build: |input| {
                    Step::new(1, "calculator", "evaluate").with_param("expression", input)
                },
            },
            KeywordRule {
                name: "weather",
                regex: Regex::new(r"(?i)(天气|温度|下雨|\bweather\b|\btemperature\b|\bforecast\b)")
                    .unwrap(),
                build: |input| Step::new(1, "weather", "report").with_param("query", input),
            },
            KeywordRule {
                name: "time",
                regex: Regex::new(r"(?i)(时间|几点|时区|日期|\bwhat time\b|\btime\b|\bdate\b)")
                    .unwrap(),
                build: |_| Step::new(1, "time", "now"),
            },
            KeywordRule {
                name: "translator",
                regex: Regex::new(r"(?i)(翻译|\btranslate\b|\btranslation\b)").unwrap(),
                build: |input| {
                    Step::new(1, "translator", "translate")
                        .with_param("text", input)
                        .with_param("target_language", translation_target(input))
                },
            },
            KeywordRule {
                name: "file",
                regex: Regex::new(r"(?i)(文件|目录|\bfiles?\b|\bdirectory\b|\bfolder\b)").unwrap(),
                build: |_| Step::new(1, "file", "list").with_param("path", "."),
            },
            KeywordRule {
                name: "search",
                regex: Regex::new(r"(?i)(搜索|查询|信息|\bsearch\b|\blook up\b|\bwhat is\b)")
                    .unwrap(),
                build: |input| Step::new(1, "search", "search").with_param("query", input),
            },
        ];

        Self { rules }
    }

    /// Create a planner with no rules; everything falls back to search.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append a rule after the existing ones.
    pub fn add_rule(&mut self, rule: KeywordRule) {
        self.rules.push(rule);
    }

    /// Name of the first rule matching `input`.
    pub fn route(&self, input: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.regex.is_match(input))
            .map(|rule| rule.name)
    }
}

impl Default for KeywordPlanner {
    fn default() -> Self {
        Self::default_rules()
    }
}

#[async_trait]
impl Planner for KeywordPlanner {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn plan(&self, input: &str) -> Result<Plan, PlanningError> {
        let Some(rule) = self.rules.iter().find(|rule| rule.regex.is_match(input)) else {
            tracing::debug!("No keyword rule matched, searching");
            return Ok(fallback_plan(input));
        };

        tracing::debug!(rule = rule.name, "Keyword rule matched");
        Ok(
            Plan::new(format!("{} request", rule.name), CollaborationHint::Sequential)
                .with_step((rule.build)(input)),
        )
    }
}
