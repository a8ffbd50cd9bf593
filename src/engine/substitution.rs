//! Feeding upstream results into downstream parameters.
//!
//! Only top-level string values are rewritten; nested arrays and objects pass
//! through unchanged.

use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use serde_json::Value;

use crate::engine::results::ResultSet;
use crate::plan::{Parameters, StepId};

/// Sentinel replaced with the previous step's text in sequential mode.
pub const PREVIOUS_RESULT: &str = "上一步结果";

/// English spelling of [`PREVIOUS_RESULT`].
pub const PREVIOUS_RESULT_EN: &str = "{{previous}}";

const STEP_REF_PREFIX: &str = "step:";

/// Both sentinels, matched in one pass so inserted text is never rescanned.
static PREVIOUS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        "{}|{}",
        regex::escape(PREVIOUS_RESULT),
        regex::escape(PREVIOUS_RESULT_EN)
    ))
    .expect("valid regex")
});

/// Parse a value of the exact form `step:<id>`, where `<id>` is plain digits.
pub fn parse_step_ref(value: &str) -> Option<StepId> {
    let digits = value.strip_prefix(STEP_REF_PREFIX)?;
    let id: StepId = digits.parse().ok()?;
    (id.to_string() == digits).then_some(id)
}

fn step_ref_text(value: &Value, results: &ResultSet) -> Option<Value> {
    value
        .as_str()
        .and_then(parse_step_ref)
        .and_then(|id| results.text(id))
        .map(|text| Value::String(text.to_string()))
}

fn previous_text(value: &Value, previous: &str) -> Value {
    match value {
        Value::String(s) => Value::String(PREVIOUS.replace_all(s, NoExpand(previous)).into_owned()),
        other => other.clone(),
    }
}

/// Replace every `step:<id>` value whose step has a result with that
/// result's text. References to steps without a result stay as they are.
pub fn resolve_step_refs(params: &Parameters, results: &ResultSet) -> Parameters {
    params
        .iter()
        .map(|(key, value)| {
            let replaced = step_ref_text(value, results);
            (key.clone(), replaced.unwrap_or_else(|| value.clone()))
        })
        .collect()
}

/// Sequential-mode substitution. A value that is a resolved `step:<id>`
/// reference takes that step's text verbatim; every other string value gets
/// the previous-result sentinels replaced.
pub fn resolve_sequential(
    params: &Parameters,
    results: &ResultSet,
    previous: Option<&str>,
) -> Parameters {
    params
        .iter()
        .map(|(key, value)| {
            let value = match (step_ref_text(value, results), previous) {
                (Some(replaced), _) => replaced,
                (None, Some(previous)) => previous_text(value, previous),
                (None, None) => value.clone(),
            };
            (key.clone(), value)
        })
        .collect()
}
