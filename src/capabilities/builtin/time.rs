//! Clock and calendar math.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{FixedOffset, NaiveTime, Utc};
use regex::Regex;

use crate::capabilities::{Capability, optional_str, require_str, unknown_action};
use crate::error::CapabilityError;
use crate::plan::Parameters;

const NAME: &str = "time";

static OFFSET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:UTC|GMT)?([+-])(\d{1,2}):?(\d{2})?$").expect("valid regex"));

#[derive(Debug, Default)]
pub struct TimeCapability;

impl TimeCapability {
    pub fn new() -> Self {
        Self
    }

    fn invalid(reason: String) -> CapabilityError {
        CapabilityError::InvalidParameters {
            capability: NAME.to_string(),
            reason,
        }
    }

    fn parse_offset(raw: &str) -> Result<FixedOffset, CapabilityError> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("utc") || trimmed.eq_ignore_ascii_case("z") {
            return FixedOffset::east_opt(0).ok_or_else(|| Self::invalid("bad offset".into()));
        }
        let caps = OFFSET.captures(trimmed).ok_or_else(|| {
            Self::invalid(format!("invalid offset '{raw}', expected e.g. '+08:00'"))
        })?;
        let hours: i32 = caps[2].parse().unwrap_or(0);
        let minutes: i32 = caps.get(3).map_or(0, |m| m.as_str().parse().unwrap_or(0));
        let seconds = (hours * 3600 + minutes * 60) * if &caps[1] == "-" { -1 } else { 1 };
        FixedOffset::east_opt(seconds)
            .ok_or_else(|| Self::invalid(format!("offset '{raw}' is out of range")))
    }

    fn parse_clock(key: &str, raw: &str) -> Result<NaiveTime, CapabilityError> {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .map_err(|_| Self::invalid(format!("parameter '{key}' must be HH:MM, got '{raw}'")))
    }
}

#[async_trait]
impl Capability for TimeCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Current time and date, time at a UTC offset (offset), hours between two HH:MM times (start, end)"
    }

    fn actions(&self) -> &[&'static str] {
        &["now", "date", "in_offset", "difference"]
    }

    async fn invoke(&self, action: &str, params: &Parameters) -> Result<String, CapabilityError> {
        match action {
            "now" => Ok(format!(
                "Current time: {}",
                Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
            )),
            "date" => Ok(format!("Today is {}", Utc::now().format("%Y-%m-%d"))),
            "in_offset" => {
                let raw = optional_str(params, "offset").unwrap_or("+00:00");
                let offset = Self::parse_offset(raw)?;
                Ok(format!(
                    "Current time at UTC{}: {}",
                    offset,
                    Utc::now().with_timezone(&offset).format("%Y-%m-%d %H:%M:%S")
                ))
            }
            "difference" => {
                let start = Self::parse_clock("start", require_str(NAME, params, "start")?)?;
                let end = Self::parse_clock("end", require_str(NAME, params, "end")?)?;
                let minutes = (end - start).num_minutes().abs();
                let hours = minutes as f64 / 60.0;
                Ok(format!("{hours:.2}"))
            }
            other => Err(unknown_action(NAME, other)),
        }
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
    async fn test_difference_in_hours() {
        let time = TimeCapability::new();
        let p = params(json!({"start": "09:30", "end": "12:00"}));
        assert_eq!(time.invoke("difference", &p).await.unwrap(), "2.50");
        let p = params(json!({"start": "18:00", "end": "06:00"}));
        assert_eq!(time.invoke("difference", &p).await.unwrap(), "12.00");
    }

    #[tokio::test]
    async fn test_bad_clock_is_descriptive() {
        let time = TimeCapability::new();
        let p = params(json!({"start": "nine", "end": "12:00"}));
        let err = time.invoke("difference", &p).await.unwrap_err();
        assert!(err.to_string().contains("HH:MM"));
    }

    #[tokio::test]
    async fn test_offset_parsing() {
        assert_eq!(
            TimeCapability::parse_offset("+08:00").unwrap().local_minus_utc(),
            8 * 3600
        );
        assert_eq!(
            TimeCapability::parse_offset("UTC-0530").unwrap().local_minus_utc(),
            -(5 * 3600 + 30 * 60)
        );
        assert!(TimeCapability::parse_offset("Mars/Olympus").is_err());

        let time = TimeCapability::new();
        let out = time
            .invoke("in_offset", &params(json!({"offset": "+09:00"})))
            .await
            .unwrap();
        assert!(out.starts_with("Current time at UTC+09:00"));
    }

    #[tokio::test]
    async fn test_now_without_parameters() {
        let time = TimeCapability::new();
        let out = time.invoke("now", &Parameters::new()).await.unwrap();
        assert!(out.starts_with("Current time: "));
    }
}
