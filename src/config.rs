//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum number of tasks worked on at once.
    pub max_concurrent_tasks: usize,
    /// Maximum number of step invocations running at once, across all tasks.
    pub max_concurrent_steps: usize,
    /// Time allowed for a whole parallel fan-out.
    pub parallel_timeout: Duration,
    /// Buffered task events per subscriber before slow ones start skipping.
    pub event_capacity: usize,
    /// Finished tasks older than this are swept. `None` keeps them forever.
    pub task_ttl: Option<Duration>,
    /// How often the retention sweep runs when a TTL is set.
    pub retention_interval: Duration,
    /// Root directory for the file capability.
    pub workspace_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_tasks: 10,
            max_concurrent_steps: 10,
            parallel_timeout: Duration::from_secs(30),
            event_capacity: 256,
            task_ttl: None,
            retention_interval: Duration::from_secs(60), // 1 minute
            workspace_dir: PathBuf::from("./workspace"),
        }
    }
}

impl EngineConfig {
    /// Read `PLAN_ENGINE_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let task_ttl = match optional::<u64>(&lookup, "PLAN_ENGINE_TASK_TTL_SECS")? {
            Some(0) | None => None,
            Some(secs) => Some(Duration::from_secs(secs)),
        };

        Ok(Self {
            max_concurrent_tasks: positive(
                &lookup,
                "PLAN_ENGINE_MAX_TASKS",
                defaults.max_concurrent_tasks,
            )?,
            max_concurrent_steps: positive(
                &lookup,
                "PLAN_ENGINE_MAX_STEPS",
                defaults.max_concurrent_steps,
            )?,
            parallel_timeout: Duration::from_secs(positive(
                &lookup,
                "PLAN_ENGINE_PARALLEL_TIMEOUT_SECS",
                defaults.parallel_timeout.as_secs(),
            )?),
            event_capacity: positive(
                &lookup,
                "PLAN_ENGINE_EVENT_CAPACITY",
                defaults.event_capacity,
            )?,
            task_ttl,
            retention_interval: defaults.retention_interval,
            workspace_dir: lookup("PLAN_ENGINE_WORKSPACE")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_dir),
        })
    }
}

/// Configuration for the LLM-backed planner.
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    /// Without a key the keyword planner is used instead.
    pub api_key: Option<SecretString>,
    pub model: String,
    /// Base URL of an OpenAI-compatible API.
    pub base_url: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "qwen-plus".to_string(),
            base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let temperature: f32 =
            optional(&lookup, "PLAN_ENGINE_TEMPERATURE")?.unwrap_or(defaults.temperature);
        if !(0.0..=2.0).contains(&temperature) {
            return Err(ConfigError::InvalidValue {
                key: "PLAN_ENGINE_TEMPERATURE".to_string(),
                message: format!("{temperature} is outside 0.0..=2.0"),
            });
        }

        Ok(Self {
            api_key: lookup("OPENAI_API_KEY")
                .filter(|s| !s.trim().is_empty())
                .map(SecretString::from),
            model: lookup("PLAN_ENGINE_MODEL")
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.model),
            base_url: lookup("PLAN_ENGINE_BASE_URL")
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            temperature,
            max_tokens: positive(&lookup, "PLAN_ENGINE_MAX_TOKENS", defaults.max_tokens)?,
            request_timeout: defaults.request_timeout,
        })
    }
}

fn optional<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}': {e}"),
            }),
    }
}

fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default + Copy + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    let value = optional(lookup, key)?.unwrap_or(default);
    if value <= T::default() {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("must be greater than zero, got {value}"),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.max_concurrent_tasks, 10);
        assert_eq!(config.max_concurrent_steps, 10);
        assert_eq!(config.parallel_timeout, Duration::from_secs(30));
        assert_eq!(config.event_capacity, 256);
        assert_eq!(config.task_ttl, None);
        assert_eq!(config.workspace_dir, PathBuf::from("./workspace"));
    }

    #[test]
    fn test_engine_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("PLAN_ENGINE_MAX_TASKS", "4"),
            ("PLAN_ENGINE_MAX_STEPS", " 16 "),
            ("PLAN_ENGINE_PARALLEL_TIMEOUT_SECS", "5"),
            ("PLAN_ENGINE_TASK_TTL_SECS", "600"),
            ("PLAN_ENGINE_WORKSPACE", "/tmp/ws"),
        ]))
        .unwrap();
        assert_eq!(config.max_concurrent_tasks, 4);
        assert_eq!(config.max_concurrent_steps, 16);
        assert_eq!(config.parallel_timeout, Duration::from_secs(5));
        assert_eq!(config.task_ttl, Some(Duration::from_secs(600)));
        assert_eq!(config.workspace_dir, PathBuf::from("/tmp/ws"));

        let config =
            EngineConfig::from_lookup(lookup(&[("PLAN_ENGINE_TASK_TTL_SECS", "0")])).unwrap();
        assert_eq!(config.task_ttl, None);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = EngineConfig::from_lookup(lookup(&[("PLAN_ENGINE_MAX_TASKS", "lots")]))
            .unwrap_err();
        assert!(err.to_string().contains("PLAN_ENGINE_MAX_TASKS"));

        let err =
            EngineConfig::from_lookup(lookup(&[("PLAN_ENGINE_MAX_STEPS", "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));

        let err = PlannerConfig::from_lookup(lookup(&[("PLAN_ENGINE_TEMPERATURE", "9")]))
            .unwrap_err();
        assert!(err.to_string().contains("PLAN_ENGINE_TEMPERATURE"));
    }

    #[test]
    fn test_planner_config() {
        let config = PlannerConfig::from_lookup(lookup(&[])).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, "qwen-plus");
        assert_eq!(config.max_tokens, 1000);
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);

        let config = PlannerConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("PLAN_ENGINE_BASE_URL", "http://localhost:8000/v1/"),
            ("PLAN_ENGINE_MODEL", "gpt-4o-mini"),
        ]))
        .unwrap();
        assert_eq!(config.api_key.unwrap().expose_secret(), "sk-test");
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.model, "gpt-4o-mini");
    }
}
