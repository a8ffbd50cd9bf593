//! Simulated weather lookups.

use async_trait::async_trait;
use rand::Rng;

use crate::capabilities::{Capability, optional_str, unknown_action};
use crate::error::CapabilityError;
use crate::plan::Parameters;

const NAME: &str = "weather";

/// Known cities: (names, typical conditions).
const CITIES: &[(&[&str], &str)] = &[
    (&["北京", "beijing"], "sunny"),
    (&["上海", "shanghai"], "cloudy"),
    (&["广州", "guangzhou"], "light rain"),
    (&["深圳", "shenzhen"], "sunny"),
    (&["杭州", "hangzhou"], "overcast"),
    (&["成都", "chengdu"], "cloudy"),
    (&["西安", "xi'an", "xian"], "sunny"),
    (&["武汉", "wuhan"], "light rain"),
];

const CONDITIONS: &[&str] = &[
    "sunny",
    "cloudy",
    "overcast",
    "light rain",
    "moderate rain",
    "heavy rain",
];

struct Reading {
    conditions: &'static str,
    temperature_c: i32,
    humidity_pct: i32,
}

/// Kept synchronous so the thread-local RNG never lives across an await.
fn sample(known: Option<&'static str>) -> Reading {
    let mut rng = rand::thread_rng();
    Reading {
        conditions: known.unwrap_or_else(|| CONDITIONS[rng.gen_range(0..CONDITIONS.len())]),
        temperature_c: rng.gen_range(15..35),
        humidity_pct: rng.gen_range(30..80),
    }
}

fn find_known(text: &str) -> Option<(&'static str, &'static str)> {
    let lower = text.to_lowercase();
    CITIES.iter().find_map(|(names, conditions)| {
        names
            .iter()
            .find(|name| lower.contains(*name))
            .map(|name| (*name, *conditions))
    })
}

#[derive(Debug, Default)]
pub struct WeatherCapability;

impl WeatherCapability {
    pub fn new() -> Self {
        Self
    }

    /// Resolve the city from `city`, or from a known city mentioned in `query`.
    fn resolve_city(params: &Parameters) -> Result<(String, Option<&'static str>), CapabilityError> {
        if let Some(city) = optional_str(params, "city").filter(|c| !c.trim().is_empty()) {
            let known = find_known(city).map(|(_, conditions)| conditions);
            return Ok((city.trim().to_string(), known));
        }
        if let Some((name, conditions)) = optional_str(params, "query").and_then(find_known) {
            return Ok((name.to_string(), Some(conditions)));
        }
        Err(CapabilityError::InvalidParameters {
            capability: NAME.to_string(),
            reason: "missing string parameter 'city'".to_string(),
        })
    }
}

#[async_trait]
impl Capability for WeatherCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Weather report, temperature or humidity for a city (city)"
    }

    fn actions(&self) -> &[&'static str] {
        &["report", "temperature", "humidity"]
    }

    async fn invoke(&self, action: &str, params: &Parameters) -> Result<String, CapabilityError> {
        if !self.actions().iter().any(|a| *a == action) {
            return Err(unknown_action(NAME, action));
        }
        let (city, known) = Self::resolve_city(params)?;
        let reading = sample(known);
        tracing::debug!(city = %city, action, "Weather lookup");

        Ok(match action {
            "temperature" => format!("{city}: {}°C", reading.temperature_c),
            "humidity" => format!("{city}: {}% humidity", reading.humidity_pct),
            _ => format!(
                "{city}: {}, {}°C, {}% humidity",
                reading.conditions, reading.temperature_c, reading.humidity_pct
            ),
        })
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
    async fn test_known_city_keeps_conditions() {
        let weather = WeatherCapability::new();
        let out = weather
            .invoke("report", &params(json!({"city": "北京"})))
            .await
            .unwrap();
        assert!(out.starts_with("北京: sunny, "), "{out}");
    }

    #[tokio::test]
    async fn test_city_found_in_query() {
        let weather = WeatherCapability::new();
        let out = weather
            .invoke("temperature", &params(json!({"query": "how hot is Shanghai today"})))
            .await
            .unwrap();
        assert!(out.starts_with("shanghai: "), "{out}");
        assert!(out.ends_with("°C"));
    }

    #[test]
    fn test_sample_ranges() {
        for _ in 0..50 {
            let r = sample(None);
            assert!((15..35).contains(&r.temperature_c));
            assert!((30..80).contains(&r.humidity_pct));
            assert!(CONDITIONS.contains(&r.conditions));
        }
    }

    #[tokio::test]
    async fn test_missing_city_and_unknown_action() {
        let weather = WeatherCapability::new();
        let err = weather.invoke("report", &Parameters::new()).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidParameters { .. }));
        let err = weather
            .invoke("forecast", &params(json!({"city": "Paris"})))
            .await
            .unwrap_err();
        assert!(matches!(err, CapabilityError::UnknownAction { .. }));
    }
}
