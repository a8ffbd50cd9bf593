//! Capabilities are the handlers plan steps are dispatched to.

pub mod builtin;
pub mod registry;

pub use registry::{CapabilityDescriptor, CapabilityRegistry};

use std::str::FromStr;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::CapabilityError;
use crate::plan::Parameters;

/// A named handler that executes the actions of one capability.
///
/// Handlers report unknown actions and bad or missing parameters as
/// [`CapabilityError`]s; the scheduler turns every error into step text.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Name steps use to address this capability.
    fn name(&self) -> &str;

    /// One-line description shown to planners and in capability listings.
    fn description(&self) -> &str;

    /// Actions this capability understands.
    fn actions(&self) -> &[&'static str] {
        &[]
    }

    /// Run `action` with the given (already substituted) parameters.
    async fn invoke(&self, action: &str, params: &Parameters) -> Result<String, CapabilityError>;
}

/// Fetch a required string parameter.
pub fn require_str<'a>(
    capability: &str,
    params: &'a Parameters,
    key: &str,
) -> Result<&'a str, CapabilityError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| CapabilityError::InvalidParameters {
            capability: capability.to_string(),
            reason: format!("missing string parameter '{key}'"),
        })
}

/// Fetch an optional string parameter, ignoring non-string values.
pub fn optional_str<'a>(params: &'a Parameters, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Fetch a required numeric parameter. Numeric strings are accepted because
/// upstream results arrive as text after substitution.
pub fn require_decimal(
    capability: &str,
    params: &Parameters,
    key: &str,
) -> Result<Decimal, CapabilityError> {
    let invalid = |reason: String| CapabilityError::InvalidParameters {
        capability: capability.to_string(),
        reason,
    };

    match params.get(key) {
        Some(serde_json::Value::Number(n)) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map_err(|e| invalid(format!("parameter '{key}' is not a decimal: {e}"))),
        Some(serde_json::Value::String(s)) => Decimal::from_str(s.trim())
            .map_err(|_| invalid(format!("parameter '{key}' is not a number: '{s}'"))),
        Some(other) => Err(invalid(format!("parameter '{key}' is not a number: {other}"))),
        None => Err(invalid(format!("missing numeric parameter '{key}'"))),
    }
}

pub(crate) fn unknown_action(capability: &str, action: &str) -> CapabilityError {
    CapabilityError::UnknownAction {
        capability: capability.to_string(),
        action: action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn params(value: serde_json::Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn decimal_from_number_or_string() {
        let p = params(json!({"a": 2, "b": "3.5", "c": 1.25}));
        assert_eq!(require_decimal("calc", &p, "a").unwrap(), dec!(2));
        assert_eq!(require_decimal("calc", &p, "b").unwrap(), dec!(3.5));
        assert_eq!(require_decimal("calc", &p, "c").unwrap(), dec!(1.25));
    }

    #[test]
    fn missing_or_bad_decimal_is_descriptive() {
        let p = params(json!({"a": "many"}));
        let err = require_decimal("calc", &p, "a").unwrap_err();
        assert!(err.to_string().contains("not a number"));
        let err = require_decimal("calc", &p, "b").unwrap_err();
        assert!(err.to_string().contains("missing numeric parameter 'b'"));
    }

    #[test]
    fn require_str_rejects_non_strings() {
        let p = params(json!({"text": 5}));
        assert!(require_str("translator", &p, "text").is_err());
        assert_eq!(optional_str(&p, "text"), None);
    }
}
