//! Exact decimal arithmetic.

use std::str::FromStr;
use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use rust_decimal::{Decimal, MathematicalOps};

use crate::capabilities::{Capability, require_decimal, require_str, unknown_action};
use crate::error::CapabilityError;
use crate::plan::Parameters;

const NAME: &str = "calculator";

/// `<number> <op> <number>`, e.g. `12.5 * 4`.
static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(-?\d+(?:\.\d+)?)\s*([+\-*/×÷])\s*(-?\d+(?:\.\d+)?)").expect("valid regex")
});

/// Arithmetic on `a`/`b` parameters, or a single binary `expression`.
#[derive(Debug, Default)]
pub struct CalculatorCapability;

impl CalculatorCapability {
    pub fn new() -> Self {
        Self
    }

    fn failed(reason: impl Into<String>) -> CapabilityError {
        CapabilityError::Failed {
            capability: NAME.to_string(),
            reason: reason.into(),
        }
    }

    fn apply(op: &str, a: Decimal, b: Decimal) -> Result<Decimal, CapabilityError> {
        match op {
            "+" | "add" => a.checked_add(b).ok_or_else(|| Self::failed("overflow")),
            "-" | "subtract" => a.checked_sub(b).ok_or_else(|| Self::failed("overflow")),
            "*" | "×" | "multiply" => a.checked_mul(b).ok_or_else(|| Self::failed("overflow")),
            "/" | "÷" | "divide" => {
                if b.is_zero() {
                    return Err(Self::failed("division by zero"));
                }
                a.checked_div(b).ok_or_else(|| Self::failed("overflow"))
            }
            other => Err(unknown_action(NAME, other)),
        }
    }

    fn evaluate(expression: &str) -> Result<Decimal, CapabilityError> {
        let caps = EXPRESSION.captures(expression).ok_or_else(|| {
            CapabilityError::InvalidParameters {
                capability: NAME.to_string(),
                reason: format!("no arithmetic expression found in '{expression}'"),
            }
        })?;
        let parse = |s: &str| {
            Decimal::from_str(s).map_err(|e| Self::failed(format!("bad operand '{s}': {e}")))
        };
        Self::apply(&caps[2], parse(&caps[1])?, parse(&caps[3])?)
    }
}

#[async_trait]
impl Capability for CalculatorCapability {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Exact arithmetic: add, subtract, multiply, divide (a, b), square and sqrt (a), evaluate (expression)"
    }

    fn actions(&self) -> &[&'static str] {
        &["add", "subtract", "multiply", "divide", "square", "sqrt", "evaluate"]
    }

    async fn invoke(&self, action: &str, params: &Parameters) -> Result<String, CapabilityError> {
        let value = match action {
            "add" | "subtract" | "multiply" | "divide" => {
                let a = require_decimal(NAME, params, "a")?;
                let b = require_decimal(NAME, params, "b")?;
                Self::apply(action, a, b)?
            }
            "square" => {
                let a = require_decimal(NAME, params, "a")?;
                a.checked_mul(a).ok_or_else(|| Self::failed("overflow"))?
            }
            "sqrt" => {
                let a = require_decimal(NAME, params, "a")?;
                if a.is_sign_negative() && !a.is_zero() {
                    return Err(Self::failed("cannot take the square root of a negative number"));
                }
                a.sqrt().ok_or_else(|| Self::failed("square root did not converge"))?
            }
            "evaluate" => Self::evaluate(require_str(NAME, params, "expression")?)?,
            other => return Err(unknown_action(NAME, other)),
        };

        tracing::debug!(action, result = %value, "Calculator evaluated");
        Ok(value.normalize().to_string())
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
    async fn test_basic_operations() {
        let calc = CalculatorCapability::new();
        let p = params(json!({"a": 2, "b": 3}));
        assert_eq!(calc.invoke("add", &p).await.unwrap(), "5");
        assert_eq!(calc.invoke("subtract", &p).await.unwrap(), "-1");
        assert_eq!(calc.invoke("multiply", &p).await.unwrap(), "6");

        let p = params(json!({"a": "7", "b": 2}));
        assert_eq!(calc.invoke("divide", &p).await.unwrap(), "3.5");
    }

    #[tokio::test]
    async fn test_square_and_sqrt() {
        let calc = CalculatorCapability::new();
        assert_eq!(calc.invoke("square", &params(json!({"a": 12}))).await.unwrap(), "144");
        let root = calc.invoke("sqrt", &params(json!({"a": 81}))).await.unwrap();
        assert_eq!(Decimal::from_str(&root).unwrap().round_dp(8), Decimal::from(9));
        let err = calc
            .invoke("sqrt", &params(json!({"a": -4})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("negative"));
    }

    #[tokio::test]
    async fn test_division_by_zero() {
        let calc = CalculatorCapability::new();
        let err = calc
            .invoke("divide", &params(json!({"a": 1, "b": 0})))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "calculator failed: division by zero");
    }

    #[tokio::test]
    async fn test_evaluate_expression() {
        let calc = CalculatorCapability::new();
        let p = params(json!({"expression": "please compute 12.5 * 4"}));
        assert_eq!(calc.invoke("evaluate", &p).await.unwrap(), "50");
        let p = params(json!({"expression": "nothing to do"}));
        assert!(calc.invoke("evaluate", &p).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_parameter_and_unknown_action() {
        let calc = CalculatorCapability::new();
        let err = calc.invoke("add", &params(json!({"a": 1}))).await.unwrap_err();
        assert!(matches!(err, CapabilityError::InvalidParameters { .. }));
        let err = calc.invoke("modulo", &Parameters::new()).await.unwrap_err();
        assert!(matches!(err, CapabilityError::UnknownAction { .. }));
    }
}
