//! # Declarative alert conditions.
//!
//! An [`AlertCondition`] escalates the severity of a probe result when a
//! measured field crosses a threshold. The effective severity of a result
//! is the maximum of the probe's own classification and every matched
//! condition; an unmatched condition contributes nothing.
//!
//! ## Operators
//! ```text
//! gt / lt    numeric comparison of measured value against threshold
//! eq / neq   strict equality
//! contains   string inclusion
//! regex      pattern match over the stringified value
//! ```

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::probes::probe::Severity;

/// Comparison applied by an alert condition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertOperator {
    /// Measured value is numerically greater than the threshold.
    Gt,
    /// Measured value is numerically less than the threshold.
    Lt,
    /// Measured value equals the threshold.
    Eq,
    /// Measured value differs from the threshold.
    Neq,
    /// Stringified value contains the threshold string.
    Contains,
    /// Stringified value matches the threshold regex.
    Regex,
}

/// One escalation rule over a probe's measured values.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertCondition {
    /// Field of the probe result to inspect.
    pub field: String,
    /// Comparison operator.
    pub operator: AlertOperator,
    /// Threshold or pattern compared against.
    pub threshold: Value,
    /// Severity contributed when the condition matches.
    pub severity: Severity,
}

impl AlertCondition {
    /// Creates a condition.
    pub fn new(
        field: impl Into<String>,
        operator: AlertOperator,
        threshold: impl Into<Value>,
        severity: Severity,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            threshold: threshold.into(),
            severity,
        }
    }

    /// Evaluates the condition against a result's values.
    ///
    /// An absent field, a type mismatch, or an invalid pattern all evaluate
    /// to no match.
    pub fn matches(&self, values: &BTreeMap<String, Value>) -> bool {
        let Some(value) = values.get(&self.field) else {
            return false;
        };

        match self.operator {
            AlertOperator::Gt => match (value.as_f64(), self.threshold.as_f64()) {
                (Some(v), Some(t)) => v > t,
                _ => false,
            },
            AlertOperator::Lt => match (value.as_f64(), self.threshold.as_f64()) {
                (Some(v), Some(t)) => v < t,
                _ => false,
            },
            AlertOperator::Eq => value == &self.threshold,
            AlertOperator::Neq => value != &self.threshold,
            AlertOperator::Contains => match (value.as_str(), self.threshold.as_str()) {
                (Some(v), Some(t)) => v.contains(t),
                _ => false,
            },
            AlertOperator::Regex => {
                let Some(pattern) = self.threshold.as_str() else {
                    return false;
                };
                match Regex::new(pattern) {
                    Ok(re) => re.is_match(&stringify(value)),
                    Err(e) => {
                        warn!(field = %self.field, error = %e, "invalid alert pattern");
                        false
                    }
                }
            }
        }
    }
}

/// Computes the effective severity of a result under `conditions`.
///
/// Starts from the probe's own classification and takes the maximum over
/// every matched condition, so `critical` overrides `warn`.
pub fn escalate(
    base: Severity,
    conditions: &[AlertCondition],
    values: &BTreeMap<String, Value>,
) -> Severity {
    conditions
        .iter()
        .filter(|c| c.matches(values))
        .map(|c| c.severity)
        .fold(base, Severity::max)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
