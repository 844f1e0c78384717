//! Risk assessment input: normalization of raw request fields.
//!
//! Requests arrive as loosely typed JSON. Categorical answers are free-form
//! strings, numeric values may be numbers or numeric strings. This module
//! turns them into the 0/1 flags and floats the feature vector expects.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::features::{FEATURE_NAMES, NUMERIC_FEATURES};

/// Yes/no questions, normalized to 1 for "yes"/"y" and 0 otherwise.
pub const YES_NO_FEATURES: [&str; 9] = [
    "hypertension",
    "cholesterol",
    "physical_activity",
    "heart_disease",
    "smoker",
    "family_history",
    "polyuria",
    "polydipsia",
    "polyphagia",
];

const GENDER: &str = "gender";
const PREGNANCIES: &str = "pregnancies";

/// Error raised when a request field cannot be coerced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Request body must be a JSON object")]
    NotAnObject,

    #[error("could not convert {field} to float: {value}")]
    InvalidFloat { field: &'static str, value: String },

    #[error("invalid literal for integer {field}: {value}")]
    InvalidInteger { field: &'static str, value: String },
}

/// Normalized assessment attributes keyed by feature name.
///
/// Only known features are retained. Absent features stay absent so the
/// assembler can default them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssessmentInput {
    values: BTreeMap<&'static str, f64>,
}

impl AssessmentInput {
    /// Normalize a raw JSON request body.
    ///
    /// # Errors
    /// Returns `InputError` if the body is not an object or a numeric field
    /// cannot be coerced.
    pub fn from_json(raw: &Value) -> Result<Self, InputError> {
        let object = raw.as_object().ok_or(InputError::NotAnObject)?;
        Self::from_map(object)
    }

    /// Normalize an already-parsed JSON object.
    ///
    /// # Errors
    /// Returns `InputError` if a numeric field cannot be coerced.
    pub fn from_map(raw: &Map<String, Value>) -> Result<Self, InputError> {
        let mut values = BTreeMap::new();

        for field in YES_NO_FEATURES {
            if let Some(v) = raw.get(field) {
                values.insert(field, flag(matches_any(v, &["yes", "y"])));
            }
        }

        if let Some(v) = raw.get(GENDER) {
            values.insert(GENDER, flag(matches_any(v, &["male", "m"])));
        }

        // Pregnancies only count for a subject explicitly recorded as female.
        let pregnancies = match (values.get(GENDER), raw.get(PREGNANCIES)) {
            (Some(g), Some(v)) if *g == 0.0 => coerce_integer(PREGNANCIES, v)? as f64,
            _ => 0.0,
        };
        values.insert(PREGNANCIES, pregnancies);

        for field in NUMERIC_FEATURES {
            if let Some(v) = raw.get(field) {
                values.insert(field, coerce_float(field, v)?);
            }
        }

        debug_assert!(values.keys().all(|k| FEATURE_NAMES.contains(k)));
        Ok(Self { values })
    }

    /// Normalized value of a feature, if it was supplied.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Number of features carrying a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Supplied features and their normalized values, by name.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        self.values.iter().map(|(name, value)| (*name, *value))
    }
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

/// Case-insensitive match of a string value against accepted spellings.
///
/// Non-string values never match.
fn matches_any(value: &Value, accepted: &[&str]) -> bool {
    match value {
        Value::String(s) => {
            let lower = s.to_lowercase();
            accepted.iter().any(|a| *a == lower)
        }
        _ => false,
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{s}'"),
        other => other.to_string(),
    }
}

fn coerce_float(field: &'static str, value: &Value) -> Result<f64, InputError> {
    let invalid = || InputError::InvalidFloat {
        field,
        value: describe(value),
    };

    let parsed = match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid)?,
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| invalid())?,
        Value::Bool(b) => flag(*b),
        Value::Null | Value::Array(_) | Value::Object(_) => return Err(invalid()),
    };

    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(invalid())
    }
}

fn coerce_integer(field: &'static str, value: &Value) -> Result<i64, InputError> {
    let invalid = || InputError::InvalidInteger {
        field,
        value: describe(value),
    };

    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            let f = n.as_f64().filter(|f| f.is_finite()).ok_or_else(invalid)?;
            let truncated = f.trunc();
            if truncated.abs() >= i64::MAX as f64 {
                return Err(invalid());
            }
            Ok(truncated as i64)
        }
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| invalid()),
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::Null | Value::Array(_) | Value::Object(_) => Err(invalid()),
    }
}
