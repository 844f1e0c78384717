//! Feature schema and the fixed-order feature vector.
//!
//! The column order below is the order the scaler and ensemble were fit
//! with. Artifacts carry their own copy of the names and are rejected at
//! load time if they disagree.

use serde::Serialize;

use super::assessment::AssessmentInput;

/// Number of features the ensemble consumes.
pub const FEATURE_COUNT: usize = 16;

/// Feature names in model column order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "gender",
    "age",
    "bmi",
    "hypertension",
    "cholesterol",
    "physical_activity",
    "heart_disease",
    "smoker",
    "blood_glucose_level",
    "insulin",
    "skin_thickness",
    "family_history",
    "pregnancies",
    "polyuria",
    "polydipsia",
    "polyphagia",
];

/// Continuous features that go through the scaler, in scaler column order.
pub const NUMERIC_FEATURES: [&str; 5] = [
    "age",
    "bmi",
    "blood_glucose_level",
    "insulin",
    "skin_thickness",
];

/// Position of a feature in [`FEATURE_NAMES`].
#[must_use]
pub fn feature_index(name: &str) -> Option<usize> {
    FEATURE_NAMES.iter().position(|n| *n == name)
}

/// Fixed-order, fixed-length numeric encoding of one assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Assemble the vector from normalized input, filling absent features with zero.
    #[must_use]
    pub fn assemble(input: &AssessmentInput) -> Self {
        let mut values = [0.0; FEATURE_COUNT];
        for (slot, name) in values.iter_mut().zip(FEATURE_NAMES.iter()) {
            *slot = input.get(name).unwrap_or(0.0);
        }
        Self { values }
    }

    /// Build a vector directly from column values.
    #[must_use]
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Value of a named feature.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<f64> {
        feature_index(name).map(|i| self.values[i])
    }

    /// Numeric block in [`NUMERIC_FEATURES`] order.
    #[must_use]
    pub fn numeric_values(&self) -> [f64; NUMERIC_FEATURES.len()] {
        let mut out = [0.0; NUMERIC_FEATURES.len()];
        for (slot, idx) in out.iter_mut().zip(numeric_indices()) {
            *slot = self.values[idx];
        }
        out
    }

    /// Overwrite the numeric block in place with already-scaled values.
    ///
    /// # Errors
    /// Returns the received length if it does not match the numeric block.
    pub fn replace_numeric(&mut self, scaled: &[f64]) -> Result<(), usize> {
        if scaled.len() != NUMERIC_FEATURES.len() {
            return Err(scaled.len());
        }
        for (value, idx) in scaled.iter().zip(numeric_indices()) {
            self.values[idx] = *value;
        }
        Ok(())
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn numeric_indices() -> impl Iterator<Item = usize> {
    NUMERIC_FEATURES
        .iter()
        .filter_map(|name| feature_index(name))
}
