//! Standard scaler artifact.
//!
//! Mirrors a fitted scikit-learn `StandardScaler` exported to JSON:
//!
//! ```json
//! { "feature_names": ["age", "bmi"], "mean": [41.2, 27.9], "scale": [15.1, 6.3] }
//! ```

use serde::{Deserialize, Serialize};

use super::artifacts::ArtifactError;
use crate::ports::{FeatureScaler, ModelError};

/// Zero-mean, unit-variance transform fit during training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    feature_names: Vec<String>,
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl StandardScaler {
    /// Build a scaler from fitted parameters.
    ///
    /// # Errors
    /// Returns `ArtifactError::Schema` if the parameter lengths disagree or
    /// any parameter is non-finite or negative.
    pub fn new(
        feature_names: Vec<String>,
        mean: Vec<f64>,
        scale: Vec<f64>,
    ) -> Result<Self, ArtifactError> {
        let scaler = Self {
            feature_names,
            mean,
            scale,
        };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Parse and validate an exported scaler.
    ///
    /// # Errors
    /// Returns `ArtifactError` if the JSON is malformed or inconsistent.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let scaler: Self = serde_json::from_slice(bytes)
            .map_err(|e| ArtifactError::Format(format!("scaler: {e}")))?;
        scaler.validate()?;
        Ok(scaler)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        let n = self.feature_names.len();
        if n == 0 {
            return Err(ArtifactError::Schema("scaler has no features".into()));
        }
        if self.mean.len() != n || self.scale.len() != n {
            return Err(ArtifactError::Schema(format!(
                "scaler parameter lengths (mean={}, scale={}) do not match {n} features",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().any(|m| !m.is_finite()) {
            return Err(ArtifactError::Schema("scaler mean must be finite".into()));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(ArtifactError::Schema(
                "scaler scale must be finite and non-negative".into(),
            ));
        }
        Ok(())
    }
}

impl FeatureScaler for StandardScaler {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn transform(&self, raw: &[f64]) -> Result<Vec<f64>, ModelError> {
        if raw.len() != self.feature_names.len() {
            return Err(ModelError::ShapeMismatch {
                got: raw.len(),
                expected: self.feature_names.len(),
            });
        }

        Ok(raw
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(x, (mean, scale))| {
                // Constant columns are exported with scale 0; treat as 1.
                let scale = if *scale == 0.0 { 1.0 } else { *scale };
                (x - mean) / scale
            })
            .collect())
    }
}
