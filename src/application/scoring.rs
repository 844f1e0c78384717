//! Scoring service: Orchestrates one risk assessment.
//!
//! This service coordinates:
//! - Input normalization
//! - Feature vector assembly
//! - Scaling of the numeric block
//! - Classification
//! - Risk tier mapping

use std::sync::Arc;

use serde_json::Value;

use crate::domain::{
    AssessmentInput, FeatureVector, RiskAssessment, FEATURE_NAMES, NUMERIC_FEATURES,
};
use crate::ports::{FeatureScaler, ModelError, RiskClassifier};
use crate::GlucoriskError;

/// Stateless scoring pipeline over shared, read-only artifacts.
pub struct ScoringService<S, C>
where
    S: FeatureScaler,
    C: RiskClassifier,
{
    scaler: Arc<S>,
    classifier: Arc<C>,
}

impl<S, C> Clone for ScoringService<S, C>
where
    S: FeatureScaler,
    C: RiskClassifier,
{
    fn clone(&self) -> Self {
        Self {
            scaler: Arc::clone(&self.scaler),
            classifier: Arc::clone(&self.classifier),
        }
    }
}

impl<S, C> ScoringService<S, C>
where
    S: FeatureScaler,
    C: RiskClassifier,
{
    /// Create a new scoring service.
    ///
    /// # Errors
    /// Returns `GlucoriskError::Config` if either artifact was fit on a
    /// different column order than the feature schema.
    pub fn new(scaler: Arc<S>, classifier: Arc<C>) -> Result<Self, GlucoriskError> {
        check_columns("scaler", scaler.feature_names(), &NUMERIC_FEATURES)?;
        check_columns("classifier", classifier.feature_names(), &FEATURE_NAMES)?;
        Ok(Self { scaler, classifier })
    }

    /// Run the full pipeline on a raw request body.
    ///
    /// # Errors
    /// Returns error if normalization or scoring fails.
    pub fn assess_json(&self, body: &Value) -> Result<RiskAssessment, GlucoriskError> {
        let input = AssessmentInput::from_json(body)?;
        self.assess(&input)
    }

    /// Score normalized input and map it to a risk tier.
    ///
    /// # Errors
    /// Returns error if an artifact rejects the vector.
    pub fn assess(&self, input: &AssessmentInput) -> Result<RiskAssessment, GlucoriskError> {
        let vector = FeatureVector::assemble(input);
        // Values are redacted by the sanitizing writer before any sink.
        tracing::debug!(
            "Assembled feature vector ({} supplied, {} total): {}",
            input.len(),
            vector.len(),
            field_pairs(input)
        );

        let probability = self.probability(vector)?;
        let assessment = RiskAssessment::from_probability(probability);

        tracing::info!(
            risk_level = %assessment.risk_level,
            risk_percent = assessment.risk_percent,
            "Assessment complete"
        );
        Ok(assessment)
    }

    /// Positive-class probability for an assembled, unscaled vector.
    ///
    /// # Errors
    /// Returns `GlucoriskError::Model` on shape mismatch or an invalid
    /// classifier output.
    pub fn probability(&self, mut vector: FeatureVector) -> Result<f64, GlucoriskError> {
        let scaled = self.scaler.transform(&vector.numeric_values())?;
        vector.replace_numeric(&scaled).map_err(|got| ModelError::ShapeMismatch {
            got,
            expected: NUMERIC_FEATURES.len(),
        })?;

        let p = self.classifier.predict_proba(vector.as_slice())?;
        if !(0.0..=1.0).contains(&p) {
            return Err(ModelError::InvalidProbability(p).into());
        }
        Ok(p)
    }
}

/// `field=value` pairs for debug logging.
fn field_pairs(input: &AssessmentInput) -> String {
    input
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn check_columns(
    artifact: &str,
    actual: &[String],
    expected: &[&str],
) -> Result<(), GlucoriskError> {
    if actual.len() == expected.len() && actual.iter().zip(expected).all(|(a, e)| a == e) {
        return Ok(());
    }
    Err(GlucoriskError::Config(format!(
        "{artifact} columns {actual:?} do not match feature schema {expected:?}"
    )))
}
