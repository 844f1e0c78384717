//! Model ports: Traits for the pre-trained scaler and classifier.
//!
//! Both artifacts are produced by the training pipeline and treated as
//! opaque. These traits keep the scoring pipeline independent of the
//! artifact format.

/// Errors raised while evaluating a loaded artifact.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Feature count mismatch: got {got}, expected {expected}")]
    ShapeMismatch { got: usize, expected: usize },

    #[error("Classifier returned an invalid probability: {0}")]
    InvalidProbability(f64),

    #[error("Model evaluation failed: {0}")]
    Evaluation(String),
}

/// A previously fit numeric transform.
///
/// Implementations must be pure: the same input always yields the same
/// output, and no state is retained between calls.
pub trait FeatureScaler: Send + Sync {
    /// Names of the columns this scaler was fit on, in order.
    fn feature_names(&self) -> &[String];

    /// Standardize raw values given in [`FeatureScaler::feature_names`] order.
    ///
    /// # Errors
    /// Returns `ModelError::ShapeMismatch` if `raw` has the wrong length.
    fn transform(&self, raw: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// A previously fit binary probabilistic classifier.
pub trait RiskClassifier: Send + Sync {
    /// Names of the columns this classifier was fit on, in order.
    fn feature_names(&self) -> &[String];

    /// Probability of the positive class for one feature vector.
    ///
    /// # Errors
    /// Returns `ModelError` if the vector has the wrong length or the model
    /// cannot be evaluated.
    fn predict_proba(&self, features: &[f64]) -> Result<f64, ModelError>;
}
