//! Adapters layer: Concrete implementations of ports.
//!
//! - `artifacts`: model directory loading and signed manifest verification
//! - `scaler`: standard scaler artifact (`FeatureScaler`)
//! - `ensemble`: soft-voting ensemble artifact (`RiskClassifier`)
//! - `sanitize`: PII filtering for logs

pub mod artifacts;
pub mod ensemble;
pub mod sanitize;
pub mod scaler;

pub use artifacts::{ArtifactBundle, ArtifactError, TrustPolicy};
pub use ensemble::{DecisionTree, Estimator, SoftVotingEnsemble, TreeNode};
pub use scaler::StandardScaler;
