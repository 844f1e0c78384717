//! Domain layer: Core business types and logic.
//!
//! Pure Rust types with no I/O: request normalization, the feature
//! schema, and risk tiers.

mod assessment;
mod features;
mod risk;

pub use assessment::{AssessmentInput, InputError, YES_NO_FEATURES};
pub use features::{feature_index, FeatureVector, FEATURE_COUNT, FEATURE_NAMES, NUMERIC_FEATURES};
pub use risk::{risk_percent, RiskAssessment, RiskLevel, HIGH_THRESHOLD, MEDIUM_THRESHOLD};
