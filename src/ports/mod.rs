//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the scoring pipeline and the opaque model artifacts.

mod model;

pub use model::{FeatureScaler, ModelError, RiskClassifier};
