//! # Glucorisk
//!
//! Diabetes risk scoring service over pre-trained artifacts.
//!
//! This crate provides:
//! - Normalization of loosely typed assessment requests
//! - Scaling and soft-voting ensemble scoring with signed, read-only artifacts
//! - Mapping of probabilities to LOW / MEDIUM / HIGH risk tiers
//! - An axum HTTP surface (`GET /`, `POST /predict`, `GET /health`)
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (assessment input, feature vector, risk tiers)
//! - `ports`: Trait definitions for the scaler and classifier artifacts
//! - `adapters`: Concrete artifact formats, bundle verification, log sanitizing
//! - `application`: The scoring pipeline
//! - `http`: Router and handlers
//! - `config`: Environment-driven runtime configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod http;
pub mod ports;

pub use domain::{AssessmentInput, FeatureVector, RiskAssessment, RiskLevel};

/// Result type for Glucorisk operations
pub type Result<T> = std::result::Result<T, GlucoriskError>;

/// Main error type for Glucorisk
#[derive(Debug, thiserror::Error)]
pub enum GlucoriskError {
    /// Rendered verbatim so clients see which field was rejected.
    #[error("{0}")]
    Input(#[from] domain::InputError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("Model error: {0}")]
    Model(#[from] ports::ModelError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}
