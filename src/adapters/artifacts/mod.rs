//! Artifact bundle loading.
//!
//! A model directory holds the exported scaler and ensemble, optionally
//! bound by a signed manifest:
//!
//! ```text
//! models/
//! ├── scaler.json
//! ├── ensemble.json
//! ├── manifest.json   (signed bundles)
//! └── model.sig       (signed bundles)
//! ```
//!
//! Release builds refuse unsigned bundles. Both artifacts must have been fit
//! with exactly the column order the domain schema defines.

pub mod signature;

use std::path::Path;

use crate::adapters::{SoftVotingEnsemble, StandardScaler};
use crate::domain::{FEATURE_NAMES, NUMERIC_FEATURES};
use crate::ports::{FeatureScaler, RiskClassifier};

pub use signature::{SignedManifest, TrustPolicy};

pub const SCALER_FILE: &str = "scaler.json";
pub const ENSEMBLE_FILE: &str = "ensemble.json";

/// Error type for artifact loading.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ArtifactError {
    #[error("Artifact I/O failed: {0}")]
    Io(String),

    #[error("Malformed artifact: {0}")]
    Format(String),

    #[error("Artifact schema mismatch: {0}")]
    Schema(String),

    #[error("Artifact signature rejected: {0}")]
    Signature(String),

    #[error("Artifact manifest rejected: {0}")]
    Manifest(String),
}

/// Scaler and classifier loaded from one directory.
#[derive(Debug)]
pub struct ArtifactBundle {
    pub scaler: StandardScaler,
    pub ensemble: SoftVotingEnsemble,
    pub manifest: Option<SignedManifest>,
}

impl ArtifactBundle {
    /// Load and verify the bundle in `dir`.
    ///
    /// # Errors
    /// Returns `ArtifactError` if a file is missing or malformed, the
    /// signature or manifest is rejected, or a feature schema disagrees.
    pub fn load(dir: &Path, policy: &TrustPolicy) -> Result<Self, ArtifactError> {
        if !dir.is_dir() {
            return Err(ArtifactError::Io(format!(
                "Model directory {dir:?} does not exist"
            )));
        }

        let scaler_bytes = read_file(&dir.join(SCALER_FILE))?;
        let ensemble_bytes = read_file(&dir.join(ENSEMBLE_FILE))?;

        // Digests are checked against the exact bytes parsed below.
        let manifest = signature::verify_bundle(
            dir,
            policy,
            &[
                (SCALER_FILE, scaler_bytes.as_slice()),
                (ENSEMBLE_FILE, ensemble_bytes.as_slice()),
            ],
        )?;

        let scaler = StandardScaler::from_slice(&scaler_bytes)?;
        expect_columns(SCALER_FILE, scaler.feature_names(), &NUMERIC_FEATURES)?;

        let ensemble = SoftVotingEnsemble::from_slice(&ensemble_bytes)?;
        expect_columns(
            ENSEMBLE_FILE,
            RiskClassifier::feature_names(&ensemble),
            &FEATURE_NAMES,
        )?;

        tracing::info!(
            "Loaded artifacts from {:?} (signed={}, estimators={})",
            dir,
            manifest.is_some(),
            ensemble.estimator_count()
        );

        Ok(Self {
            scaler,
            ensemble,
            manifest,
        })
    }

    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.manifest.is_some()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ArtifactError> {
    std::fs::read(path).map_err(|e| ArtifactError::Io(format!("Failed to read {path:?}: {e}")))
}

fn expect_columns(file: &str, actual: &[String], expected: &[&str]) -> Result<(), ArtifactError> {
    let matches = actual.len() == expected.len()
        && actual.iter().zip(expected).all(|(a, e)| a == e);
    if matches {
        Ok(())
    } else {
        Err(ArtifactError::Schema(format!(
            "{file} was fit on {actual:?}, expected {expected:?}"
        )))
    }
}
