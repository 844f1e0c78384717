//! Signed manifest verification for artifact bundles.
//!
//! A bundle is signed when its directory carries `manifest.json` (SHA-256
//! digests of the bound files) and `model.sig` (Ed25519 signature over the
//! exact manifest bytes).

use std::collections::BTreeMap;
use std::path::{Component, Path};

use base64::Engine;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{ArtifactError, ENSEMBLE_FILE, SCALER_FILE};

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "model.sig";

/// Allowed clock skew for `created_at`, in seconds.
const MAX_FUTURE_SKEW_SECS: i64 = 300;

/// Signed manifest layout, shared with the `sign_artifacts` binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedManifest {
    pub version: u32,
    /// Monotonic serial, usually a CI build number.
    pub serial: u64,
    /// Unix seconds at signing time.
    pub created_at: i64,
    /// 16 random bytes, base64.
    pub nonce_b64: String,
    /// File name to lowercase SHA-256 hex digest.
    pub files: BTreeMap<String, String>,
}

/// How much the loader trusts what it finds on disk.
#[derive(Debug, Clone, Default)]
pub struct TrustPolicy {
    pub verifying_key: Option<VerifyingKey>,
    /// Honored only in debug builds.
    pub allow_unsigned: bool,
    pub max_age_secs: Option<i64>,
}

impl TrustPolicy {
    /// Whether unsigned bundles may be loaded in this build.
    #[must_use]
    pub fn unsigned_permitted(&self) -> bool {
        cfg!(debug_assertions) && self.allow_unsigned
    }
}

/// Parse a base64-encoded 32-byte Ed25519 verifying key.
///
/// # Errors
/// Returns `ArtifactError::Signature` if the key is malformed.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("Invalid public key base64".into()))?;
    let key: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("Invalid public key length (expected 32 bytes)".into()))?;
    VerifyingKey::from_bytes(&key)
        .map_err(|_| ArtifactError::Signature("Invalid verifying key".into()))
}

#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Verify the bundle in `dir` against `policy`.
///
/// `loaded` holds the bytes the caller is about to parse; each must be bound
/// by the manifest and match its digest. Returns `Ok(None)` for a permitted
/// unsigned bundle.
///
/// # Errors
/// Returns `ArtifactError` on any missing, malformed or mismatching piece.
pub fn verify_bundle(
    dir: &Path,
    policy: &TrustPolicy,
    loaded: &[(&str, &[u8])],
) -> Result<Option<SignedManifest>, ArtifactError> {
    let sig_path = dir.join(SIGNATURE_FILE);
    let manifest_path = dir.join(MANIFEST_FILE);

    if !sig_path.exists() || !manifest_path.exists() {
        if policy.unsigned_permitted() {
            tracing::warn!(
                "Loading UNSIGNED artifacts from {:?}; only allowed in debug builds",
                dir
            );
            return Ok(None);
        }
        return Err(ArtifactError::Signature(format!(
            "{MANIFEST_FILE} and {SIGNATURE_FILE} are required in {dir:?}"
        )));
    }

    let verifying_key = policy
        .verifying_key
        .as_ref()
        .ok_or_else(|| ArtifactError::Signature("No verifying key configured".into()))?;

    let sig_bytes = std::fs::read(&sig_path)
        .map_err(|e| ArtifactError::Io(format!("Failed to read signature: {e}")))?;
    let sig_array: [u8; 64] = sig_bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("Invalid signature length (expected 64 bytes)".into()))?;
    let signature = Signature::from_bytes(&sig_array);

    let manifest_bytes = std::fs::read(&manifest_path)
        .map_err(|e| ArtifactError::Io(format!("Failed to read manifest: {e}")))?;
    verifying_key
        .verify(&manifest_bytes, &signature)
        .map_err(|_| ArtifactError::Signature("Invalid artifact signature".into()))?;

    let manifest: SignedManifest = serde_json::from_slice(&manifest_bytes)
        .map_err(|e| ArtifactError::Manifest(format!("Invalid {MANIFEST_FILE} format: {e}")))?;
    check_manifest(&manifest, policy, unix_now())?;

    for (name, bytes) in loaded {
        let expected = manifest.files.get(*name).ok_or_else(|| {
            ArtifactError::Manifest(format!("{MANIFEST_FILE} does not bind {name}"))
        })?;
        if !constant_time_eq_str(&sha256_hex(bytes), expected) {
            return Err(ArtifactError::Manifest(format!("File hash mismatch for {name}")));
        }
    }

    // Extra bound files must exist and match too; a bundle is all or nothing.
    for (name, expected) in &manifest.files {
        if loaded.iter().any(|(n, _)| n == name) {
            continue;
        }
        let bytes = std::fs::read(dir.join(name)).map_err(|e| {
            ArtifactError::Manifest(format!(
                "Manifest references missing/unreadable file {name}: {e}"
            ))
        })?;
        if !constant_time_eq_str(&sha256_hex(&bytes), expected) {
            return Err(ArtifactError::Manifest(format!("File hash mismatch for {name}")));
        }
    }

    tracing::info!(
        serial = manifest.serial,
        created_at = manifest.created_at,
        files = manifest.files.len(),
        "Artifact signature and hashes verified"
    );
    Ok(Some(manifest))
}

fn check_manifest(
    manifest: &SignedManifest,
    policy: &TrustPolicy,
    now: i64,
) -> Result<(), ArtifactError> {
    if manifest.version != 1 {
        return Err(ArtifactError::Manifest(format!(
            "Unsupported manifest version: {}",
            manifest.version
        )));
    }
    validate_nonce_b64(&manifest.nonce_b64)?;
    if manifest.files.is_empty() {
        return Err(ArtifactError::Manifest(format!("{MANIFEST_FILE} contains no files")));
    }
    if let Some(name) = manifest.files.keys().find(|name| !is_plain_file_name(name)) {
        return Err(ArtifactError::Manifest(format!(
            "{MANIFEST_FILE} binds {name:?} outside the model directory"
        )));
    }
    if manifest.created_at > now + MAX_FUTURE_SKEW_SECS {
        return Err(ArtifactError::Manifest("manifest created_at is in the future".into()));
    }
    if let Some(max_age) = policy.max_age_secs {
        if max_age > 0 && now.saturating_sub(manifest.created_at) > max_age {
            return Err(ArtifactError::Manifest(
                "manifest is older than allowed max age".into(),
            ));
        }
    }
    Ok(())
}

/// Hash the artifacts in `dir`, then write `manifest.json` and `model.sig`.
///
/// `serial` defaults to the signing time.
///
/// # Errors
/// Returns `ArtifactError` if an artifact cannot be read, the nonce is
/// malformed, or the output cannot be written.
pub fn sign_bundle(
    dir: &Path,
    signing_key: &SigningKey,
    serial: Option<u64>,
    nonce_b64: String,
) -> Result<SignedManifest, ArtifactError> {
    validate_nonce_b64(&nonce_b64)?;

    let mut files = BTreeMap::new();
    for name in [SCALER_FILE, ENSEMBLE_FILE] {
        let path = dir.join(name);
        let bytes = std::fs::read(&path)
            .map_err(|e| ArtifactError::Io(format!("Failed to read {path:?}: {e}")))?;
        files.insert(name.to_string(), sha256_hex(&bytes));
    }

    let created_at = unix_now();
    let manifest = SignedManifest {
        version: 1,
        serial: serial.unwrap_or_else(|| u64::try_from(created_at).unwrap_or(1)),
        created_at,
        nonce_b64,
        files,
    };
    let manifest_bytes = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| ArtifactError::Format(format!("Failed to serialize manifest: {e}")))?;
    let signature: Signature = signing_key.sign(&manifest_bytes);

    let manifest_path = dir.join(MANIFEST_FILE);
    std::fs::write(&manifest_path, &manifest_bytes)
        .map_err(|e| ArtifactError::Io(format!("Failed to write {manifest_path:?}: {e}")))?;
    let sig_path = dir.join(SIGNATURE_FILE);
    std::fs::write(&sig_path, signature.to_bytes())
        .map_err(|e| ArtifactError::Io(format!("Failed to write {sig_path:?}: {e}")))?;

    Ok(manifest)
}

/// Check that a nonce decodes to exactly 16 bytes.
///
/// # Errors
/// Returns `ArtifactError::Manifest` otherwise.
pub fn validate_nonce_b64(nonce_b64: &str) -> Result<(), ArtifactError> {
    let raw = base64::engine::general_purpose::STANDARD
        .decode(nonce_b64.trim())
        .map_err(|e| ArtifactError::Manifest(format!("Invalid nonce base64: {e}")))?;
    if raw.len() != 16 {
        return Err(ArtifactError::Manifest(
            "nonce must decode to exactly 16 bytes".into(),
        ));
    }
    Ok(())
}

// Bound files must sit directly in the model directory.
fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(components.next(), Some(Component::Normal(_)))
        && components.next().is_none()
        && !name.contains(['/', '\\'])
}

// Constant-time compare for hex digests.
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0u8, |diff, (x, y)| diff | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(created_at: i64) -> SignedManifest {
        SignedManifest {
            version: 1,
            serial: 7,
            created_at,
            nonce_b64: base64::engine::general_purpose::STANDARD.encode([0u8; 16]),
            files: BTreeMap::from([("scaler.json".to_string(), sha256_hex(b"{}"))]),
        }
    }

    #[test]
    fn test_check_manifest_accepts_recent() {
        let now = 1_700_000_000;
        assert!(check_manifest(&manifest(now - 10), &TrustPolicy::default(), now).is_ok());
        // Within skew allowance.
        assert!(check_manifest(&manifest(now + 60), &TrustPolicy::default(), now).is_ok());
    }

    #[test]
    fn test_check_manifest_rejects_future_and_stale() {
        let now = 1_700_000_000;
        assert!(check_manifest(&manifest(now + 3600), &TrustPolicy::default(), now).is_err());

        let policy = TrustPolicy {
            max_age_secs: Some(60),
            ..TrustPolicy::default()
        };
        let err = check_manifest(&manifest(now - 120), &policy, now).expect_err("stale");
        assert!(err.to_string().contains("max age"));
    }

    #[test]
    fn test_check_manifest_rejects_bad_fields() {
        let now = 1_700_000_000;
        let mut m = manifest(now);
        m.version = 2;
        assert!(check_manifest(&m, &TrustPolicy::default(), now).is_err());

        let mut m = manifest(now);
        m.nonce_b64 = "AAAA".into();
        assert!(check_manifest(&m, &TrustPolicy::default(), now).is_err());

        let mut m = manifest(now);
        m.files.clear();
        assert!(check_manifest(&m, &TrustPolicy::default(), now).is_err());
    }

    #[test]
    fn test_check_manifest_rejects_paths_outside_dir() {
        let now = 1_700_000_000;
        for name in ["../scaler.json", "/etc/passwd", "sub/ensemble.json", "..", "a\\b", ""] {
            let mut m = manifest(now);
            m.files.insert(name.to_string(), sha256_hex(b"{}"));
            let err = check_manifest(&m, &TrustPolicy::default(), now).expect_err(name);
            assert!(err.to_string().contains("outside the model directory"), "{name}");
        }
        assert!(is_plain_file_name("calibration.json"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq_str("abcd", "abcd"));
        assert!(!constant_time_eq_str("abcd", "abce"));
        assert!(!constant_time_eq_str("abc", "abcd"));
    }

    #[test]
    fn test_verifying_key_from_b64_rejects_garbage() {
        assert!(verifying_key_from_b64("not base64!").is_err());
        let short = base64::engine::general_purpose::STANDARD.encode([1u8; 8]);
        assert!(verifying_key_from_b64(&short).is_err());
    }
}
