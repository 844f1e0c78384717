//! Runtime configuration from environment variables.
//!
//! | variable | default |
//! |---|---|
//! | `GLUCORISK_BIND_ADDR` | `127.0.0.1:5000` |
//! | `GLUCORISK_MODEL_DIR` | `models` |
//! | `GLUCORISK_ALLOW_UNSIGNED_MODELS` | `false` (debug builds only) |
//! | `GLUCORISK_MODEL_SIGNING_PUBKEY_B64_FILE` | unset |
//! | `GLUCORISK_MODEL_SIGNING_PUBKEY_B64` | unset |
//! | `GLUCORISK_MODEL_MAX_AGE_SECS` | unset |
//! | `GLUCORISK_LOG_MODE` | `stdout` (`file` to write `GLUCORISK_LOG_FILE`) |

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::adapters::artifacts::signature::verifying_key_from_b64;
use crate::adapters::TrustPolicy;
use crate::GlucoriskError;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
const DEFAULT_MODEL_DIR: &str = "models";
const DEFAULT_LOG_FILE: &str = "glucorisk.log";
const DOCKER_SECRET_PUBKEY: &str = "/run/secrets/glucorisk_model_signing_pubkey_b64";

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    File(PathBuf),
}

/// Fully resolved service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub model_dir: PathBuf,
    pub trust: TrustPolicy,
    pub log_target: LogTarget,
}

impl ServiceConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns `GlucoriskError::Config` for unparseable values.
    pub fn from_env() -> Result<Self, GlucoriskError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns `GlucoriskError::Config` for unparseable values.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GlucoriskError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup("GLUCORISK_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind_raw.trim().parse::<SocketAddr>().map_err(|e| {
            GlucoriskError::Config(format!("GLUCORISK_BIND_ADDR={bind_raw:?}: {e}"))
        })?;

        let model_dir = PathBuf::from(
            lookup("GLUCORISK_MODEL_DIR").unwrap_or_else(|| DEFAULT_MODEL_DIR.into()),
        );

        let allow_unsigned = lookup("GLUCORISK_ALLOW_UNSIGNED_MODELS")
            .map(|v| parse_bool(&v))
            .unwrap_or(false);

        let max_age_secs = match lookup("GLUCORISK_MODEL_MAX_AGE_SECS") {
            Some(v) => Some(v.trim().parse::<i64>().map_err(|_| {
                GlucoriskError::Config(format!("GLUCORISK_MODEL_MAX_AGE_SECS={v:?} is not an integer"))
            })?),
            None => None,
        };

        let verifying_key = match resolve_pubkey_b64(&lookup)? {
            Some(b64) => Some(verifying_key_from_b64(&b64)?),
            None => None,
        };

        let log_target = match lookup("GLUCORISK_LOG_MODE").as_deref() {
            Some("file") => LogTarget::File(PathBuf::from(
                lookup("GLUCORISK_LOG_FILE").unwrap_or_else(|| DEFAULT_LOG_FILE.into()),
            )),
            Some("stdout") | None => LogTarget::Stdout,
            Some(other) => {
                return Err(GlucoriskError::Config(format!(
                    "GLUCORISK_LOG_MODE must be stdout or file, got {other:?}"
                )))
            }
        };

        Ok(Self {
            bind_addr,
            model_dir,
            trust: TrustPolicy {
                verifying_key,
                allow_unsigned,
                max_age_secs,
            },
            log_target,
        })
    }
}

/// Verifying key precedence: key file, inline env var, Docker secret.
fn resolve_pubkey_b64<F>(lookup: &F) -> Result<Option<String>, GlucoriskError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("GLUCORISK_MODEL_SIGNING_PUBKEY_B64_FILE") {
        let b64 = std::fs::read_to_string(path.trim()).map_err(|e| {
            GlucoriskError::Config(format!("Failed reading verifying key file {path:?}: {e}"))
        })?;
        return Ok(Some(b64));
    }
    if let Some(b64) = lookup("GLUCORISK_MODEL_SIGNING_PUBKEY_B64") {
        return Ok(Some(b64));
    }
    if Path::new(DOCKER_SECRET_PUBKEY).exists() {
        let b64 = std::fs::read_to_string(DOCKER_SECRET_PUBKEY).map_err(|e| {
            GlucoriskError::Config(format!("Failed reading docker verifying key secret: {e}"))
        })?;
        return Ok(Some(b64));
    }
    Ok(None)
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_lookup(lookup_from(&[])).expect("defaults");
        assert_eq!(config.bind_addr, "127.0.0.1:5000".parse().expect("addr"));
        assert_eq!(config.model_dir, PathBuf::from("models"));
        assert!(!config.trust.allow_unsigned);
        assert!(config.trust.max_age_secs.is_none());
        assert_eq!(config.log_target, LogTarget::Stdout);
    }

    #[test]
    fn test_overrides() {
        let key = base64::engine::general_purpose::STANDARD.encode(
            ed25519_dalek::SigningKey::from_bytes(&[3u8; 32])
                .verifying_key()
                .to_bytes(),
        );
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("GLUCORISK_BIND_ADDR", "0.0.0.0:8080"),
            ("GLUCORISK_MODEL_DIR", "/srv/models"),
            ("GLUCORISK_ALLOW_UNSIGNED_MODELS", "true"),
            ("GLUCORISK_MODEL_MAX_AGE_SECS", "86400"),
            ("GLUCORISK_MODEL_SIGNING_PUBKEY_B64", key.as_str()),
            ("GLUCORISK_LOG_MODE", "file"),
            ("GLUCORISK_LOG_FILE", "/var/log/glucorisk.log"),
        ]))
        .expect("config");

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.model_dir, PathBuf::from("/srv/models"));
        assert!(config.trust.allow_unsigned);
        assert_eq!(config.trust.max_age_secs, Some(86400));
        assert!(config.trust.verifying_key.is_some());
        assert_eq!(
            config.log_target,
            LogTarget::File(PathBuf::from("/var/log/glucorisk.log"))
        );
    }

    #[test]
    fn test_invalid_values() {
        for pairs in [
            [("GLUCORISK_BIND_ADDR", "not-an-addr")],
            [("GLUCORISK_MODEL_MAX_AGE_SECS", "soon")],
            [("GLUCORISK_LOG_MODE", "syslog")],
            [("GLUCORISK_MODEL_SIGNING_PUBKEY_B64", "@@@")],
        ] {
            let result = ServiceConfig::from_lookup(lookup_from(&pairs));
            assert!(result.is_err(), "{pairs:?} should be rejected");
        }
    }
}
