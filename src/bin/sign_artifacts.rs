//! Artifact signing utility.
//!
//! Writes a signed manifest (`manifest.json`) and Ed25519 signature
//! (`model.sig`) binding `scaler.json` and `ensemble.json` in a model
//! directory.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin sign_artifacts -- <model_dir> [--serial <n>] [--nonce-b64 <b64>]
//! ```
//!
//! The base64 seed is read from `GLUCORISK_MODEL_SIGNING_KEY_B64_FILE`, the
//! Docker secret `/run/secrets/glucorisk_model_signing_key_b64`, or in debug
//! builds only `GLUCORISK_MODEL_SIGNING_KEY_B64`. Seed material is zeroized
//! after use.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use glucorisk::adapters::artifacts::signature::{sign_bundle, MANIFEST_FILE, SIGNATURE_FILE};

const KEY_FILE_ENV: &str = "GLUCORISK_MODEL_SIGNING_KEY_B64_FILE";
const KEY_INLINE_ENV: &str = "GLUCORISK_MODEL_SIGNING_KEY_B64";
const DOCKER_SECRET_PATH: &str = "/run/secrets/glucorisk_model_signing_key_b64";

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

struct Args {
    model_dir: PathBuf,
    serial: Option<u64>,
    nonce_b64: Option<String>,
}

fn non_empty_secret(raw: &str) -> Result<Zeroizing<String>> {
    let secret = Zeroizing::new(raw.trim_end_matches(['\n', '\r']).to_string());
    if secret.is_empty() {
        bail!("Empty signing key");
    }
    Ok(secret)
}

fn read_signing_seed_b64() -> Result<Zeroizing<String>> {
    if let Ok(path) = env::var(KEY_FILE_ENV) {
        let content = Zeroizing::new(
            fs::read_to_string(path.trim()).context("Failed reading signing key file")?,
        );
        return non_empty_secret(&content);
    }

    if Path::new(DOCKER_SECRET_PATH).exists() {
        let content = Zeroizing::new(
            fs::read_to_string(DOCKER_SECRET_PATH).context("Failed reading docker secret")?,
        );
        return non_empty_secret(&content);
    }

    if cfg!(debug_assertions) {
        if let Ok(v) = env::var(KEY_INLINE_ENV) {
            return non_empty_secret(&Zeroizing::new(v));
        }
    }

    bail!(
        "Missing signing key. Provide {KEY_FILE_ENV} or {DOCKER_SECRET_PATH} \
         ({KEY_INLINE_ENV} is accepted in debug builds only)."
    )
}

fn read_signing_seed() -> Result<Seed> {
    let b64 = read_signing_seed_b64()?;
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(b64.trim())
            .context("Invalid base64 in signing key")?,
    );
    if raw.len() != 32 {
        bail!(
            "Signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }

    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

fn usage() -> anyhow::Error {
    anyhow::anyhow!("Usage: sign_artifacts <model_dir> [--serial <u64>] [--nonce-b64 <b64_16_bytes>]")
}

fn parse_args() -> Result<Args> {
    let mut args = env::args().skip(1);
    let mut model_dir = None;
    let mut serial = None;
    let mut nonce_b64 = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--serial" => {
                let v = args.next().ok_or_else(usage)?;
                serial = Some(
                    v.trim()
                        .parse::<u64>()
                        .context("--serial must be a u64")?,
                );
            }
            "--nonce-b64" => nonce_b64 = Some(args.next().ok_or_else(usage)?),
            "-h" | "--help" => return Err(usage()),
            _ if model_dir.is_none() => model_dir = Some(PathBuf::from(arg)),
            _ => return Err(usage()),
        }
    }

    Ok(Args {
        model_dir: model_dir.ok_or_else(usage)?,
        serial,
        nonce_b64,
    })
}

fn make_nonce_b64() -> String {
    let mut nonce = [0u8; 16];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    general_purpose::STANDARD.encode(nonce)
}

fn main() -> Result<()> {
    let args = parse_args()?;
    let model_dir = args.model_dir;
    if !model_dir.is_dir() {
        bail!("{model_dir:?} is not a directory");
    }

    let nonce_b64 = args.nonce_b64.unwrap_or_else(make_nonce_b64);

    let seed = read_signing_seed()?;
    let signing_key = SigningKey::from_bytes(&seed.0);
    drop(seed);

    let manifest = sign_bundle(&model_dir, &signing_key, args.serial, nonce_b64)?;

    println!(
        "Signed manifest: {:?} (serial {})",
        model_dir.join(MANIFEST_FILE),
        manifest.serial
    );
    println!("Wrote signature: {:?}", model_dir.join(SIGNATURE_FILE));
    println!(
        "GLUCORISK_MODEL_SIGNING_PUBKEY_B64={}",
        general_purpose::STANDARD.encode(signing_key.verifying_key().as_bytes())
    );

    Ok(())
}
