//! Artifact signing and verification commands.

pub mod keygen;
pub mod manifest;
pub mod sign;
pub mod verify;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::{Signer, SigningKey};
use hoist_verify::armor::{self, SIGNATURE_LABEL};

pub const USAGE_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "hoist-verify", version, about = "Sign and verify hoist build artifacts")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate ed25519 keypair for signing
    Keygen(keygen::KeygenArgs),

    /// Write a detached signature for a file
    Sign(sign::SignArgs),

    /// Write a signed build manifest for an artifact
    Manifest(manifest::ManifestArgs),

    /// Verify a downloaded artifact against its published trust metadata
    Verify(verify::VerifyArgs),
}

pub fn dispatch(cli: Cli) -> i32 {
    match cli.cmd {
        Command::Keygen(args) => keygen::cmd_keygen(args),
        Command::Sign(args) => sign::cmd_sign(args),
        Command::Manifest(args) => manifest::cmd_manifest(args),
        Command::Verify(args) => verify::cmd_verify(args),
    }
}

/// Load an Ed25519 signing key from a PKCS#8 PEM file.
pub(crate) fn load_private_key_pem(path: &Path) -> Result<SigningKey> {
    use pkcs8::DecodePrivateKey;

    let pem = fs::read_to_string(path)
        .with_context(|| format!("failed to read private key: {}", path.display()))?;
    SigningKey::from_pkcs8_pem(&pem).map_err(|e| {
        anyhow::anyhow!("failed to parse PKCS#8 private key {}: {}", path.display(), e)
    })
}

/// Sign `payload` and write the signature to `out`, raw or armored.
pub(crate) fn write_signature(
    key: &SigningKey,
    payload: &[u8],
    out: &Path,
    armored: bool,
) -> Result<()> {
    let signature = key.sign(payload).to_bytes();
    let result = if armored {
        fs::write(out, armor::encode(SIGNATURE_LABEL, &signature))
    } else {
        fs::write(out, signature)
    };
    result.with_context(|| format!("failed to write signature: {}", out.display()))
}

/// `<path><suffix>` without touching the existing extension.
pub(crate) fn with_suffix(path: &Path, suffix: &str) -> std::path::PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    os.into()
}
