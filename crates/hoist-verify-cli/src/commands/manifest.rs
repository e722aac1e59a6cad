//! `hoist-verify manifest` - Publish a signed build manifest for an artifact.

use anyhow::{Context, Result};
use clap::Args;
use std::fs::{self, File};
use std::path::PathBuf;

use hoist_verify::{sha256_hex_reader, TrustDocument, MANIFEST_SUFFIX, SIGNATURE_SUFFIX};

#[derive(Args, Debug)]
pub struct ManifestArgs {
    /// Build artifact
    pub artifact: PathBuf,

    /// Private key file (PKCS#8 PEM)
    #[arg(long, short)]
    pub key: PathBuf,

    /// Write an ASCII-armored manifest signature
    #[arg(long)]
    pub armor: bool,
}

pub fn cmd_manifest(args: ManifestArgs) -> i32 {
    match run_manifest(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:#}");
            super::USAGE_ERROR
        }
    }
}

fn run_manifest(args: ManifestArgs) -> Result<()> {
    let signing_key = super::load_private_key_pem(&args.key)?;

    let mut artifact = File::open(&args.artifact)
        .with_context(|| format!("failed to open artifact: {}", args.artifact.display()))?;
    let digest = sha256_hex_reader(&mut artifact)
        .with_context(|| format!("failed to hash artifact: {}", args.artifact.display()))?;

    let manifest = TrustDocument::new(digest.as_str()).to_yaml()?;
    let manifest_path = super::with_suffix(&args.artifact, MANIFEST_SUFFIX);
    fs::write(&manifest_path, &manifest)
        .with_context(|| format!("failed to write manifest: {}", manifest_path.display()))?;

    // The signature covers the manifest bytes exactly as written.
    let signature_path = super::with_suffix(&manifest_path, SIGNATURE_SUFFIX);
    super::write_signature(&signing_key, manifest.as_bytes(), &signature_path, args.armor)?;

    println!("artifact_sha: {digest}");
    println!("  Manifest:  {}", manifest_path.display());
    println!("  Signature: {}", signature_path.display());
    Ok(())
}
