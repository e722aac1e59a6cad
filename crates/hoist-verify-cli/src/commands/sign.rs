//! `hoist-verify sign` - Write a detached signature for a file.

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::path::PathBuf;

use hoist_verify::SIGNATURE_SUFFIX;

#[derive(Args, Debug)]
pub struct SignArgs {
    /// File to sign (artifact or manifest)
    pub file: PathBuf,

    /// Private key file (PKCS#8 PEM)
    #[arg(long, short)]
    pub key: PathBuf,

    /// Output file (default: <FILE>.sig)
    #[arg(long, short)]
    pub out: Option<PathBuf>,

    /// Write an ASCII-armored signature instead of raw bytes
    #[arg(long)]
    pub armor: bool,
}

pub fn cmd_sign(args: SignArgs) -> i32 {
    match run_sign(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:#}");
            super::USAGE_ERROR
        }
    }
}

fn run_sign(args: SignArgs) -> Result<()> {
    let signing_key = super::load_private_key_pem(&args.key)?;

    let payload = fs::read(&args.file)
        .with_context(|| format!("failed to read file: {}", args.file.display()))?;

    let out = args
        .out
        .unwrap_or_else(|| super::with_suffix(&args.file, SIGNATURE_SUFFIX));
    super::write_signature(&signing_key, &payload, &out, args.armor)?;

    tracing::info!(file = %args.file.display(), signature = %out.display(), "signed");
    println!("{}", out.display());
    Ok(())
}
