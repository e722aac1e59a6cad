//! `hoist-verify verify` - Verify a downloaded artifact.

use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::path::PathBuf;
use url::Url;

use hoist_verify::{
    ArtifactLocation, Strategy, VerificationPolicy, VerifierConfig, VerifyError,
};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Local copy of the artifact
    pub local: PathBuf,

    /// URL the artifact was published at (file, gs, http, https)
    #[arg(long)]
    pub url: Url,

    /// Keyring (PEM bundle, key directory or YAML); defaults to HOIST_KEYRING_PATH
    #[arg(long)]
    pub keyring: Option<PathBuf>,

    /// none, manifest, build or either; defaults to HOIST_ARTIFACT_VERIFICATION
    #[arg(long)]
    pub policy: Option<VerificationPolicy>,

    /// Quiet mode - only exit code, no output
    #[arg(long, short)]
    pub quiet: bool,
}

pub fn cmd_verify(args: VerifyArgs) -> i32 {
    match run_verify(&args) {
        Ok(()) => 0,
        Err(e) => {
            if !args.quiet {
                eprintln!("error: {e:#}");
            }
            match e.downcast_ref::<VerifyError>() {
                Some(verify_err) => verify_err.exit_code(),
                None => super::USAGE_ERROR,
            }
        }
    }
}

fn run_verify(args: &VerifyArgs) -> Result<()> {
    let mut config = VerifierConfig::from_env()?;
    if let Some(policy) = args.policy {
        config = config.with_policy(policy);
    }
    if let Some(keyring) = &args.keyring {
        config = config.with_keyring_path(keyring);
    }

    let verifier = config.build_verifier()?;

    let mut local = File::open(&args.local).map_err(|e| VerifyError::Io {
        context: format!("failed to open local copy: {}", args.local.display()),
        source: e,
    })?;
    let location = ArtifactLocation::new(args.url.clone());

    let verification = verifier
        .verify_hoist_artifact(&mut local, &location)
        .with_context(|| format!("{} is not trusted", args.local.display()))?;

    if !args.quiet {
        match verification.strategy {
            Strategy::None => println!("verification disabled (policy: none)"),
            strategy => {
                println!("verified: {}", args.local.display());
                println!("  strategy: {strategy:?}");
                if let Some(key_id) = &verification.key_id {
                    println!("  key_id:   {key_id}");
                }
                if let Some(digest) = &verification.digest {
                    println!("  sha256:   {digest}");
                }
            }
        }
    }
    Ok(())
}
