//! `hoist-verify keygen` - Create a build-pipeline signing key and the
//! keyring entry deployments need to trust it.
//!
//! Output directory layout:
//! - `private_key.pem`: PKCS#8, created with mode 0600 on unix
//! - `public_key.pem`: SPKI
//! - `keyring.yaml`: one-entry keyring document referencing `public_key.pem`

use anyhow::{Context, Result};
use clap::Args;
use ed25519_dalek::SigningKey;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use hoist_verify::{compute_key_id, KeyringDocument, KeyringEntry};

const PRIVATE_KEY_FILE: &str = "private_key.pem";
const PUBLIC_KEY_FILE: &str = "public_key.pem";
const KEYRING_FILE: &str = "keyring.yaml";

#[derive(Args, Debug)]
pub struct KeygenArgs {
    /// Output directory for the key files
    #[arg(long, default_value = ".")]
    pub out: PathBuf,

    /// Replace key files already in the output directory
    #[arg(long, short)]
    pub force: bool,

    /// Human-readable name recorded in keyring.yaml
    #[arg(long)]
    pub name: Option<String>,

    /// Also append the public key to this PEM keyring bundle
    #[arg(long, value_name = "KEYRING_PEM")]
    pub append_to: Option<PathBuf>,
}

pub fn cmd_keygen(args: KeygenArgs) -> i32 {
    match run_keygen(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("error: {e:#}");
            super::USAGE_ERROR
        }
    }
}

fn run_keygen(args: KeygenArgs) -> Result<()> {
    use pkcs8::{EncodePrivateKey, EncodePublicKey, LineEnding};

    fs::create_dir_all(&args.out)
        .with_context(|| format!("failed to create directory: {}", args.out.display()))?;

    // Check up front so a refusal never leaves a half-written key set.
    if !args.force {
        for name in [PRIVATE_KEY_FILE, PUBLIC_KEY_FILE, KEYRING_FILE] {
            let path = args.out.join(name);
            if path.exists() {
                anyhow::bail!("{} already exists (use --force to replace)", path.display());
            }
        }
    }

    let signing_key = SigningKey::generate(&mut rand::thread_rng());
    let verifying_key = signing_key.verifying_key();
    let key_id = compute_key_id(&verifying_key)?;

    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode private key as PKCS#8 PEM")?;
    let public_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .context("failed to encode public key as SPKI PEM")?;

    let document = KeyringDocument {
        trusted_keys: vec![KeyringEntry {
            key_id: key_id.clone(),
            public_key: None,
            public_key_path: Some(PathBuf::from(PUBLIC_KEY_FILE)),
            name: args.name.clone(),
        }],
    };

    let private_path = args.out.join(PRIVATE_KEY_FILE);
    write_new(&private_path, private_pem.as_bytes(), 0o600, args.force)?;
    write_new(&args.out.join(PUBLIC_KEY_FILE), public_pem.as_bytes(), 0o644, args.force)?;
    write_new(
        &args.out.join(KEYRING_FILE),
        document.to_yaml()?.as_bytes(),
        0o644,
        args.force,
    )?;

    if let Some(bundle) = &args.append_to {
        append_to_bundle(bundle, &public_pem)?;
    }

    tracing::info!(key_id = %key_id, out = %args.out.display(), "generated signing key");
    println!("{key_id}");
    Ok(())
}

/// Create `path` with `mode` already applied, so the key is never readable
/// by others, even briefly. Existing files are only replaced with `force`.
fn write_new(path: &Path, contents: &[u8], mode: u32, force: bool) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;

    let mut file = options.open(path).with_context(|| {
        if !force && path.exists() {
            format!("{} already exists (use --force to replace)", path.display())
        } else {
            format!("failed to create {}", path.display())
        }
    })?;

    // The mode only applies on creation; tighten files replaced with --force.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(mode))
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    file.write_all(contents)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn append_to_bundle(bundle: &Path, public_pem: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(bundle)
        .with_context(|| format!("failed to open keyring bundle {}", bundle.display()))?;

    let needs_newline = fs::metadata(bundle).map(|m| m.len() > 0).unwrap_or(false);
    if needs_newline {
        file.write_all(b"\n")
            .with_context(|| format!("failed to append to {}", bundle.display()))?;
    }
    file.write_all(public_pem.as_bytes())
        .with_context(|| format!("failed to append to {}", bundle.display()))
}
