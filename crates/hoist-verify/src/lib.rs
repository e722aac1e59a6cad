//! Artifact trust verification for Hoist deployments.
//!
//! Before a downloaded build artifact is unpacked and executed, a verifier
//! decides whether it was produced by a trusted build pipeline:
//!
//! - **Manifest**: `<artifact>.manifest` declares the SHA-256 of the artifact
//!   and is signed by `<artifact>.manifest.sig`
//! - **Build**: `<artifact>.sig` is a detached signature over the artifact
//! - **Either**: manifest first, build signature as fallback
//!
//! Signatures are Ed25519 over the exact bytes, raw (64 bytes) or wrapped in
//! `HOIST SIGNATURE` ASCII armor. Trusted public keys come from a keyring
//! loaded once when the verifier is constructed.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::fs::File;
//! use hoist_verify::{ArtifactLocation, VerifierConfig};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let verifier = VerifierConfig::from_env()?.build_verifier()?;
//!
//! let location = ArtifactLocation::parse("gs://builds/myapp/myapp_abc123.tar.gz")?;
//! let mut local = File::open("/tmp/myapp_abc123.tar.gz")?;
//! verifier.verify_hoist_artifact(&mut local, &location)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! | Environment Variable | Description |
//! |---------------------|-------------|
//! | `HOIST_ARTIFACT_VERIFICATION` | `none`, `manifest`, `build` or `either` (default: `none`) |
//! | `HOIST_KEYRING_PATH` | PEM bundle, key directory or YAML keyring (default: `/etc/hoist/keyring.pem`) |
//! | `HOIST_FETCH_TIMEOUT` | Request timeout in seconds (default: 30) |
//! | `HOIST_FETCH_MAX_RETRIES` | Max retries for transient failures (default: 3) |
//! | `HOIST_GCS_ENDPOINT` | HTTP endpoint serving `gs://` objects |

pub mod armor;
pub mod config;
mod digest;
pub mod error;
pub mod fetch;
pub mod keyring;
pub mod location;
pub mod manifest;
mod signature;
pub mod verifier;

pub use config::{VerifierConfig, DEFAULT_KEYRING_PATH};
pub use digest::{sha256_hex_bytes, sha256_hex_reader};
pub use error::{FetchStage, VerifyError, VerifyResult};
pub use fetch::{FetchConfig, FetchError, Fetcher, UriFetcher, FETCH_USER_AGENT};
pub use keyring::{compute_key_id, Keyring, KeyringDocument, KeyringEntry, TrustedKey};
pub use location::{ArtifactLocation, Scheme, MANIFEST_SUFFIX, SIGNATURE_SUFFIX};
pub use manifest::{match_digest, TrustDocument};
pub use signature::verify_signed;
pub use verifier::{
    build_verifier, ArtifactVerifier, BuildManifestVerifier, BuildVerifier, CompositeVerifier,
    LocalArtifact, NopVerifier, Strategy, Verification, VerificationPolicy,
};
