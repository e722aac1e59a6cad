//! Artifact verification strategies.
//!
//! Every strategy implements [`ArtifactVerifier`], so launchers hold a
//! `Box<dyn ArtifactVerifier>` and never branch on which one is active:
//!
//! - [`NopVerifier`]: verification disabled
//! - [`BuildManifestVerifier`]: signed manifest declaring the artifact digest
//! - [`BuildVerifier`]: detached signature over the artifact itself
//! - [`CompositeVerifier`]: manifest first, build signature as fallback

mod build;
mod composite;
mod manifest;
mod nop;
mod policy;

use std::fs;
use std::io::{Read, Seek};

use tempfile::TempDir;
use tracing::debug;
use url::Url;

use crate::error::{FetchStage, VerifyError, VerifyResult};
use crate::fetch::Fetcher;
use crate::location::ArtifactLocation;

pub use build::BuildVerifier;
pub use composite::CompositeVerifier;
pub use manifest::BuildManifestVerifier;
pub use nop::NopVerifier;
pub use policy::{build_verifier, VerificationPolicy};

/// Prefix of the per-call scratch directories.
const SCRATCH_PREFIX: &str = "artifact_verification";

/// A downloaded artifact: readable, and rewindable between strategies.
pub trait LocalArtifact: Read + Seek {}

impl<T: Read + Seek> LocalArtifact for T {}

/// Checks that an artifact was produced by a trusted build pipeline.
pub trait ArtifactVerifier: Send + Sync {
    /// Verify `local_copy`, the downloaded bytes of the artifact published at
    /// `location`. The stream may be read to EOF; it is never truncated.
    fn verify_hoist_artifact(
        &self,
        local_copy: &mut dyn LocalArtifact,
        location: &ArtifactLocation,
    ) -> VerifyResult<Verification>;
}

/// Which strategy accepted an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Verification disabled.
    None,
    /// Signed build manifest.
    Manifest,
    /// Detached signature over the artifact.
    Build,
}

/// Successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub strategy: Strategy,

    /// Key ID of the signer (if a signature was checked).
    pub key_id: Option<String>,

    /// Artifact digest (manifest strategy only).
    pub digest: Option<String>,
}

impl Verification {
    pub fn skipped() -> Self {
        Self {
            strategy: Strategy::None,
            key_id: None,
            digest: None,
        }
    }
}

/// Per-call working directory for downloaded companions. Removed on drop,
/// so every return path (and unwinding panic) releases it.
pub(crate) struct Scratch {
    dir: TempDir,
}

impl Scratch {
    pub(crate) fn new() -> VerifyResult<Self> {
        tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .tempdir()
            .map(|dir| Self { dir })
            .map_err(|e| {
                VerifyError::io("could not create temporary directory for verification files", e)
            })
    }

    /// Copy `url` into the scratch directory as `name` and read it back.
    pub(crate) fn fetch(
        &self,
        fetcher: &dyn Fetcher,
        url: &Url,
        name: &str,
        stage: FetchStage,
    ) -> VerifyResult<Vec<u8>> {
        let destination = self.dir.path().join(name);
        debug!(url = %url, stage = %stage, "fetching companion object");

        fetcher
            .copy_local(url, &destination)
            .map_err(|source| VerifyError::FetchFailure {
                stage,
                url: url.to_string(),
                source,
            })?;

        fs::read(&destination).map_err(|e| {
            VerifyError::io(
                format!("could not read downloaded {} at {}", stage, destination.display()),
                e,
            )
        })
    }

    #[cfg(test)]
    pub(crate) fn path(&self) -> &std::path::Path {
        self.dir.path()
    }
}
