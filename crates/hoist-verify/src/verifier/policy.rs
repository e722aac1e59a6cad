use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{
    ArtifactVerifier, BuildManifestVerifier, BuildVerifier, CompositeVerifier, NopVerifier,
};
use crate::error::{VerifyError, VerifyResult};
use crate::fetch::Fetcher;

/// Which verification strategy a deployment runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationPolicy {
    /// No verification.
    #[default]
    None,
    /// Signed build manifest only.
    Manifest,
    /// Detached build signature only.
    Build,
    /// Manifest, falling back to the build signature.
    Either,
}

impl VerificationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Manifest => "manifest",
            Self::Build => "build",
            Self::Either => "either",
        }
    }
}

impl fmt::Display for VerificationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VerificationPolicy {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "manifest" => Ok(Self::Manifest),
            "build" => Ok(Self::Build),
            "either" => Ok(Self::Either),
            other => Err(VerifyError::config(format!(
                "unknown verification policy '{}' (expected none, manifest, build or either)",
                other
            ))),
        }
    }
}

/// Construct the verifier for `policy`. The keyring is only loaded when the
/// policy checks signatures.
pub fn build_verifier(
    policy: VerificationPolicy,
    keyring_path: &Path,
    fetcher: Arc<dyn Fetcher>,
) -> VerifyResult<Box<dyn ArtifactVerifier>> {
    let verifier: Box<dyn ArtifactVerifier> = match policy {
        VerificationPolicy::None => Box::new(NopVerifier::new()),
        VerificationPolicy::Manifest => {
            Box::new(BuildManifestVerifier::new(keyring_path, fetcher)?)
        }
        VerificationPolicy::Build => Box::new(BuildVerifier::new(keyring_path, fetcher)?),
        VerificationPolicy::Either => Box::new(CompositeVerifier::new(keyring_path, fetcher)?),
    };

    info!(
        policy = %policy,
        keyring = %keyring_path.display(),
        "artifact verifier ready"
    );
    Ok(verifier)
}
