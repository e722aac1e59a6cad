use std::io::{Seek, SeekFrom};
use std::path::Path;
use std::sync::Arc;

use tracing::{error, warn};

use super::{ArtifactVerifier, BuildManifestVerifier, BuildVerifier, LocalArtifact, Verification};
use crate::error::{VerifyError, VerifyResult};
use crate::fetch::Fetcher;
use crate::keyring::Keyring;
use crate::location::ArtifactLocation;

/// Tries the signed manifest first and falls back to the build signature.
///
/// The manifest strategy consumes the local stream while hashing, so the
/// stream is rewound to offset 0 before the fallback runs. When both
/// strategies fail the build strategy's error is returned and the manifest
/// failure is only logged.
pub struct CompositeVerifier {
    manifest: BuildManifestVerifier,
    build: BuildVerifier,
}

impl CompositeVerifier {
    /// Load the keyring at `keyring_path` once and share it between both
    /// strategies.
    pub fn new(keyring_path: &Path, fetcher: Arc<dyn Fetcher>) -> VerifyResult<Self> {
        let keyring = Arc::new(Keyring::load(keyring_path)?);
        Ok(Self::from_parts(
            BuildManifestVerifier::with_keyring(keyring.clone(), fetcher.clone()),
            BuildVerifier::with_keyring(keyring, fetcher),
        ))
    }

    pub fn from_parts(manifest: BuildManifestVerifier, build: BuildVerifier) -> Self {
        Self { manifest, build }
    }
}

impl ArtifactVerifier for CompositeVerifier {
    fn verify_hoist_artifact(
        &self,
        local_copy: &mut dyn LocalArtifact,
        location: &ArtifactLocation,
    ) -> VerifyResult<Verification> {
        let manifest_error = match self.manifest.verify_hoist_artifact(local_copy, location) {
            Ok(verification) => return Ok(verification),
            Err(e) => e,
        };

        warn!(
            url = %location,
            error = %manifest_error,
            trust_failure = manifest_error.is_trust_failure(),
            "manifest verification failed, falling back to build signature"
        );

        if let Err(e) = local_copy.seek(SeekFrom::Start(0)) {
            error!(url = %location, error = %e, "could not rewind local copy");
            return Err(VerifyError::io(
                "could not rewind local copy of the artifact for build verification",
                e,
            ));
        }

        self.build
            .verify_hoist_artifact(local_copy, location)
            .inspect_err(|e| {
                warn!(
                    url = %location,
                    error = %e,
                    manifest_error = %manifest_error,
                    "artifact failed both manifest and build verification"
                );
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::verifier::test_support::{location, manifest_fetcher, signing_key, MemoryFetcher};
    use crate::verifier::Strategy;
    use ed25519_dalek::Signer;
    use std::io::Cursor;

    const ARTIFACT: &[u8] = b"composite artifact";

    fn composite(fetcher: MemoryFetcher) -> (CompositeVerifier, Arc<MemoryFetcher>) {
        let keyring = Arc::new(
            Keyring::from_verifying_keys([signing_key(3).verifying_key()]).unwrap(),
        );
        let fetcher = Arc::new(fetcher);
        let verifier = CompositeVerifier::from_parts(
            BuildManifestVerifier::with_keyring(keyring.clone(), fetcher.clone()),
            BuildVerifier::with_keyring(keyring, fetcher.clone()),
        );
        (verifier, fetcher)
    }

    #[test]
    fn test_manifest_success_skips_build() {
        let (v, fetcher) = composite(manifest_fetcher(&signing_key(3), ARTIFACT));

        let result = v
            .verify_hoist_artifact(&mut Cursor::new(ARTIFACT.to_vec()), &location())
            .unwrap();
        assert_eq!(result.strategy, Strategy::Manifest);
        assert!(!fetcher
            .requested()
            .contains(&location().signature_url().to_string()));
    }

    #[test]
    fn test_falls_back_after_digest_mismatch() {
        // Manifest declares a different artifact; build signature covers ours.
        let sig = signing_key(3).sign(ARTIFACT).to_bytes();
        let fetcher = manifest_fetcher(&signing_key(3), b"some other build")
            .with(location().signature_url(), sig.to_vec());
        let (v, _) = composite(fetcher);

        let result = v
            .verify_hoist_artifact(&mut Cursor::new(ARTIFACT.to_vec()), &location())
            .unwrap();
        assert_eq!(result.strategy, Strategy::Build);
    }

    #[test]
    fn test_both_fail_returns_build_error() {
        let (v, _) = composite(MemoryFetcher::default());

        let result = v.verify_hoist_artifact(&mut Cursor::new(ARTIFACT.to_vec()), &location());
        match result {
            Err(VerifyError::FetchFailure { stage, .. }) => {
                assert_eq!(stage, crate::error::FetchStage::ArtifactSignature)
            }
            other => panic!("expected build-stage FetchFailure, got {:?}", other),
        }
    }
}
