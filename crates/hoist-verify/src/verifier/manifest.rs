use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use super::{ArtifactVerifier, LocalArtifact, Scratch, Strategy, Verification};
use crate::error::{FetchStage, VerifyResult};
use crate::fetch::Fetcher;
use crate::keyring::Keyring;
use crate::location::ArtifactLocation;
use crate::manifest::match_digest;
use crate::signature::verify_signed;

/// Verifies an artifact against a signed build manifest.
///
/// The build pipeline publishes `<artifact>.manifest` (YAML declaring
/// `artifact_sha`) and `<artifact>.manifest.sig`. The artifact is accepted
/// when the manifest signature verifies against the keyring and the declared
/// digest equals the SHA-256 of the local copy.
pub struct BuildManifestVerifier {
    keyring: Arc<Keyring>,
    fetcher: Arc<dyn Fetcher>,
}

impl BuildManifestVerifier {
    /// Load the keyring at `keyring_path`.
    pub fn new(keyring_path: &Path, fetcher: Arc<dyn Fetcher>) -> VerifyResult<Self> {
        let keyring = Keyring::load(keyring_path)?;
        Ok(Self::with_keyring(Arc::new(keyring), fetcher))
    }

    pub fn with_keyring(keyring: Arc<Keyring>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { keyring, fetcher }
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }
}

impl ArtifactVerifier for BuildManifestVerifier {
    fn verify_hoist_artifact(
        &self,
        local_copy: &mut dyn LocalArtifact,
        location: &ArtifactLocation,
    ) -> VerifyResult<Verification> {
        location.require_supported_scheme()?;
        let scratch = Scratch::new()?;

        let manifest = scratch.fetch(
            self.fetcher.as_ref(),
            &location.manifest_url(),
            "manifest",
            FetchStage::Manifest,
        )?;
        let signature = scratch.fetch(
            self.fetcher.as_ref(),
            &location.manifest_signature_url(),
            "manifest.sig",
            FetchStage::ManifestSignature,
        )?;

        let signer = verify_signed(&self.keyring, &manifest, &signature)?;
        debug!(url = %location, key_id = %signer.key_id, "manifest signature verified");

        let digest = match_digest(local_copy, &manifest)?;

        info!(
            url = %location,
            key_id = %signer.key_id,
            digest = %digest,
            "artifact verified by signed manifest"
        );

        Ok(Verification {
            strategy: Strategy::Manifest,
            key_id: Some(signer.key_id.clone()),
            digest: Some(digest),
        })
    }
}
