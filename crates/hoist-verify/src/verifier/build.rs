use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use super::{ArtifactVerifier, LocalArtifact, Scratch, Strategy, Verification};
use crate::error::{FetchStage, VerifyError, VerifyResult};
use crate::fetch::Fetcher;
use crate::keyring::Keyring;
use crate::location::ArtifactLocation;
use crate::signature::verify_signed;

/// Verifies a detached signature (`<artifact>.sig`) over the artifact bytes.
pub struct BuildVerifier {
    keyring: Arc<Keyring>,
    fetcher: Arc<dyn Fetcher>,
}

impl BuildVerifier {
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

impl ArtifactVerifier for BuildVerifier {
    fn verify_hoist_artifact(
        &self,
        local_copy: &mut dyn LocalArtifact,
        location: &ArtifactLocation,
    ) -> VerifyResult<Verification> {
        location.require_supported_scheme()?;
        let scratch = Scratch::new()?;

        let signature = scratch.fetch(
            self.fetcher.as_ref(),
            &location.signature_url(),
            "artifact.sig",
            FetchStage::ArtifactSignature,
        )?;

        // Signature primitive needs the whole message in memory.
        let mut artifact = Vec::new();
        local_copy
            .read_to_end(&mut artifact)
            .map_err(|e| VerifyError::io("could not read given local copy of the artifact", e))?;

        let signer = verify_signed(&self.keyring, &artifact, &signature)?;

        info!(
            url = %location,
            key_id = %signer.key_id,
            bytes = artifact.len(),
            "artifact verified by build signature"
        );

        Ok(Verification {
            strategy: Strategy::Build,
            key_id: Some(signer.key_id.clone()),
            digest: None,
        })
    }
}
