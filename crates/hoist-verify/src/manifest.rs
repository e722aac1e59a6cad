//! Build manifests: the trust document that binds a signature to an
//! artifact digest.
//!
//! A manifest is a YAML document with a single recognized key:
//!
//! ```yaml
//! artifact_sha: 9f86d081884c7d659a2feaa0c55ad015a3bf4f1b2b0b822cd15d6c15b0f00a08
//! ```
//!
//! The value is the lowercase hex SHA-256 of the artifact bytes. Other keys
//! are ignored.

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::digest::sha256_hex_reader;
use crate::error::{VerifyError, VerifyResult};

/// Parsed build manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustDocument {
    /// Lowercase hex SHA-256 of the artifact.
    pub artifact_sha: String,
}

#[derive(Deserialize)]
struct RawTrustDocument {
    #[serde(default)]
    artifact_sha: Option<String>,
}

impl TrustDocument {
    pub fn new(artifact_sha: impl Into<String>) -> Self {
        Self {
            artifact_sha: artifact_sha.into(),
        }
    }

    /// Parse manifest bytes. A missing or empty `artifact_sha` is a parse
    /// error, not a mismatch.
    pub fn from_slice(bytes: &[u8]) -> VerifyResult<Self> {
        let raw: RawTrustDocument = serde_yaml::from_slice(bytes)
            .map_err(|e| VerifyError::parse(format!("could not unmarshal manifest: {}", e)))?;

        match raw.artifact_sha {
            Some(sha) if !sha.trim().is_empty() => Ok(Self { artifact_sha: sha }),
            _ => Err(VerifyError::parse("manifest does not declare artifact_sha")),
        }
    }

    pub fn to_yaml(&self) -> VerifyResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| VerifyError::parse(format!("could not marshal manifest: {}", e)))
    }
}

/// Hash the whole of `local_copy` and compare it with the digest declared in
/// `manifest_bytes`. Returns the computed digest on success.
///
/// The stream is left at EOF whether or not the digests match.
pub fn match_digest<R: Read + ?Sized>(
    local_copy: &mut R,
    manifest_bytes: &[u8],
) -> VerifyResult<String> {
    let actual = sha256_hex_reader(local_copy)
        .map_err(|e| VerifyError::io("could not read given local copy of the artifact", e))?;

    let manifest = TrustDocument::from_slice(manifest_bytes)?;

    if manifest.artifact_sha != actual {
        return Err(VerifyError::DigestMismatch {
            expected: manifest.artifact_sha,
            actual,
        });
    }
    Ok(actual)
}
