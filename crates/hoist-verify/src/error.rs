//! Error types for artifact verification.

use std::fmt;
use std::path::PathBuf;

use crate::fetch::FetchError;

/// Which companion object a fetch was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStage {
    /// `<artifact>.manifest`
    Manifest,
    /// `<artifact>.manifest.sig`
    ManifestSignature,
    /// `<artifact>.sig`
    ArtifactSignature,
}

impl fmt::Display for FetchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Manifest => "artifact manifest",
            Self::ManifestSignature => "manifest signature",
            Self::ArtifactSignature => "artifact signature",
        };
        f.write_str(name)
    }
}

/// Verification errors.
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Artifact URL scheme is not one of file, gs, http, https.
    #[error("{url} does not have a recognized scheme '{scheme}', cannot verify")]
    UnsupportedScheme { url: String, scheme: String },

    /// A companion object could not be copied to local storage.
    #[error("could not download {stage} from {url}")]
    FetchFailure {
        stage: FetchStage,
        url: String,
        #[source]
        source: FetchError,
    },

    /// Signature did not verify against any trusted key.
    #[error("signature verification failed: {reason}")]
    SignatureInvalid { reason: String },

    /// Artifact digest differs from the digest declared by the manifest.
    #[error("artifact digest mismatch: manifest declares {expected}, artifact is {actual}")]
    DigestMismatch { expected: String, actual: String },

    /// Trust document or configuration value could not be parsed.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Keyring could not be loaded at verifier construction.
    #[error("could not load artifact verification keyring from {}: {message}", path.display())]
    KeyringLoad { path: PathBuf, message: String },

    /// Verifier configuration is invalid.
    #[error("config error: {message}")]
    Config { message: String },

    /// Local read, seek, or scratch storage failure.
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl VerifyError {
    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 1,

            Self::KeyringLoad { .. } => 2,

            Self::UnsupportedScheme { .. } => 3,
            Self::FetchFailure { .. } => 3,

            // Trust failures
            Self::SignatureInvalid { .. } => 4,
            Self::DigestMismatch { .. } => 4,
            Self::Parse { .. } => 4,

            Self::Io { .. } => 5,
        }
    }

    /// Whether the artifact was positively rejected, as opposed to the
    /// environment preventing a decision.
    pub fn is_trust_failure(&self) -> bool {
        matches!(
            self,
            Self::SignatureInvalid { .. } | Self::DigestMismatch { .. } | Self::Parse { .. }
        )
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn signature_invalid(reason: impl Into<String>) -> Self {
        Self::SignatureInvalid {
            reason: reason.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

/// Result type for verification operations.
pub type VerifyResult<T> = Result<T, VerifyError>;
