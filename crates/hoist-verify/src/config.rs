//! Verifier configuration: environment and YAML file sources.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{VerifyError, VerifyResult};
use crate::fetch::{FetchConfig, UriFetcher};
use crate::verifier::{build_verifier, ArtifactVerifier, VerificationPolicy};

/// Default keyring location.
pub const DEFAULT_KEYRING_PATH: &str = "/etc/hoist/keyring.pem";

/// Everything needed to construct the configured verifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifierConfig {
    #[serde(default)]
    pub policy: VerificationPolicy,

    #[serde(default = "default_keyring_path")]
    pub keyring_path: PathBuf,

    #[serde(default)]
    pub fetch: FetchConfig,
}

fn default_keyring_path() -> PathBuf {
    PathBuf::from(DEFAULT_KEYRING_PATH)
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            policy: VerificationPolicy::default(),
            keyring_path: default_keyring_path(),
            fetch: FetchConfig::default(),
        }
    }
}

impl VerifierConfig {
    /// Create config from environment variables.
    ///
    /// An unrecognized `HOIST_ARTIFACT_VERIFICATION` value is an error rather
    /// than a silent fallback to no verification.
    pub fn from_env() -> VerifyResult<Self> {
        let policy = match std::env::var("HOIST_ARTIFACT_VERIFICATION") {
            Ok(v) if !v.trim().is_empty() => v.parse()?,
            _ => VerificationPolicy::default(),
        };

        Ok(Self {
            policy,
            keyring_path: std::env::var_os("HOIST_KEYRING_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(default_keyring_path),
            fetch: FetchConfig::from_env(),
        })
    }

    /// Load config from a YAML file. Missing fields take their defaults.
    pub fn from_yaml_file(path: &Path) -> VerifyResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            VerifyError::io(format!("could not read config {}", path.display()), e)
        })?;
        serde_yaml::from_str(&content).map_err(|e| {
            VerifyError::config(format!("invalid config {}: {}", path.display(), e))
        })
    }

    pub fn with_policy(mut self, policy: VerificationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_keyring_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.keyring_path = path.into();
        self
    }

    pub fn with_fetch(mut self, fetch: FetchConfig) -> Self {
        self.fetch = fetch;
        self
    }

    /// Build the configured verifier over the default [`UriFetcher`].
    pub fn build_verifier(&self) -> VerifyResult<Box<dyn ArtifactVerifier>> {
        let fetcher = UriFetcher::new(self.fetch.clone())
            .map_err(|e| VerifyError::config(e.to_string()))?;
        build_verifier(self.policy, &self.keyring_path, Arc::new(fetcher))
    }
}
