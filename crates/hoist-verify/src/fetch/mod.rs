//! Copying remote objects to local storage.
//!
//! Verifiers only need one capability from the transport layer: copy the
//! object at a URL to a local path. [`UriFetcher`] is the default
//! implementation for `file`, `gs`, `http` and `https` URLs; deployments can
//! plug in their own [`Fetcher`].

mod uri;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

pub use uri::{UriFetcher, FETCH_USER_AGENT};

/// Copies a remote object to a local path.
///
/// Cancellation and timeouts are the implementation's concern; a cancelled
/// copy must return an error.
pub trait Fetcher: Send + Sync {
    fn copy_local(&self, source: &Url, destination: &Path) -> Result<(), FetchError>;
}

impl<F: Fetcher + ?Sized> Fetcher for Arc<F> {
    fn copy_local(&self, source: &Url, destination: &Path) -> Result<(), FetchError> {
        (**self).copy_local(source, destination)
    }
}

impl<F: Fetcher + ?Sized> Fetcher for Box<F> {
    fn copy_local(&self, source: &Url, destination: &Path) -> Result<(), FetchError> {
        (**self).copy_local(source, destination)
    }
}

/// Fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The fetcher does not handle this scheme.
    #[error("unsupported scheme '{scheme}' for {url}")]
    UnsupportedScheme { url: String, scheme: String },

    /// URL cannot be mapped onto a transport.
    #[error("invalid URL {url}: {message}")]
    InvalidUrl { url: String, message: String },

    /// Object does not exist.
    #[error("not found: {url}")]
    NotFound { url: String },

    /// Server asked us to slow down.
    #[error("rate limited by {url}: retry after {retry_after:?}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Connection, timeout, or body transfer failure.
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// HTTP client could not be built.
    #[error("could not build HTTP client: {message}")]
    Client { message: String },

    /// Local file could not be read or written.
    #[error("local I/O error on {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Transport configuration for [`UriFetcher`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Maximum retries for transient failures.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// HTTP endpoint that serves `gs://` objects.
    #[serde(default = "default_gcs_endpoint")]
    pub gcs_endpoint: String,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    3
}

fn default_gcs_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            gcs_endpoint: default_gcs_endpoint(),
        }
    }
}

impl FetchConfig {
    /// Create config from environment variables.
    ///
    /// | Variable | Description |
    /// |----------|-------------|
    /// | `HOIST_FETCH_TIMEOUT` | Request timeout in seconds (0 is ignored) |
    /// | `HOIST_FETCH_MAX_RETRIES` | Max retries for transient failures |
    /// | `HOIST_GCS_ENDPOINT` | Base URL for `gs://` objects |
    pub fn from_env() -> Self {
        Self {
            timeout_secs: std::env::var("HOIST_FETCH_TIMEOUT")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|&secs: &u64| secs > 0)
                .unwrap_or_else(default_timeout),
            max_retries: std::env::var("HOIST_FETCH_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_max_retries),
            gcs_endpoint: std::env::var("HOIST_GCS_ENDPOINT")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(default_gcs_endpoint),
        }
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_gcs_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.gcs_endpoint = endpoint.into();
        self
    }
}
