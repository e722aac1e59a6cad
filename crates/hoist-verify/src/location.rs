//! Artifact locations and the companion-object naming convention.
//!
//! Trust metadata lives next to the artifact:
//!
//! | Companion | Location |
//! |---|---|
//! | Manifest | `<artifact>.manifest` |
//! | Manifest signature | `<artifact>.manifest.sig` |
//! | Direct signature | `<artifact>.sig` |
//!
//! Suffixes are appended to the path component only; query and fragment
//! are carried over unchanged.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::{VerifyError, VerifyResult};

/// Suffix of the build manifest companion.
pub const MANIFEST_SUFFIX: &str = ".manifest";

/// Suffix of a detached signature companion.
pub const SIGNATURE_SUFFIX: &str = ".sig";

/// URL schemes an artifact may be verified from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    File,
    Gs,
    Http,
    Https,
}

impl Scheme {
    pub fn from_url_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "file" => Some(Self::File),
            "gs" => Some(Self::Gs),
            "http" => Some(Self::Http),
            "https" => Some(Self::Https),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Gs => "gs",
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical remote location of an artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    url: Url,
}

impl ArtifactLocation {
    pub fn new(url: Url) -> Self {
        Self { url }
    }

    /// Parse a location from a URL string.
    pub fn parse(input: &str) -> VerifyResult<Self> {
        Url::parse(input)
            .map(Self::new)
            .map_err(|e| VerifyError::parse(format!("invalid artifact URL '{}': {}", input, e)))
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Recognized scheme, if any.
    pub fn scheme(&self) -> Option<Scheme> {
        Scheme::from_url_scheme(self.url.scheme())
    }

    /// Fail with `UnsupportedScheme` unless the scheme is recognized.
    pub fn require_supported_scheme(&self) -> VerifyResult<Scheme> {
        self.scheme().ok_or_else(|| VerifyError::UnsupportedScheme {
            url: self.url.to_string(),
            scheme: self.url.scheme().to_string(),
        })
    }

    /// `<artifact>.manifest`
    pub fn manifest_url(&self) -> Url {
        self.with_path_suffix(MANIFEST_SUFFIX)
    }

    /// `<artifact>.manifest.sig`
    pub fn manifest_signature_url(&self) -> Url {
        let mut url = self.manifest_url();
        append_path_suffix(&mut url, SIGNATURE_SUFFIX);
        url
    }

    /// `<artifact>.sig`
    pub fn signature_url(&self) -> Url {
        self.with_path_suffix(SIGNATURE_SUFFIX)
    }

    fn with_path_suffix(&self, suffix: &str) -> Url {
        let mut url = self.url.clone();
        append_path_suffix(&mut url, suffix);
        url
    }
}

fn append_path_suffix(url: &mut Url, suffix: &str) {
    let path = format!("{}{}", url.path(), suffix);
    url.set_path(&path);
}

impl fmt::Display for ArtifactLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

impl FromStr for ArtifactLocation {
    type Err = VerifyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Url> for ArtifactLocation {
    fn from(url: Url) -> Self {
        Self::new(url)
    }
}
