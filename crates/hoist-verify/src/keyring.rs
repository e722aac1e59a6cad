//! Trusted signing keys.
//!
//! A keyring is loaded once when a verifier is constructed and never
//! changes afterwards. Keys can come from:
//! - a PEM bundle of one or more SPKI `PUBLIC KEY` blocks
//! - a directory of `.pem`/`.pub` bundles
//! - a YAML keyring document (`.yaml`/`.yml`)

use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::digest::sha256_hex_bytes;
use crate::error::{VerifyError, VerifyResult};

const PEM_BEGIN: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_END: &str = "-----END PUBLIC KEY-----";

/// A trusted public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustedKey {
    /// `sha256:<hex>` of the SPKI DER encoding.
    pub key_id: String,
    pub key: VerifyingKey,
    pub name: Option<String>,
}

impl TrustedKey {
    pub fn new(key: VerifyingKey) -> VerifyResult<Self> {
        Ok(Self {
            key_id: compute_key_id(&key)?,
            key,
            name: None,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Why a detached signature did not check out.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureCheckError {
    #[error("malformed signature: {0}")]
    Malformed(String),

    #[error("signature does not match payload for any of {tried} trusted keys")]
    NoMatchingKey { tried: usize },
}

/// Immutable set of trusted keys.
#[derive(Debug, Clone, Default)]
pub struct Keyring {
    keys: Vec<TrustedKey>,
}

impl Keyring {
    /// Build a keyring, dropping duplicate key IDs (first one wins).
    pub fn new(keys: impl IntoIterator<Item = TrustedKey>) -> Self {
        let mut unique: Vec<TrustedKey> = Vec::new();
        for key in keys {
            if !unique.iter().any(|k| k.key_id == key.key_id) {
                unique.push(key);
            }
        }
        Self { keys: unique }
    }

    pub fn from_verifying_keys(
        keys: impl IntoIterator<Item = VerifyingKey>,
    ) -> VerifyResult<Self> {
        let keys = keys
            .into_iter()
            .map(TrustedKey::new)
            .collect::<VerifyResult<Vec<_>>>()?;
        Ok(Self::new(keys))
    }

    /// Load a keyring from `path`. An empty keyring is an error.
    pub fn load(path: &Path) -> VerifyResult<Self> {
        let keys = if path.is_dir() {
            load_dir(path)?
        } else if has_extension(path, &["yaml", "yml"]) {
            KeyringDocument::from_file(path)?.load_keys(path)?
        } else {
            let text = read_to_string(path)?;
            parse_pem_bundle(&text).map_err(|message| load_error(path, message))?
        };

        let keyring = Self::new(keys);
        if keyring.is_empty() {
            return Err(load_error(path, "no trusted keys found"));
        }

        tracing::debug!(
            path = %path.display(),
            keys = keyring.len(),
            "loaded artifact verification keyring"
        );
        Ok(keyring)
    }

    pub fn keys(&self) -> &[TrustedKey] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key_id: &str) -> bool {
        self.keys.iter().any(|k| k.key_id == key_id)
    }

    /// Check a raw Ed25519 detached signature over `payload` against every
    /// key, returning the one that produced it.
    pub fn check_detached_signature(
        &self,
        payload: &[u8],
        signature: &[u8],
    ) -> Result<&TrustedKey, SignatureCheckError> {
        if signature.len() != Signature::BYTE_SIZE {
            return Err(SignatureCheckError::Malformed(format!(
                "expected {} signature bytes, got {}",
                Signature::BYTE_SIZE,
                signature.len()
            )));
        }
        let signature = Signature::from_slice(signature)
            .map_err(|e| SignatureCheckError::Malformed(e.to_string()))?;

        self.keys
            .iter()
            .find(|k| k.key.verify_strict(payload, &signature).is_ok())
            .ok_or(SignatureCheckError::NoMatchingKey {
                tried: self.keys.len(),
            })
    }
}

/// YAML keyring document.
///
/// ```yaml
/// trusted_keys:
///   - key_id: "sha256:..."
///     public_key_path: release.pem
///     name: "Release pipeline"
///   - key_id: "sha256:..."
///     public_key: "MCowBQYDK2VwAyEA..."
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyringDocument {
    #[serde(default)]
    pub trusted_keys: Vec<KeyringEntry>,
}

/// One entry of a [`KeyringDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyringEntry {
    /// SHA-256 of SPKI bytes: sha256:<hex>
    pub key_id: String,

    /// Base64 SPKI DER.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    /// Path to an SPKI PEM file, relative to the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl KeyringDocument {
    pub fn from_file(path: &Path) -> VerifyResult<Self> {
        let content = read_to_string(path)?;
        Self::from_yaml(&content).map_err(|message| load_error(path, message))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        serde_yaml::from_str(yaml).map_err(|e| format!("failed to parse keyring YAML: {}", e))
    }

    pub fn to_yaml(&self) -> VerifyResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| VerifyError::config(format!("failed to serialize keyring: {}", e)))
    }

    /// Decode every entry, checking each declared key ID.
    pub fn load_keys(&self, document_path: &Path) -> VerifyResult<Vec<TrustedKey>> {
        let base = document_path.parent().unwrap_or_else(|| Path::new("."));
        let mut loaded = Vec::with_capacity(self.trusted_keys.len());

        for entry in &self.trusted_keys {
            let key = match (&entry.public_key, &entry.public_key_path) {
                (Some(b64), _) => decode_spki_base64(b64)
                    .map_err(|message| load_error(document_path, message))?,
                (None, Some(rel)) => {
                    let key_path = base.join(rel);
                    let text = read_to_string(&key_path)?;
                    let mut keys = parse_pem_bundle(&text)
                        .map_err(|message| load_error(&key_path, message))?;
                    if keys.len() != 1 {
                        return Err(load_error(
                            &key_path,
                            format!("expected exactly one public key, found {}", keys.len()),
                        ));
                    }
                    keys.remove(0).key
                }
                (None, None) => {
                    return Err(load_error(
                        document_path,
                        format!("key {} has neither public_key nor public_key_path", entry.key_id),
                    ))
                }
            };

            let actual_key_id = compute_key_id(&key)?;
            if actual_key_id != entry.key_id {
                return Err(load_error(
                    document_path,
                    format!(
                        "key_id mismatch: expected {}, got {}",
                        entry.key_id, actual_key_id
                    ),
                ));
            }

            loaded.push(TrustedKey {
                key_id: actual_key_id,
                key,
                name: entry.name.clone(),
            });
        }

        Ok(loaded)
    }
}

/// Compute the key ID (`sha256:<hex>` of SPKI DER) of a public key.
pub fn compute_key_id(key: &VerifyingKey) -> VerifyResult<String> {
    use pkcs8::EncodePublicKey;
    let doc = key
        .to_public_key_der()
        .map_err(|e| VerifyError::parse(format!("failed to encode public key: {}", e)))?;
    Ok(format!("sha256:{}", sha256_hex_bytes(doc.as_bytes())))
}

fn load_dir(dir: &Path) -> VerifyResult<Vec<TrustedKey>> {
    let entries = fs::read_dir(dir).map_err(|e| load_error(dir, e.to_string()))?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| load_error(dir, e.to_string()))?.path();
        if !has_extension(&path, &["pem", "pub"]) || path.is_dir() {
            continue;
        }
        // A key file that cannot be resolved must not silently drop out.
        if !path.is_file() {
            return Err(load_error(&path, "key file is not a readable regular file"));
        }
        files.push(path);
    }
    files.sort();

    let mut keys = Vec::new();
    for file in files {
        let text = read_to_string(&file)?;
        keys.extend(parse_pem_bundle(&text).map_err(|message| load_error(&file, message))?);
    }
    Ok(keys)
}

/// Parse every SPKI `PUBLIC KEY` block in `text`. Other PEM blocks and
/// surrounding text are ignored.
fn parse_pem_bundle(text: &str) -> Result<Vec<TrustedKey>, String> {
    use pkcs8::DecodePublicKey;

    let mut keys = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find(PEM_BEGIN) {
        let block = &rest[start..];
        let end = block
            .find(PEM_END)
            .ok_or_else(|| format!("unterminated public key block #{}", keys.len() + 1))?
            + PEM_END.len();

        let key = VerifyingKey::from_public_key_pem(&block[..end])
            .map_err(|e| format!("failed to parse public key PEM #{}: {}", keys.len() + 1, e))?;
        keys.push(TrustedKey::new(key).map_err(|e| e.to_string())?);

        rest = &block[end..];
    }

    if keys.is_empty() {
        return Err("no PUBLIC KEY blocks found".to_string());
    }
    Ok(keys)
}

fn decode_spki_base64(b64: &str) -> Result<VerifyingKey, String> {
    use pkcs8::DecodePublicKey;

    let bytes = BASE64
        .decode(b64.trim())
        .map_err(|e| format!("invalid base64 public key: {}", e))?;
    VerifyingKey::from_public_key_der(&bytes).map_err(|e| format!("invalid SPKI public key: {}", e))
}

fn read_to_string(path: &Path) -> VerifyResult<String> {
    fs::read_to_string(path).map_err(|e| load_error(path, e.to_string()))
}

fn has_extension(path: &Path, exts: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| exts.iter().any(|x| e.eq_ignore_ascii_case(x)))
        .unwrap_or(false)
}

fn load_error(path: &Path, message: impl Into<String>) -> VerifyError {
    VerifyError::KeyringLoad {
        path: path.to_path_buf(),
        message: message.into(),
    }
}
