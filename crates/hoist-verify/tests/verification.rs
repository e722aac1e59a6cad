//! End-to-end verification over real keyring files and `file://` companions.
//!
//! Covers the strategy selector, both signature encodings, the composite
//! fallback (including the rewind between strategies), scheme rejection,
//! fetch-stage reporting and scratch directory cleanup.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use ed25519_dalek::{Signer, SigningKey};
use hoist_verify::armor::{self, SIGNATURE_LABEL};
use hoist_verify::{
    build_verifier, sha256_hex_bytes, ArtifactLocation, ArtifactVerifier, FetchConfig,
    FetchError, FetchStage, Fetcher, Strategy, UriFetcher, VerificationPolicy, VerifyError,
};
use pkcs8::{EncodePublicKey, LineEnding};
use tempfile::TempDir;
use url::Url;

const ARTIFACT: &[u8] = b"\x1f\x8b\x08\x00 pretend this is a release tarball";

/// Artifact plus companions laid out in a temp dir, and a keyring file.
struct Published {
    dir: TempDir,
    keyring: PathBuf,
    signer: SigningKey,
}

impl Published {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let signer = SigningKey::generate(&mut rand::thread_rng());
        let pem = signer
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .unwrap();
        let keyring = dir.path().join("keyring.pem");
        fs::write(&keyring, pem).unwrap();
        fs::write(dir.path().join("app.tar.gz"), ARTIFACT).unwrap();
        Self {
            dir,
            keyring,
            signer,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn location(&self) -> ArtifactLocation {
        ArtifactLocation::new(Url::from_file_path(self.path("app.tar.gz")).unwrap())
    }

    fn publish_manifest_for(&self, artifact: &[u8], armored: bool) {
        let manifest = format!("artifact_sha: {}\n", sha256_hex_bytes(artifact));
        let sig = self.signer.sign(manifest.as_bytes()).to_bytes();
        fs::write(self.path("app.tar.gz.manifest"), &manifest).unwrap();
        write_signature(&self.path("app.tar.gz.manifest.sig"), &sig, armored);
    }

    fn publish_build_signature(&self, armored: bool) {
        let sig = self.signer.sign(ARTIFACT).to_bytes();
        write_signature(&self.path("app.tar.gz.sig"), &sig, armored);
    }

    fn verifier(&self, policy: VerificationPolicy) -> Box<dyn ArtifactVerifier> {
        let fetcher = UriFetcher::new(FetchConfig::default().with_max_retries(0)).unwrap();
        build_verifier(policy, &self.keyring, Arc::new(fetcher)).unwrap()
    }
}

fn write_signature(path: &Path, sig: &[u8], armored: bool) {
    if armored {
        fs::write(path, armor::encode(SIGNATURE_LABEL, sig)).unwrap();
    } else {
        fs::write(path, sig).unwrap();
    }
}

fn artifact_stream() -> Cursor<Vec<u8>> {
    Cursor::new(ARTIFACT.to_vec())
}

/// Stream that records seeks and the offset of every read.
struct ObservedStream {
    inner: Cursor<Vec<u8>>,
    seeks: Vec<SeekFrom>,
    read_offsets: Vec<u64>,
}

impl ObservedStream {
    fn new(bytes: &[u8]) -> Self {
        Self {
            inner: Cursor::new(bytes.to_vec()),
            seeks: Vec::new(),
            read_offsets: Vec::new(),
        }
    }
}

impl Read for ObservedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_offsets.push(self.inner.position());
        self.inner.read(buf)
    }
}

impl Seek for ObservedStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.seeks.push(pos);
        self.inner.seek(pos)
    }
}

/// Readable stream whose seeks always fail, like a pipe.
struct Unseekable(Cursor<Vec<u8>>);

impl Read for Unseekable {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl Seek for Unseekable {
    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(io::Error::new(io::ErrorKind::Unsupported, "stream is not seekable"))
    }
}

/// Fetcher that records every request and its destination.
#[derive(Default)]
struct RecordingFetcher {
    objects: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<(String, PathBuf)>>,
}

impl Fetcher for RecordingFetcher {
    fn copy_local(&self, source: &Url, destination: &Path) -> Result<(), FetchError> {
        self.calls
            .lock()
            .unwrap()
            .push((source.to_string(), destination.to_path_buf()));
        let bytes = self
            .objects
            .get(source.as_str())
            .ok_or_else(|| FetchError::NotFound {
                url: source.to_string(),
            })?;
        fs::write(destination, bytes).map_err(|e| FetchError::Io {
            path: destination.to_path_buf(),
            source: e,
        })
    }
}

// ---------------------------------------------------------------------------
// Policy selection
// ---------------------------------------------------------------------------

#[test]
fn test_none_accepts_without_fetching() {
    let fetcher = Arc::new(RecordingFetcher::default());
    let verifier = build_verifier(
        VerificationPolicy::None,
        Path::new("/does/not/exist"),
        fetcher.clone(),
    )
    .unwrap();

    let location = ArtifactLocation::parse("ftp://mirror/anything").unwrap();
    let result = verifier
        .verify_hoist_artifact(&mut artifact_stream(), &location)
        .unwrap();

    assert_eq!(result.strategy, Strategy::None);
    assert!(fetcher.calls.lock().unwrap().is_empty());
}

#[test]
fn test_missing_keyring_fails_construction() {
    let dir = tempfile::tempdir().unwrap();
    let result = build_verifier(
        VerificationPolicy::Build,
        &dir.path().join("absent.pem"),
        Arc::new(RecordingFetcher::default()),
    );
    let err = result.err().expect("construction must fail");
    assert!(matches!(err, VerifyError::KeyringLoad { .. }));
    assert_eq!(err.exit_code(), 2);
}

// ---------------------------------------------------------------------------
// Manifest strategy
// ---------------------------------------------------------------------------

#[test]
fn test_manifest_raw_and_armored() {
    for armored in [false, true] {
        let published = Published::new();
        published.publish_manifest_for(ARTIFACT, armored);

        let result = published
            .verifier(VerificationPolicy::Manifest)
            .verify_hoist_artifact(&mut artifact_stream(), &published.location())
            .unwrap();
        assert_eq!(result.strategy, Strategy::Manifest);
        assert_eq!(result.digest, Some(sha256_hex_bytes(ARTIFACT)));
    }
}

#[test]
fn test_manifest_rejects_modified_artifact() {
    let published = Published::new();
    published.publish_manifest_for(ARTIFACT, false);

    let mut modified = ARTIFACT.to_vec();
    modified.push(b'!');
    let result = published
        .verifier(VerificationPolicy::Manifest)
        .verify_hoist_artifact(&mut Cursor::new(modified), &published.location());

    let err = result.unwrap_err();
    assert!(matches!(err, VerifyError::DigestMismatch { .. }));
    assert!(err.is_trust_failure());
}

#[test]
fn test_manifest_rejects_tampered_manifest() {
    let published = Published::new();
    published.publish_manifest_for(ARTIFACT, false);
    // Re-point the manifest at another digest without re-signing.
    fs::write(
        published.path("app.tar.gz.manifest"),
        format!("artifact_sha: {}\n", sha256_hex_bytes(b"evil")),
    )
    .unwrap();

    let result = published
        .verifier(VerificationPolicy::Manifest)
        .verify_hoist_artifact(&mut Cursor::new(b"evil".to_vec()), &published.location());
    assert!(matches!(result, Err(VerifyError::SignatureInvalid { .. })));
}

#[test]
fn test_manifest_missing_reports_stage() {
    let published = Published::new();

    let result = published
        .verifier(VerificationPolicy::Manifest)
        .verify_hoist_artifact(&mut artifact_stream(), &published.location());
    match result {
        Err(VerifyError::FetchFailure { stage, url, .. }) => {
            assert_eq!(stage, FetchStage::Manifest);
            assert!(url.ends_with("app.tar.gz.manifest"));
        }
        other => panic!("expected FetchFailure, got {:?}", other),
    }
}

#[test]
fn test_manifest_without_artifact_sha_is_parse_error() {
    let published = Published::new();
    let manifest = b"built_by: ci\n";
    let sig = published.signer.sign(manifest).to_bytes();
    fs::write(published.path("app.tar.gz.manifest"), manifest).unwrap();
    fs::write(published.path("app.tar.gz.manifest.sig"), sig).unwrap();

    let result = published
        .verifier(VerificationPolicy::Manifest)
        .verify_hoist_artifact(&mut artifact_stream(), &published.location());
    assert!(matches!(result, Err(VerifyError::Parse { .. })));
}

// ---------------------------------------------------------------------------
// Build strategy
// ---------------------------------------------------------------------------

#[test]
fn test_build_raw_and_armored() {
    for armored in [false, true] {
        let published = Published::new();
        published.publish_build_signature(armored);

        let result = published
            .verifier(VerificationPolicy::Build)
            .verify_hoist_artifact(&mut artifact_stream(), &published.location())
            .unwrap();
        assert_eq!(result.strategy, Strategy::Build);
    }
}

#[test]
fn test_build_ignores_manifest() {
    let published = Published::new();
    published.publish_manifest_for(ARTIFACT, false);

    let result = published
        .verifier(VerificationPolicy::Build)
        .verify_hoist_artifact(&mut artifact_stream(), &published.location());
    match result {
        Err(VerifyError::FetchFailure { stage, .. }) => {
            assert_eq!(stage, FetchStage::ArtifactSignature)
        }
        other => panic!("expected FetchFailure, got {:?}", other),
    }
}

#[test]
fn test_unsupported_scheme_makes_no_fetch() {
    let published = Published::new();
    let fetcher = Arc::new(RecordingFetcher::default());

    for policy in [
        VerificationPolicy::Manifest,
        VerificationPolicy::Build,
        VerificationPolicy::Either,
    ] {
        let verifier = build_verifier(policy, &published.keyring, fetcher.clone()).unwrap();
        let location = ArtifactLocation::parse("s3://bucket/app.tar.gz").unwrap();
        let result = verifier.verify_hoist_artifact(&mut artifact_stream(), &location);
        assert!(
            matches!(result, Err(VerifyError::UnsupportedScheme { .. })),
            "{}",
            policy
        );
    }
    assert!(fetcher.calls.lock().unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Composite strategy
// ---------------------------------------------------------------------------

#[test]
fn test_either_prefers_manifest() {
    let published = Published::new();
    published.publish_manifest_for(ARTIFACT, false);
    published.publish_build_signature(false);

    let result = published
        .verifier(VerificationPolicy::Either)
        .verify_hoist_artifact(&mut artifact_stream(), &published.location())
        .unwrap();
    assert_eq!(result.strategy, Strategy::Manifest);
}

#[test]
fn test_either_rewinds_before_fallback() {
    let published = Published::new();
    // Manifest for a different build: hashing consumes the stream, then fails.
    published.publish_manifest_for(b"previous build", false);
    published.publish_build_signature(true);

    let mut stream = ObservedStream::new(ARTIFACT);
    let result = published
        .verifier(VerificationPolicy::Either)
        .verify_hoist_artifact(&mut stream, &published.location())
        .unwrap();

    assert_eq!(result.strategy, Strategy::Build);
    assert_eq!(stream.seeks, vec![SeekFrom::Start(0)]);
    // Both strategies started reading at offset 0.
    let restarts = stream.read_offsets.iter().filter(|&&o| o == 0).count();
    assert_eq!(restarts, 2, "offsets: {:?}", stream.read_offsets);
}

#[test]
fn test_either_both_fail_returns_build_error() {
    let published = Published::new();
    published.publish_manifest_for(b"previous build", false);
    let other = SigningKey::generate(&mut rand::thread_rng());
    fs::write(published.path("app.tar.gz.sig"), other.sign(ARTIFACT).to_bytes()).unwrap();

    let result = published
        .verifier(VerificationPolicy::Either)
        .verify_hoist_artifact(&mut artifact_stream(), &published.location());
    assert!(matches!(result, Err(VerifyError::SignatureInvalid { .. })));
}

#[test]
fn test_either_rewind_failure_is_io_error() {
    let published = Published::new();
    published.publish_manifest_for(b"previous build", false);
    published.publish_build_signature(false);

    let mut stream = Unseekable(Cursor::new(ARTIFACT.to_vec()));
    let result = published
        .verifier(VerificationPolicy::Either)
        .verify_hoist_artifact(&mut stream, &published.location());

    let err = result.unwrap_err();
    assert!(matches!(err, VerifyError::Io { .. }), "got {:?}", err);
    assert!(!err.is_trust_failure());
}

// ---------------------------------------------------------------------------
// Scratch storage
// ---------------------------------------------------------------------------

/// Writes the companion, then panics mid-download.
#[derive(Default)]
struct PanickingFetcher {
    destinations: Mutex<Vec<PathBuf>>,
}

impl Fetcher for PanickingFetcher {
    fn copy_local(&self, _source: &Url, destination: &Path) -> Result<(), FetchError> {
        fs::write(destination, b"partial download").unwrap();
        self.destinations
            .lock()
            .unwrap()
            .push(destination.to_path_buf());
        panic!("transport crashed mid-copy");
    }
}

#[test]
fn test_scratch_removed_when_fetch_panics() {
    let published = Published::new();
    let location = published.location();

    for policy in [VerificationPolicy::Manifest, VerificationPolicy::Build] {
        let fetcher = Arc::new(PanickingFetcher::default());
        let verifier = build_verifier(policy, &published.keyring, fetcher.clone()).unwrap();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            verifier.verify_hoist_artifact(&mut artifact_stream(), &location)
        }));
        assert!(outcome.is_err(), "{} should propagate the panic", policy);

        let destinations = fetcher.destinations.lock().unwrap();
        assert_eq!(destinations.len(), 1);
        let scratch = destinations[0].parent().unwrap();
        assert!(
            !scratch.exists(),
            "{}: scratch left at {}",
            policy,
            scratch.display()
        );
    }
}

#[test]
fn test_scratch_dirs_removed_on_every_path() {
    let published = Published::new();
    let manifest = format!("artifact_sha: {}\n", sha256_hex_bytes(ARTIFACT));
    let manifest_sig = published.signer.sign(manifest.as_bytes()).to_bytes();
    let location = published.location();

    let mut objects = HashMap::new();
    objects.insert(location.manifest_url().to_string(), manifest.into_bytes());
    objects.insert(
        location.manifest_signature_url().to_string(),
        manifest_sig.to_vec(),
    );
    let fetcher = Arc::new(RecordingFetcher {
        objects,
        ..Default::default()
    });

    let verifier =
        build_verifier(VerificationPolicy::Either, &published.keyring, fetcher.clone()).unwrap();

    // Success via manifest.
    verifier
        .verify_hoist_artifact(&mut artifact_stream(), &location)
        .unwrap();
    // Failure in both strategies.
    let _ = verifier.verify_hoist_artifact(&mut Cursor::new(b"other".to_vec()), &location);

    let calls = fetcher.calls.lock().unwrap();
    assert!(calls.len() >= 3);
    for (url, destination) in calls.iter() {
        let scratch = destination.parent().unwrap();
        assert!(!scratch.exists(), "scratch for {} left at {}", url, scratch.display());
        assert!(scratch
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("artifact_verification"));
    }
}
