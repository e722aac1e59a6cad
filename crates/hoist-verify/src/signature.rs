//! Detached signature checks shared by both verification strategies.

use crate::armor;
use crate::error::{VerifyError, VerifyResult};
use crate::keyring::{Keyring, TrustedKey};

/// Verify that `signature` over `signed_bytes` was made by a key in
/// `keyring`. The signature may be raw or ASCII-armored; the encoding is
/// detected from the bytes. Returns the signing key.
pub fn verify_signed<'k>(
    keyring: &'k Keyring,
    signed_bytes: &[u8],
    signature: &[u8],
) -> VerifyResult<&'k TrustedKey> {
    let unwrapped;
    let signature = if armor::is_armored(signature) {
        unwrapped = armor::decode(signature).map_err(|e| {
            VerifyError::signature_invalid(format!(
                "discovered an armored signature but could not read the body: {}",
                e
            ))
        })?;
        unwrapped.body.as_slice()
    } else {
        signature
    };

    keyring
        .check_detached_signature(signed_bytes, signature)
        .map_err(|e| {
            VerifyError::signature_invalid(format!(
                "could not verify data against the signature: {}",
                e
            ))
        })
}
