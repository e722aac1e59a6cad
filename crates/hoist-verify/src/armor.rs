//! ASCII armor for detached signatures.
//!
//! The envelope is the OpenPGP textual armor:
//!
//! ```text
//! -----BEGIN HOIST SIGNATURE-----
//! Comment: optional headers
//!
//! <base64 body, wrapped>
//! =<base64 CRC-24>
//! -----END HOIST SIGNATURE-----
//! ```
//!
//! Headers and the checksum line are optional when decoding. Any label is
//! accepted as long as BEGIN and END agree.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Label written by [`encode`] for detached signatures.
pub const SIGNATURE_LABEL: &str = "HOIST SIGNATURE";

const BEGIN_PREFIX: &str = "-----BEGIN ";
const END_PREFIX: &str = "-----END ";
const DASHES: &str = "-----";
const LINE_WIDTH: usize = 64;

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// Armor decoding errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArmorError {
    #[error("armor is not valid UTF-8")]
    NotText,

    #[error("missing BEGIN line")]
    MissingBegin,

    #[error("missing END line for '{label}'")]
    MissingEnd { label: String },

    #[error("END label '{found}' does not match BEGIN label '{expected}'")]
    LabelMismatch { expected: String, found: String },

    #[error("invalid base64 body: {0}")]
    Body(String),

    #[error("invalid checksum line: {0}")]
    Checksum(String),

    #[error("checksum mismatch: armor declares {declared:06x}, body is {computed:06x}")]
    ChecksumMismatch { declared: u32, computed: u32 },
}

/// Decoded armor block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Armored {
    pub label: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

/// Whether `bytes` starts (after whitespace) with an armor BEGIN line.
pub fn is_armored(bytes: &[u8]) -> bool {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes[start..].starts_with(BEGIN_PREFIX.as_bytes())
}

/// Decode the first armor block in `bytes`.
pub fn decode(bytes: &[u8]) -> Result<Armored, ArmorError> {
    let text = std::str::from_utf8(bytes).map_err(|_| ArmorError::NotText)?;
    let mut lines = text
        .lines()
        .map(|l| l.trim_end_matches('\r').trim_end())
        .skip_while(|l| l.trim().is_empty());

    let label = lines
        .next()
        .and_then(|l| parse_delimiter(l.trim_start(), BEGIN_PREFIX))
        .ok_or(ArmorError::MissingBegin)?;

    let mut headers = Vec::new();
    let mut body_b64 = String::new();
    let mut checksum: Option<&str> = None;
    let mut in_headers = true;
    let mut closed = false;

    for line in lines {
        if let Some(end_label) = parse_delimiter(line.trim_start(), END_PREFIX) {
            if end_label != label {
                return Err(ArmorError::LabelMismatch {
                    expected: label,
                    found: end_label,
                });
            }
            closed = true;
            break;
        }

        if in_headers {
            if line.is_empty() {
                in_headers = false;
                continue;
            }
            // Base64 never contains ':', so a colon marks a header line.
            if let Some((key, value)) = line.split_once(':') {
                headers.push((key.trim().to_string(), value.trim().to_string()));
                continue;
            }
            in_headers = false;
        }

        if let Some(crc) = line.trim_start().strip_prefix('=') {
            checksum = Some(crc);
        } else if checksum.is_none() {
            body_b64.push_str(line.trim());
        }
    }

    if !closed {
        return Err(ArmorError::MissingEnd { label });
    }

    let body = BASE64
        .decode(body_b64.as_bytes())
        .map_err(|e| ArmorError::Body(e.to_string()))?;

    if let Some(crc) = checksum {
        let declared = decode_checksum(crc)?;
        let computed = crc24(&body);
        if declared != computed {
            return Err(ArmorError::ChecksumMismatch { declared, computed });
        }
    }

    Ok(Armored {
        label,
        headers,
        body,
    })
}

/// Wrap `data` in an armor block with a CRC-24 checksum line.
pub fn encode(label: &str, data: &[u8]) -> String {
    let body = BASE64.encode(data);
    let mut out = String::with_capacity(body.len() + 2 * label.len() + 64);

    out.push_str(BEGIN_PREFIX);
    out.push_str(label);
    out.push_str(DASHES);
    out.push_str("\n\n");

    // Base64 output is ASCII, so byte chunks are valid str boundaries.
    for chunk in body.as_bytes().chunks(LINE_WIDTH) {
        out.push_str(&String::from_utf8_lossy(chunk));
        out.push('\n');
    }

    let crc = crc24(data).to_be_bytes();
    out.push('=');
    out.push_str(&BASE64.encode(&crc[1..]));
    out.push('\n');

    out.push_str(END_PREFIX);
    out.push_str(label);
    out.push_str(DASHES);
    out.push('\n');
    out
}

fn parse_delimiter(line: &str, prefix: &str) -> Option<String> {
    line.strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(DASHES))
        .map(|label| label.to_string())
}

fn decode_checksum(line: &str) -> Result<u32, ArmorError> {
    let bytes = BASE64
        .decode(line.trim())
        .map_err(|e| ArmorError::Checksum(e.to_string()))?;
    if bytes.len() != 3 {
        return Err(ArmorError::Checksum(format!(
            "expected 3 bytes, got {}",
            bytes.len()
        )));
    }
    Ok(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
}

/// CRC-24 as used by OpenPGP armor.
fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for &byte in data {
        crc ^= u32::from(byte) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}
