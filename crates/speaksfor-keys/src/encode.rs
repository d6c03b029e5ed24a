#![forbid(unsafe_code)]

//! Byte encodings used inside the credential XML.

use base64::Engine;
use speaksfor_core::{Error, Result};

/// Column at which XML-DSig base64 values wrap.
const WRAP_COLUMN: usize = 64;

/// Encode a big-endian magnitude as an unambiguously non-negative
/// two's-complement byte sequence: a leading `0x00` is prepended when the
/// high bit of the first byte is set.
pub fn positive_int_bytes(magnitude_be: &[u8]) -> Vec<u8> {
    // Strip any redundant leading zeros before deciding on the sign byte.
    let first = magnitude_be
        .iter()
        .position(|&b| b != 0)
        .unwrap_or(magnitude_be.len().saturating_sub(1));
    let trimmed = &magnitude_be[first..];
    if trimmed.first().is_some_and(|&b| b & 0x80 != 0) {
        let mut out = Vec::with_capacity(trimmed.len() + 1);
        out.push(0x00);
        out.extend_from_slice(trimmed);
        out
    } else {
        trimmed.to_vec()
    }
}

/// Base64-encode `data` wrapped at column 64 with `\n` separators only.
pub fn wrap_base64(data: &[u8]) -> String {
    let b64 = base64::engine::general_purpose::STANDARD.encode(data);
    let mut out = String::with_capacity(b64.len() + b64.len() / WRAP_COLUMN + 1);
    let bytes = b64.as_bytes();
    for (i, chunk) in bytes.chunks(WRAP_COLUMN).enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(std::str::from_utf8(chunk).expect("base64 is ASCII"));
    }
    out
}

/// Extract the base64 body of a PEM certificate for embedding in
/// `X509Certificate`: drop every armor line (those beginning `-----`),
/// normalize line endings to LF, and trim surrounding whitespace.
pub fn pem_body(pem: &str) -> String {
    let normalized = pem.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("-----"))
        .collect();
    lines.join("\n")
}

/// Wrap DER bytes into PEM armor with LF line endings.
pub fn der_to_pem(label: &str, der: &[u8]) -> Result<String> {
    pem_rfc7468::encode_string(label, pem_rfc7468::LineEnding::LF, der)
        .map_err(|e| Error::Other(format!("PEM encoding failed: {e}")))
}
