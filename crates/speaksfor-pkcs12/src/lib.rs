#![forbid(unsafe_code)]

//! PKCS#12 (.p12/.pfx) parser for the speaksfor toolkit.
//!
//! Supports both legacy PBE (SHA-1 + 3DES-CBC) and modern PBES2
//! (PBKDF2 + AES-256-CBC) encryption as used by OpenSSL 3.x.
//!
//! A speaks-for signing credential holds exactly one key pair, so every
//! `localKeyId` bag attribute present in the container must carry the same
//! value; divergence is rejected during parsing.

mod kdf;
mod parse;

use speaksfor_core::Error;

/// Contents extracted from a PKCS#12 file.
#[derive(Debug)]
pub struct Pkcs12Contents {
    /// PKCS#8 DER-encoded private keys.
    pub private_keys: Vec<Vec<u8>>,
    /// DER-encoded X.509 certificates, in encounter order.
    pub certificates: Vec<Vec<u8>>,
    /// The shared `localKeyId` of the container, lowercase hex, if any bag
    /// carried one.
    pub key_id: Option<String>,
}

/// Parse a PKCS#12 file, decrypting with the given password.
pub fn parse_pkcs12(data: &[u8], password: &str) -> Result<Pkcs12Contents, Error> {
    parse::parse_pfx(data, password)
}
