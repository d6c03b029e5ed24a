#![forbid(unsafe_code)]

//! Public-key fingerprints ("keyids").
//!
//! A keyid is the lowercase hex SHA-1 digest of the DER-encoded
//! SubjectPublicKeyInfo, matching what the deployed Fed4FIRE producers
//! compute (`openssl x509 -pubkey | openssl rsa -pubin -outform DER | sha1`).
//! It doubles as the ABAC principal identifier.

use sha1::{Digest, Sha1};
use speaksfor_core::{Error, Result};
use spki::EncodePublicKey;

/// Fingerprint raw SubjectPublicKeyInfo DER bytes.
pub fn keyid_from_spki_der(spki_der: &[u8]) -> String {
    hex::encode(Sha1::digest(spki_der))
}

/// Fingerprint an RSA public key.
pub fn keyid_of_public_key(key: &rsa::RsaPublicKey) -> Result<String> {
    let doc = key
        .to_public_key_der()
        .map_err(|e| Error::Key(format!("failed to encode SubjectPublicKeyInfo: {e}")))?;
    Ok(keyid_from_spki_der(doc.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyid_is_lowercase_hex_sha1() {
        // SHA-1 of the byte string "spki" — the function hashes whatever DER
        // it is handed, so a plain vector pins the digest and formatting.
        let id = keyid_from_spki_der(b"spki");
        assert_eq!(id, "0dde1c6816de56064dcd24e2a8ec8838f9c44432");
        assert_eq!(id.len(), 40);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()));
    }
}
