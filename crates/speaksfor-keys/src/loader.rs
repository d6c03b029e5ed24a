#![forbid(unsafe_code)]

//! Credential bundle loading from PEM and PKCS#12 blobs.

use pkcs1::DecodeRsaPrivateKey;
use pkcs8::DecodePrivateKey;
use speaksfor_core::{Error, Result};

use crate::bundle::CredentialBundle;
use crate::cert::ParsedCertificate;
use crate::pem;

/// Reason reported whenever an encrypted key cannot be decrypted.
pub const BAD_PASSWORD: &str = "Private key decryption failed. Invalid password?";

/// Input format hint for the signer blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyFormat {
    Pem,
    Pkcs12,
}

impl KeyFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pem" => Ok(Self::Pem),
            "p12" | "pkcs12" | "pfx" => Ok(Self::Pkcs12),
            other => Err(Error::InputParse(format!("unknown key format: {other}"))),
        }
    }
}

/// Load a credential bundle from a byte blob.
pub fn load_bundle(
    data: &[u8],
    format: KeyFormat,
    password: Option<&str>,
) -> Result<CredentialBundle> {
    match format {
        KeyFormat::Pem => load_pem_bundle(data, password),
        KeyFormat::Pkcs12 => load_pkcs12_bundle(data, password.unwrap_or("")),
    }
}

/// Load from a PEM blob holding exactly one private-key region and the
/// certificate chain in file order.
fn load_pem_bundle(data: &[u8], password: Option<&str>) -> Result<CredentialBundle> {
    let text = std::str::from_utf8(data)
        .map_err(|e| Error::InputParse(format!("invalid PEM encoding: {e}")))?;
    let regions = pem::scan_regions(text)?;

    let mut key_regions = Vec::new();
    let mut chain = Vec::new();
    for region in &regions {
        match region.label.as_str() {
            "RSA PRIVATE KEY" | "PRIVATE KEY" | "ENCRYPTED PRIVATE KEY" => {
                key_regions.push(region)
            }
            "CERTIFICATE" => chain.push(ParsedCertificate::from_der(&region.decode()?)?),
            _ => {}
        }
    }

    let key_region = match key_regions.len() {
        0 => return Err(Error::InputParse("no private key found in PEM input".into())),
        1 => key_regions[0],
        n => {
            return Err(Error::KeyAmbiguity(format!(
                "PEM input contains {n} private keys, expected exactly one"
            )))
        }
    };

    let key = decode_key_region(key_region, password)?;
    CredentialBundle::new(key, chain)
}

fn decode_key_region(
    region: &pem::PemRegion,
    password: Option<&str>,
) -> Result<rsa::RsaPrivateKey> {
    match region.label.as_str() {
        "RSA PRIVATE KEY" => {
            if region.is_encrypted() {
                let password = match password {
                    Some(p) if !p.is_empty() => p,
                    _ => return Err(Error::KeyDecryption(BAD_PASSWORD.into())),
                };
                let der = region.decrypt_legacy(password, BAD_PASSWORD)?;
                rsa::RsaPrivateKey::from_pkcs1_der(&der)
                    .map_err(|_| Error::KeyDecryption(BAD_PASSWORD.into()))
            } else {
                rsa::RsaPrivateKey::from_pkcs1_der(&region.decode()?)
                    .map_err(|e| Error::InputParse(format!("invalid PKCS#1 private key: {e}")))
            }
        }
        "PRIVATE KEY" => rsa::RsaPrivateKey::from_pkcs8_der(&region.decode()?)
            .map_err(|e| Error::InputParse(format!("invalid PKCS#8 private key: {e}"))),
        "ENCRYPTED PRIVATE KEY" => {
            let password = match password {
                Some(p) if !p.is_empty() => p,
                _ => return Err(Error::KeyDecryption(BAD_PASSWORD.into())),
            };
            let der = region.decode()?;
            use pkcs8::der::Decode;
            let encrypted = pkcs8::EncryptedPrivateKeyInfo::from_der(&der)
                .map_err(|e| Error::InputParse(format!("invalid encrypted PKCS#8: {e}")))?;
            let document = encrypted
                .decrypt(password)
                .map_err(|_| Error::KeyDecryption(BAD_PASSWORD.into()))?;
            rsa::RsaPrivateKey::from_pkcs8_der(document.as_bytes())
                .map_err(|_| Error::KeyDecryption(BAD_PASSWORD.into()))
        }
        other => Err(Error::InputParse(format!("unexpected key label: {other}"))),
    }
}

/// Load from a PKCS#12 container. The chain keeps bag encounter order except
/// that the certificate matching the private key is moved to the front.
fn load_pkcs12_bundle(data: &[u8], password: &str) -> Result<CredentialBundle> {
    let contents = speaksfor_pkcs12::parse_pkcs12(data, password)?;

    let key_der = match contents.private_keys.len() {
        0 => return Err(Error::InputParse("PKCS#12 contains no private key".into())),
        1 => &contents.private_keys[0],
        n => {
            return Err(Error::KeyAmbiguity(format!(
                "PKCS#12 contains {n} private keys, expected exactly one"
            )))
        }
    };

    let key = rsa::RsaPrivateKey::from_pkcs8_der(key_der)
        .map_err(|e| Error::InputParse(format!("invalid PKCS#8 private key: {e}")))?;

    let mut chain = Vec::with_capacity(contents.certificates.len());
    for der in &contents.certificates {
        chain.push(ParsedCertificate::from_der(der)?);
    }

    // PKCS#12 bag order is not guaranteed to lead with the end-entity
    // certificate; locate it by key fingerprint.
    let key_id = crate::fingerprint::keyid_of_public_key(&key.to_public_key())?;
    if let Some(pos) = chain
        .iter()
        .position(|c| c.keyid().is_ok_and(|id| id == key_id))
    {
        let end_entity = chain.remove(pos);
        chain.insert(0, end_entity);
    }

    CredentialBundle::new(key, chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> Option<Vec<u8>> {
        let path = std::path::Path::new("../../test-data").join(name);
        if !path.exists() {
            eprintln!("skipping test: {} not found", path.display());
            return None;
        }
        Some(std::fs::read(path).unwrap())
    }

    #[test]
    fn loads_plain_pem_bundle() {
        let Some(data) = fixture("user.pem") else { return };
        let bundle = load_bundle(&data, KeyFormat::Pem, None).unwrap();
        assert!(bundle.chain().len() >= 2, "expected user + CA certificates");
        assert_eq!(bundle.user_keyid().unwrap().len(), 40);
    }

    #[test]
    fn loads_legacy_encrypted_pem_bundle() {
        let Some(data) = fixture("user-encrypted.pem") else { return };
        let bundle = load_bundle(&data, KeyFormat::Pem, Some("123456")).unwrap();
        assert_eq!(bundle.user_keyid().unwrap().len(), 40);
    }

    #[test]
    fn empty_password_against_encrypted_key_fails() {
        let Some(data) = fixture("user-encrypted.pem") else { return };
        let err = load_bundle(&data, KeyFormat::Pem, Some("")).unwrap_err();
        match err {
            Error::KeyDecryption(reason) => assert_eq!(reason, BAD_PASSWORD),
            other => panic!("expected KeyDecryption, got: {other}"),
        }
    }

    #[test]
    fn wrong_password_against_encrypted_key_fails() {
        let Some(data) = fixture("user-encrypted.pem") else { return };
        let err = load_bundle(&data, KeyFormat::Pem, Some("nope")).unwrap_err();
        assert!(matches!(err, Error::KeyDecryption(_)), "got: {err}");
    }

    #[test]
    fn loads_pkcs12_bundle() {
        let Some(data) = fixture("user.p12") else { return };
        let bundle = load_bundle(&data, KeyFormat::Pkcs12, Some("123456")).unwrap();
        assert!(!bundle.chain().is_empty());
        // chain[0] must match the private key regardless of bag order
        assert_eq!(
            bundle.user_keyid().unwrap(),
            crate::fingerprint::keyid_of_public_key(&bundle.public_key()).unwrap()
        );
    }

    #[test]
    fn pem_and_pkcs12_agree_on_keyid() {
        let (Some(pem), Some(p12)) = (fixture("user.pem"), fixture("user.p12")) else {
            return;
        };
        let a = load_bundle(&pem, KeyFormat::Pem, None).unwrap();
        let b = load_bundle(&p12, KeyFormat::Pkcs12, Some("123456")).unwrap();
        assert_eq!(a.user_keyid().unwrap(), b.user_keyid().unwrap());
    }

    #[test]
    fn two_keys_in_one_pem_is_ambiguous() {
        let Some(data) = fixture("user.pem") else { return };
        let text = String::from_utf8(data).unwrap();
        let key_block: String = {
            let start = text.find("-----BEGIN").unwrap();
            let end_marker = "-----END PRIVATE KEY-----";
            let end = text.find(end_marker).unwrap() + end_marker.len();
            text[start..end].to_owned()
        };
        let doubled = format!("{key_block}\n{text}");
        let err = load_bundle(doubled.as_bytes(), KeyFormat::Pem, None).unwrap_err();
        assert!(matches!(err, Error::KeyAmbiguity(_)), "got: {err}");
    }
}
