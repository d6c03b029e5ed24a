#![forbid(unsafe_code)]

//! Chain evaluation against the trust anchor store.
//!
//! The walk starts at the presented end-entity certificate and climbs
//! issuer by issuer until it reaches a trusted anchor, verifying every
//! signature with the issuer's key. Outcomes are three-valued and mapped
//! onto distinct error kinds:
//! - malformed input → `ChainMalformed`
//! - no path to a trusted anchor → `ChainNotTrusted` ("not trusted")
//! - any expired certificate on the path → `ChainExpired` ("not acceptable")

use der::{Decode, Encode};
use speaksfor_core::{Error, Result};
use speaksfor_keys::{pem, ParsedCertificate};

use crate::store::TrustStore;

const MAX_CHAIN_DEPTH: usize = 10;

/// Evaluate a PEM-armored certificate chain (end-entity first) against the
/// store at the given instant.
pub fn verify_chain(chain_pem: &str, store: &TrustStore, now: der::DateTime) -> Result<()> {
    let chain = parse_chain(chain_pem)?;
    let Some(leaf) = chain.first() else {
        return Err(Error::ChainMalformed("chain holds no certificates".into()));
    };

    // Expiry of any presented certificate is its own outcome, checked
    // before trust so the reason is stable regardless of anchor contents.
    for cert in &chain {
        check_validity_window(cert, now)?;
    }

    let mut current = leaf.clone();
    let mut visited: Vec<Vec<u8>> = vec![leaf.der().to_vec()];

    for _ in 0..MAX_CHAIN_DEPTH {
        let issuer_name = &current.inner().tbs_certificate.issuer;

        // Trusted anchors first.
        let anchors = store.find_issuer_anchors(issuer_name)?;
        for anchor in &anchors {
            if verify_cert_signature(&current, &anchor.cert).is_ok() {
                check_validity_window(&anchor.cert, now)?;
                return Ok(());
            }
        }

        // Otherwise climb to an intermediate presented in the chain.
        let issuer_der = issuer_name
            .to_der()
            .map_err(|e| Error::ChainMalformed(format!("issuer encoding failed: {e}")))?;

        if current.is_self_issued().unwrap_or(false) {
            // Self-signed and not anchored: nowhere further to climb.
            return Err(Error::ChainNotTrusted(
                "self-signed certificate is not a trusted anchor (not trusted)".into(),
            ));
        }

        let next = chain.iter().find(|candidate| {
            !visited.iter().any(|seen| seen == candidate.der())
                && candidate
                    .subject_der()
                    .is_ok_and(|subject| subject == issuer_der)
                && verify_cert_signature(&current, candidate).is_ok()
        });

        match next {
            Some(intermediate) => {
                visited.push(intermediate.der().to_vec());
                current = intermediate.clone();
            }
            None => {
                return Err(Error::ChainNotTrusted(format!(
                    "no trusted path for issuer {} (not trusted)",
                    current.issuer()
                )))
            }
        }
    }

    Err(Error::ChainNotTrusted(
        "certificate chain too long (not trusted)".into(),
    ))
}

fn parse_chain(chain_pem: &str) -> Result<Vec<ParsedCertificate>> {
    let regions = pem::scan_regions(chain_pem)
        .map_err(|e| Error::ChainMalformed(format!("chain is not valid PEM: {e}")))?;
    let mut chain = Vec::new();
    for region in regions {
        if region.label != "CERTIFICATE" {
            continue;
        }
        let der = region
            .decode()
            .map_err(|e| Error::ChainMalformed(format!("chain certificate: {e}")))?;
        let cert = ParsedCertificate::from_der(&der)
            .map_err(|e| Error::ChainMalformed(format!("chain certificate: {e}")))?;
        chain.push(cert);
    }
    Ok(chain)
}

fn check_validity_window(cert: &ParsedCertificate, now: der::DateTime) -> Result<()> {
    if now < cert.not_before() {
        return Err(Error::ChainExpired(format!(
            "certificate {} is not yet valid (not acceptable)",
            cert.subject()
        )));
    }
    if now > cert.not_after() {
        return Err(Error::ChainExpired(format!(
            "certificate {} has expired (not acceptable)",
            cert.subject()
        )));
    }
    Ok(())
}

/// Verify `cert`'s signature with `issuer`'s public key.
fn verify_cert_signature(cert: &ParsedCertificate, issuer: &ParsedCertificate) -> Result<()> {
    let tbs_der = cert
        .inner()
        .tbs_certificate
        .to_der()
        .map_err(|e| Error::Certificate(format!("failed to encode TBS: {e}")))?;
    let sig_bytes = cert
        .inner()
        .signature
        .as_bytes()
        .ok_or_else(|| Error::Certificate("certificate has no signature bytes".into()))?;
    let spki_der = issuer.spki_der()?;

    // RSA PKCS#1 v1.5 signature OIDs
    const MD5_RSA: &str = "1.2.840.113549.1.1.4";
    const SHA1_RSA: &str = "1.2.840.113549.1.1.5";
    const SHA224_RSA: &str = "1.2.840.113549.1.1.14";
    const SHA256_RSA: &str = "1.2.840.113549.1.1.11";
    const SHA384_RSA: &str = "1.2.840.113549.1.1.12";
    const SHA512_RSA: &str = "1.2.840.113549.1.1.13";

    let oid = cert.inner().signature_algorithm.oid.to_string();
    match oid.as_str() {
        SHA1_RSA => verify_rsa_signature::<sha1::Sha1>(&spki_der, &tbs_der, sig_bytes),
        SHA224_RSA => verify_rsa_signature::<sha2::Sha224>(&spki_der, &tbs_der, sig_bytes),
        SHA256_RSA => verify_rsa_signature::<sha2::Sha256>(&spki_der, &tbs_der, sig_bytes),
        SHA384_RSA => verify_rsa_signature::<sha2::Sha384>(&spki_der, &tbs_der, sig_bytes),
        SHA512_RSA => verify_rsa_signature::<sha2::Sha512>(&spki_der, &tbs_der, sig_bytes),
        MD5_RSA => Err(Error::Certificate(
            "md5WithRSAEncryption is not accepted".into(),
        )),
        other => Err(Error::Certificate(format!(
            "unsupported certificate signature algorithm: {other}"
        ))),
    }
}

fn verify_rsa_signature<D>(issuer_spki_der: &[u8], tbs_der: &[u8], signature: &[u8]) -> Result<()>
where
    D: digest::Digest + digest::const_oid::AssociatedOid,
{
    use signature::Verifier;
    use spki::DecodePublicKey;

    let public_key = rsa::RsaPublicKey::from_public_key_der(issuer_spki_der)
        .map_err(|e| Error::Certificate(format!("issuer has no RSA public key: {e}")))?;
    let verifying_key = rsa::pkcs1v15::VerifyingKey::<D>::new(public_key);
    let sig = rsa::pkcs1v15::Signature::try_from(signature)
        .map_err(|e| Error::Certificate(format!("invalid RSA signature: {e}")))?;
    verifying_key
        .verify(tbs_der, &sig)
        .map_err(|e| Error::Certificate(format!("certificate signature check failed: {e}")))
}

/// Convert a Unix timestamp to the DER time type used for window checks.
pub fn datetime_from_unix(secs: i64) -> Result<der::DateTime> {
    if secs < 0 {
        return Err(Error::Other("timestamps before 1970 are not supported".into()));
    }
    der::DateTime::from_unix_duration(std::time::Duration::from_secs(secs as u64))
        .map_err(|e| Error::Other(format!("time conversion failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::TrustStore;

    fn fixture_text(name: &str) -> Option<String> {
        let path = std::path::Path::new("../../test-data").join(name);
        if !path.exists() {
            eprintln!("skipping test: {} not found", path.display());
            return None;
        }
        Some(std::fs::read_to_string(path).unwrap())
    }

    fn now() -> der::DateTime {
        let secs = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as i64;
        datetime_from_unix(secs).unwrap()
    }

    #[test]
    fn fixture_chain_is_trusted() {
        let Some(chain) = fixture_text("user-chain.pem") else { return };
        let dir = std::path::Path::new("../../test-data/ca-dir");
        if !dir.exists() {
            return;
        }
        let store = TrustStore::open(dir).unwrap();
        verify_chain(&chain, &store, now()).unwrap();
    }

    #[test]
    fn empty_store_rejects_chain_as_untrusted() {
        let Some(chain) = fixture_text("user-chain.pem") else { return };
        let dir = std::env::temp_dir().join("speaksfor-empty-ca-chain-test");
        std::fs::create_dir_all(&dir).unwrap();
        let store = TrustStore::open(&dir).unwrap();
        let err = verify_chain(&chain, &store, now()).unwrap_err();
        assert!(matches!(err, Error::ChainNotTrusted(_)), "got: {err}");
    }

    #[test]
    fn garbage_chain_is_malformed() {
        let dir = std::env::temp_dir().join("speaksfor-empty-ca-chain-test");
        std::fs::create_dir_all(&dir).unwrap();
        let store = TrustStore::open(&dir).unwrap();
        let err = verify_chain("not pem at all", &store, now()).unwrap_err();
        assert!(matches!(err, Error::ChainMalformed(_)), "got: {err}");
    }

    #[test]
    fn future_clock_reports_expiry_distinctly() {
        let Some(chain) = fixture_text("user-chain.pem") else { return };
        let dir = std::path::Path::new("../../test-data/ca-dir");
        if !dir.exists() {
            return;
        }
        let store = TrustStore::open(dir).unwrap();
        // Far beyond any fixture validity window.
        let far_future = datetime_from_unix(4102444800).unwrap(); // 2100-01-01
        let err = verify_chain(&chain, &store, far_future).unwrap_err();
        assert!(matches!(err, Error::ChainExpired(_)), "got: {err}");
    }
}
