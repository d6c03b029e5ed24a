#![forbid(unsafe_code)]

//! The credential bundle: one RSA signing key plus its certificate chain.

use speaksfor_core::{Error, Result};

use crate::cert::ParsedCertificate;
use crate::fingerprint;

/// An owned private signing key and the ordered certificate chain whose
/// first element is the end-entity certificate matching that key.
#[derive(Debug)]
pub struct CredentialBundle {
    key: rsa::RsaPrivateKey,
    chain: Vec<ParsedCertificate>,
}

impl CredentialBundle {
    /// Assemble a bundle, enforcing `publicKey(chain[0]) ≡ publicKey(key)`.
    pub fn new(key: rsa::RsaPrivateKey, chain: Vec<ParsedCertificate>) -> Result<Self> {
        let Some(end_entity) = chain.first() else {
            return Err(Error::InputParse(
                "credential has no certificate for the signing key".into(),
            ));
        };
        let key_id = fingerprint::keyid_of_public_key(&key.to_public_key())?;
        let cert_id = end_entity.keyid()?;
        if key_id != cert_id {
            return Err(Error::Key(
                "private key does not match the end-entity certificate".into(),
            ));
        }
        Ok(Self { key, chain })
    }

    /// The private signing key.
    pub fn private_key(&self) -> &rsa::RsaPrivateKey {
        &self.key
    }

    /// The signing public key.
    pub fn public_key(&self) -> rsa::RsaPublicKey {
        self.key.to_public_key()
    }

    /// The certificate chain, end-entity first.
    pub fn chain(&self) -> &[ParsedCertificate] {
        &self.chain
    }

    /// The end-entity certificate.
    pub fn end_entity(&self) -> &ParsedCertificate {
        &self.chain[0]
    }

    /// The user keyid (ABAC head principal).
    pub fn user_keyid(&self) -> Result<String> {
        self.end_entity().keyid()
    }

    /// The whole chain as concatenated PEM text.
    pub fn chain_pem(&self) -> Result<String> {
        let mut out = String::new();
        for cert in &self.chain {
            out.push_str(&cert.to_pem()?);
        }
        Ok(out)
    }
}
