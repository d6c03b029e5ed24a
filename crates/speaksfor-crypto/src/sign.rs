#![forbid(unsafe_code)]

//! Signature algorithm implementations (RSA PKCS#1 v1.5).

use signature::SignatureEncoding;
use speaksfor_core::{algorithm, Error};

/// Key material for signature operations.
pub enum SigningKey {
    Rsa(rsa::RsaPrivateKey),
    RsaPublic(rsa::RsaPublicKey),
}

/// The (signature, digest) URI pair a credential is produced with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureSuite {
    pub signature_uri: &'static str,
    pub digest_uri: &'static str,
}

impl SignatureSuite {
    /// The deployed Fed4FIRE profile.
    pub const RSA_SHA1: Self = Self {
        signature_uri: algorithm::RSA_SHA1,
        digest_uri: algorithm::SHA1,
    };

    /// The successor profile, registered for the transition.
    pub const RSA_SHA256: Self = Self {
        signature_uri: algorithm::RSA_SHA256,
        digest_uri: algorithm::SHA256,
    };
}

impl Default for SignatureSuite {
    fn default() -> Self {
        Self::RSA_SHA1
    }
}

/// Trait for signature algorithms.
pub trait SignatureAlgorithm: Send {
    fn uri(&self) -> &'static str;
    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error>;
    fn verify(&self, key: &SigningKey, data: &[u8], signature: &[u8]) -> Result<bool, Error>;
}

/// Create a signature algorithm from its URI.
pub fn from_uri(uri: &str) -> Result<Box<dyn SignatureAlgorithm>, Error> {
    match uri {
        algorithm::RSA_SHA1 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA1,
            hash: HashType::Sha1,
        })),
        algorithm::RSA_SHA256 => Ok(Box::new(RsaPkcs1v15 {
            uri: algorithm::RSA_SHA256,
            hash: HashType::Sha256,
        })),
        _ => Err(Error::UnsupportedAlgorithm(format!(
            "signature algorithm: {uri}"
        ))),
    }
}

#[derive(Debug, Clone, Copy)]
enum HashType {
    Sha1,
    Sha256,
}

struct RsaPkcs1v15 {
    uri: &'static str,
    hash: HashType,
}

impl RsaPkcs1v15 {
    fn sign_with_key(
        &self,
        private_key: &rsa::RsaPrivateKey,
        data: &[u8],
    ) -> Result<Vec<u8>, Error> {
        use signature::Signer;
        macro_rules! do_sign {
            ($hasher:ty) => {{
                let sk = rsa::pkcs1v15::SigningKey::<$hasher>::new(private_key.clone());
                Ok(sk.sign(data).to_vec())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_sign!(sha1::Sha1),
            HashType::Sha256 => do_sign!(sha2::Sha256),
        }
    }

    fn verify_with_key(
        &self,
        public_key: &rsa::RsaPublicKey,
        data: &[u8],
        sig_bytes: &[u8],
    ) -> Result<bool, Error> {
        use signature::Verifier;
        let sig = rsa::pkcs1v15::Signature::try_from(sig_bytes)
            .map_err(|e| Error::Crypto(format!("invalid RSA signature: {e}")))?;
        macro_rules! do_verify {
            ($hasher:ty) => {{
                let vk = rsa::pkcs1v15::VerifyingKey::<$hasher>::new(public_key.clone());
                Ok(vk.verify(data, &sig).is_ok())
            }};
        }
        match self.hash {
            HashType::Sha1 => do_verify!(sha1::Sha1),
            HashType::Sha256 => do_verify!(sha2::Sha256),
        }
    }
}

impl SignatureAlgorithm for RsaPkcs1v15 {
    fn uri(&self) -> &'static str {
        self.uri
    }

    fn sign(&self, key: &SigningKey, data: &[u8]) -> Result<Vec<u8>, Error> {
        match key {
            SigningKey::Rsa(pk) => self.sign_with_key(pk, data),
            SigningKey::RsaPublic(_) => Err(Error::Key("RSA private key required".into())),
        }
    }

    fn verify(&self, key: &SigningKey, data: &[u8], sig_bytes: &[u8]) -> Result<bool, Error> {
        let public = match key {
            SigningKey::Rsa(pk) => pk.to_public_key(),
            SigningKey::RsaPublic(pk) => pk.clone(),
        };
        self.verify_with_key(&public, data, sig_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> rsa::RsaPrivateKey {
        let mut rng = rand::thread_rng();
        rsa::RsaPrivateKey::new(&mut rng, 2048).unwrap()
    }

    #[test]
    fn sign_verify_round_trip_sha1() {
        let key = test_key();
        let alg = from_uri(algorithm::RSA_SHA1).unwrap();
        let sig = alg.sign(&SigningKey::Rsa(key.clone()), b"payload").unwrap();
        let ok = alg
            .verify(&SigningKey::RsaPublic(key.to_public_key()), b"payload", &sig)
            .unwrap();
        assert!(ok);
        let bad = alg
            .verify(&SigningKey::RsaPublic(key.to_public_key()), b"tampered", &sig)
            .unwrap();
        assert!(!bad);
    }

    #[test]
    fn suites_expose_matching_uris() {
        assert_eq!(SignatureSuite::default().signature_uri, algorithm::RSA_SHA1);
        assert_eq!(SignatureSuite::RSA_SHA256.digest_uri, algorithm::SHA256);
    }
}
