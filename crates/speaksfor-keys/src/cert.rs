#![forbid(unsafe_code)]

//! Parsed X.509 certificates with the accessors the credential flow needs:
//! subject/issuer, validity window, RSA public key, SubjectAltName entries,
//! and the `urn:publicid:` tool identity.

use der::{Decode, Encode};
use speaksfor_core::{ns, Error, Result};
use x509_cert::Certificate;

use crate::encode;
use crate::fingerprint;

/// SubjectAltName extension OID.
const OID_SUBJECT_ALT_NAME: &str = "2.5.29.17";

/// One SubjectAltName entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AltName {
    pub kind: AltNameKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AltNameKind {
    Uri,
    Dns,
    Email,
    Other,
}

/// A parsed X.509 certificate retaining its raw DER bytes.
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    der: Vec<u8>,
    cert: Certificate,
}

impl ParsedCertificate {
    /// Parse a DER-encoded certificate.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let cert = Certificate::from_der(der)
            .map_err(|e| Error::Certificate(format!("failed to parse X.509 certificate: {e}")))?;
        Ok(Self {
            der: der.to_vec(),
            cert,
        })
    }

    /// Parse a PEM-encoded certificate (single `CERTIFICATE` block).
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(pem)
            .map_err(|e| Error::Certificate(format!("invalid PEM encoding: {e}")))?;
        let (label, der) = pem_rfc7468::decode_vec(text.trim().as_bytes())
            .map_err(|e| Error::Certificate(format!("failed to decode certificate PEM: {e}")))?;
        if label != "CERTIFICATE" {
            return Err(Error::Certificate(format!(
                "expected CERTIFICATE PEM label, got: {label}"
            )));
        }
        Self::from_der(&der)
    }

    /// Load a certificate from bytes, auto-detecting PEM or DER.
    pub fn load(data: &[u8]) -> Result<Self> {
        if data.starts_with(b"-----BEGIN") {
            Self::from_pem(data)
        } else {
            Self::from_der(data)
        }
    }

    /// The raw DER bytes.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// The certificate re-armored as PEM.
    pub fn to_pem(&self) -> Result<String> {
        encode::der_to_pem("CERTIFICATE", &self.der)
    }

    /// The parsed `x509-cert` structure.
    pub fn inner(&self) -> &Certificate {
        &self.cert
    }

    /// RFC 4514 rendering of the subject name.
    pub fn subject(&self) -> String {
        self.cert.tbs_certificate.subject.to_string()
    }

    /// RFC 4514 rendering of the issuer name.
    pub fn issuer(&self) -> String {
        self.cert.tbs_certificate.issuer.to_string()
    }

    /// DER encoding of the subject name, for issuer matching.
    pub fn subject_der(&self) -> Result<Vec<u8>> {
        self.cert
            .tbs_certificate
            .subject
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode subject: {e}")))
    }

    /// DER encoding of the issuer name.
    pub fn issuer_der(&self) -> Result<Vec<u8>> {
        self.cert
            .tbs_certificate
            .issuer
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode issuer: {e}")))
    }

    pub fn is_self_issued(&self) -> Result<bool> {
        Ok(self.subject_der()? == self.issuer_der()?)
    }

    /// Start of the validity window.
    pub fn not_before(&self) -> der::DateTime {
        self.cert.tbs_certificate.validity.not_before.to_date_time()
    }

    /// End of the validity window.
    pub fn not_after(&self) -> der::DateTime {
        self.cert.tbs_certificate.validity.not_after.to_date_time()
    }

    /// DER encoding of the SubjectPublicKeyInfo.
    pub fn spki_der(&self) -> Result<Vec<u8>> {
        self.cert
            .tbs_certificate
            .subject_public_key_info
            .to_der()
            .map_err(|e| Error::Certificate(format!("failed to encode SPKI: {e}")))
    }

    /// The certificate's RSA public key (n, e).
    pub fn rsa_public_key(&self) -> Result<rsa::RsaPublicKey> {
        use spki::DecodePublicKey;
        let spki_der = self.spki_der()?;
        rsa::RsaPublicKey::from_public_key_der(&spki_der)
            .map_err(|e| Error::Certificate(format!("certificate has no RSA public key: {e}")))
    }

    /// The keyid (ABAC principal identifier) of this certificate's key.
    pub fn keyid(&self) -> Result<String> {
        Ok(fingerprint::keyid_from_spki_der(&self.spki_der()?))
    }

    /// SubjectAltName entries, in certificate order.
    pub fn alt_names(&self) -> Vec<AltName> {
        use x509_cert::ext::pkix::name::GeneralName;
        use x509_cert::ext::pkix::SubjectAltName;

        let Some(extensions) = &self.cert.tbs_certificate.extensions else {
            return Vec::new();
        };
        let mut names = Vec::new();
        for ext in extensions.iter() {
            if ext.extn_id.to_string() != OID_SUBJECT_ALT_NAME {
                continue;
            }
            let Ok(san) = SubjectAltName::from_der(ext.extn_value.as_bytes()) else {
                continue;
            };
            for general_name in san.0 {
                let entry = match general_name {
                    GeneralName::UniformResourceIdentifier(uri) => AltName {
                        kind: AltNameKind::Uri,
                        value: uri.to_string(),
                    },
                    GeneralName::DnsName(dns) => AltName {
                        kind: AltNameKind::Dns,
                        value: dns.to_string(),
                    },
                    GeneralName::Rfc822Name(mail) => AltName {
                        kind: AltNameKind::Email,
                        value: mail.to_string(),
                    },
                    _ => AltName {
                        kind: AltNameKind::Other,
                        value: String::new(),
                    },
                };
                names.push(entry);
            }
        }
        names
    }

    /// The tool's publicId: a URI altName whose value begins `urn:publicid:`.
    pub fn public_id(&self) -> Option<String> {
        self.alt_names().into_iter().find_map(|n| {
            (n.kind == AltNameKind::Uri && n.value.starts_with(ns::PUBLICID_URN_PREFIX))
                .then_some(n.value)
        })
    }
}
