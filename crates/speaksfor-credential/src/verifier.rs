#![forbid(unsafe_code)]

//! The staged credential verification pipeline.
//!
//! Stages run strictly in order; the first failure stops the pipeline and
//! its error kind names the outcome:
//! 1. schema        → `SchemaInvalid`
//! 2. XML signature → `SignatureInvalid`
//! 3. trust chain   → `ChainMalformed` / `ChainNotTrusted` / `ChainExpired`
//! 4. expiration    → `Expired`
//! 5. head binding  → `KeyBindingMismatch`
//! 6. tail binding  → `KeyBindingMismatch` (a warning when nothing to check
//!    against was supplied)
//!
//! The pipeline is a pure function of the credential text, the trust store,
//! the expected tail identity, and the verification instant.

use chrono::{DateTime, Utc};
use speaksfor_core::{Error, Result};
use speaksfor_keys::ParsedCertificate;
use speaksfor_trust::{chain, TrustStore};

use crate::document::SpeaksForDocument;
use crate::schema;

/// What the verifier should require of the ABAC tail.
pub enum TailExpectation {
    /// A tool certificate: its keyid must equal the tail keyid.
    ToolCertificate(ParsedCertificate),
    /// A raw keyid string.
    KeyId(String),
}

/// Outcome of a successful verification.
#[derive(Debug)]
pub struct VerifyReport {
    pub head_keyid: String,
    pub tail_keyid: String,
    pub expires: DateTime<Utc>,
    /// The tool's publicId, when a tool certificate was supplied and
    /// carries one.
    pub tool_public_id: Option<String>,
    pub warnings: Vec<String>,
}

/// Run the verification pipeline over credential XML.
pub fn verify(
    xml: &str,
    store: &TrustStore,
    tail: Option<&TailExpectation>,
    now: DateTime<Utc>,
    debug: bool,
) -> Result<VerifyReport> {
    // Stage 1 — schema.
    let doc = roxmltree::Document::parse_with_options(xml, speaksfor_xml::parsing_options())
        .map_err(|e| Error::SchemaInvalid(format!("credential is not well-formed XML: {e}")))?;
    schema::validate(&doc)?;
    drop(doc);
    if debug {
        eprintln!("== Stage 1 (schema): ok");
    }

    // Stage 2 — XML signature.
    let signature = speaksfor_dsig::verify_enveloped(xml, debug).map_err(|e| match e {
        Error::SignatureInvalid(_) => e,
        other => Error::SignatureInvalid(other.to_string()),
    })?;
    let signing_keyid = signature.signing_certificate.keyid()?;
    if debug {
        eprintln!("== Stage 2 (signature): ok, signing keyid {signing_keyid}");
    }

    // Stage 3 — trust chain.
    chain::verify_chain(
        &signature.chain_pem,
        store,
        chain::datetime_from_unix(now.timestamp())?,
    )?;
    if debug {
        eprintln!("== Stage 3 (trust chain): ok");
    }

    // Stage 4 — expiration.
    let document = SpeaksForDocument::parse(xml)?;
    if now >= document.expires {
        return Err(Error::Expired(format!(
            "credential expired at {}",
            document.expires.to_rfc3339()
        )));
    }
    if debug {
        eprintln!("== Stage 4 (expiration): ok until {}", document.expires.to_rfc3339());
    }

    // Stage 5 — head binding: the ABAC rule must be bound to the signer.
    if document.head_keyid != signing_keyid {
        return Err(Error::KeyBindingMismatch(format!(
            "head keyid {} does not match signing certificate keyid {signing_keyid}",
            document.head_keyid
        )));
    }
    if debug {
        eprintln!("== Stage 5 (head binding): ok");
    }

    // Stage 6 — tail binding, when there is something to check against.
    let mut warnings = Vec::new();
    let mut tool_public_id = None;
    match tail {
        Some(TailExpectation::ToolCertificate(cert)) => {
            let expected = cert.keyid()?;
            if document.tail_keyid != expected {
                return Err(Error::KeyBindingMismatch(format!(
                    "tail keyid {} does not match tool certificate keyid {expected}",
                    document.tail_keyid
                )));
            }
            tool_public_id = cert.public_id();
        }
        Some(TailExpectation::KeyId(expected)) => {
            if &document.tail_keyid != expected {
                return Err(Error::KeyBindingMismatch(format!(
                    "tail keyid {} does not match expected keyid {expected}",
                    document.tail_keyid
                )));
            }
        }
        None => {
            warnings.push(
                "tail keyid not verified: no tool certificate or keyid was provided".to_owned(),
            );
        }
    }
    if debug {
        eprintln!("== Stage 6 (tail binding): done");
    }

    Ok(VerifyReport {
        head_keyid: document.head_keyid,
        tail_keyid: document.tail_keyid,
        expires: document.expires,
        tool_public_id,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_store() -> TrustStore {
        let dir = std::env::temp_dir().join("speaksfor-verifier-empty-ca");
        std::fs::create_dir_all(&dir).unwrap();
        TrustStore::open(&dir).unwrap()
    }

    #[test]
    fn malformed_xml_fails_stage_one() {
        let err = verify("<not-even", &empty_store(), None, Utc::now(), false).unwrap_err();
        assert!(matches!(err, Error::SchemaInvalid(_)), "got: {err}");
    }

    #[test]
    fn unsigned_template_fails_stage_two() {
        let xml = crate::template::render(
            "2099-01-01T00:00:00.000Z",
            &"ab".repeat(20),
            &"cd".repeat(20),
        );
        let err = verify(&xml, &empty_store(), None, Utc::now(), false).unwrap_err();
        assert!(matches!(err, Error::SignatureInvalid(_)), "got: {err}");
    }
}
