#![forbid(unsafe_code)]

//! The structured view of a parsed speaks-for credential.

use chrono::{DateTime, Utc};
use speaksfor_core::{ns, Error, Result};
use speaksfor_keys::keyinfo::KeyInfoExtractor;
use speaksfor_xml::dom;

/// Owned fields extracted from a credential document: the validity bound,
/// the ABAC head (user) and tail (tool) keyids, and the certificate chain
/// carried in the signature's `X509Data`.
#[derive(Debug)]
pub struct SpeaksForDocument {
    pub expires: DateTime<Utc>,
    pub head_keyid: String,
    pub tail_keyid: String,
    pub signing_chain_der: Vec<Vec<u8>>,
}

impl SpeaksForDocument {
    /// Extract the structured view from credential XML. Runs after the
    /// schema stage, so missing pieces are structural errors rather than
    /// schema reports.
    pub fn parse(xml: &str) -> Result<Self> {
        let doc = roxmltree::Document::parse_with_options(xml, speaksfor_xml::parsing_options())
            .map_err(|e| Error::XmlParse(e.to_string()))?;
        let root = doc.root_element();

        let credential = dom::find_child_element(root, "", ns::cred::CREDENTIAL)
            .ok_or_else(|| Error::MissingElement("credential".into()))?;

        let expires_text = dom::child_text(credential, "", ns::cred::EXPIRES)
            .ok_or_else(|| Error::MissingElement("expires".into()))?;
        let expires = DateTime::parse_from_rfc3339(expires_text)
            .map_err(|e| Error::XmlStructure(format!("expires {expires_text}: {e}")))?
            .with_timezone(&Utc);

        let abac = dom::find_child_element(credential, "", ns::cred::ABAC)
            .ok_or_else(|| Error::MissingElement("abac".into()))?;
        let rt0 = dom::find_child_element(abac, "", ns::cred::RT0)
            .ok_or_else(|| Error::MissingElement("rt0".into()))?;

        let head_keyid = principal_keyid(rt0, ns::cred::HEAD)?;
        let tail_keyid = principal_keyid(rt0, ns::cred::TAIL)?;

        let signing_chain_der = root
            .children()
            .find(|n| n.is_element() && n.tag_name().name() == ns::cred::SIGNATURES)
            .and_then(|signatures| {
                dom::find_child_element(signatures, ns::DSIG, ns::node::SIGNATURE)
            })
            .map(|sig| KeyInfoExtractor::from_signature_node(sig).map(|e| e.chain_der().to_vec()))
            .transpose()?
            .unwrap_or_default();

        Ok(Self {
            expires,
            head_keyid,
            tail_keyid,
            signing_chain_der,
        })
    }
}

fn principal_keyid(rt0: roxmltree::Node<'_, '_>, which: &str) -> Result<String> {
    let end = dom::find_child_element(rt0, "", which)
        .ok_or_else(|| Error::MissingElement(which.into()))?;
    let principal = dom::find_child_element(end, "", ns::cred::ABAC_PRINCIPAL)
        .ok_or_else(|| Error::MissingElement(format!("{which}/ABACprincipal")))?;
    dom::child_text(principal, "", ns::cred::KEYID)
        .map(str::to_owned)
        .ok_or_else(|| Error::MissingElement(format!("{which} keyid")))
}
