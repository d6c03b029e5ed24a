#![forbid(unsafe_code)]

//! Stage 1: structural validation of the credential document.
//!
//! The checks encode the rules of the credential schema directly: required
//! elements and nesting, the abac/rt0 shape, keyid text, a parseable
//! `expires` instant, and the presence of the `signatures` container.
//! Anything the schema would reject is reported as `SchemaInvalid` before
//! any cryptographic work happens.

use speaksfor_core::{ns, Error, Result};
use speaksfor_xml::dom;

/// Validate the credential document structure.
pub fn validate(doc: &roxmltree::Document<'_>) -> Result<()> {
    let root = doc.root_element();
    if root.tag_name().name() != ns::cred::SIGNED_CREDENTIAL {
        return Err(schema_err(format!(
            "root element must be {}, found {}",
            ns::cred::SIGNED_CREDENTIAL,
            root.tag_name().name()
        )));
    }

    let credential = dom::find_child_element(root, "", ns::cred::CREDENTIAL)
        .ok_or_else(|| schema_err("missing credential element".into()))?;

    // The reference anchor: id and/or xml:id must be present.
    let id = credential
        .attribute("id")
        .or_else(|| credential.attribute((ns::XML, "id")));
    if !id.is_some_and(|v| !v.is_empty()) {
        return Err(schema_err("credential element carries no id".into()));
    }

    let cred_type = dom::child_text(credential, "", ns::cred::TYPE)
        .ok_or_else(|| schema_err("missing credential type".into()))?;
    if cred_type != ns::cred::TYPE_ABAC {
        return Err(schema_err(format!(
            "credential type must be {}, found {cred_type}",
            ns::cred::TYPE_ABAC
        )));
    }

    let expires = dom::child_text(credential, "", ns::cred::EXPIRES)
        .ok_or_else(|| schema_err("missing expires element".into()))?;
    if chrono::DateTime::parse_from_rfc3339(expires).is_err() {
        return Err(schema_err(format!(
            "expires is not an ISO-8601 instant: {expires}"
        )));
    }

    let abac = dom::find_child_element(credential, "", ns::cred::ABAC)
        .ok_or_else(|| schema_err("missing abac element".into()))?;
    let rt0 = dom::find_child_element(abac, "", ns::cred::RT0)
        .ok_or_else(|| schema_err("missing rt0 element".into()))?;

    let head = dom::find_child_element(rt0, "", ns::cred::HEAD)
        .ok_or_else(|| schema_err("missing head element".into()))?;
    check_principal_keyid(head, ns::cred::HEAD)?;
    if !dom::child_text(head, "", ns::cred::ROLE).is_some_and(|r| !r.is_empty()) {
        return Err(schema_err("head carries no role".into()));
    }

    let tail = dom::find_child_element(rt0, "", ns::cred::TAIL)
        .ok_or_else(|| schema_err("missing tail element".into()))?;
    check_principal_keyid(tail, ns::cred::TAIL)?;

    if dom::find_child_element(root, "", ns::cred::SIGNATURES).is_none() {
        return Err(schema_err("missing signatures element".into()));
    }

    Ok(())
}

fn check_principal_keyid(end: roxmltree::Node<'_, '_>, which: &str) -> Result<()> {
    let principal = dom::find_child_element(end, "", ns::cred::ABAC_PRINCIPAL)
        .ok_or_else(|| schema_err(format!("{which} carries no ABACprincipal")))?;
    let keyid = dom::child_text(principal, "", ns::cred::KEYID)
        .ok_or_else(|| schema_err(format!("{which} principal carries no keyid")))?;
    if keyid.is_empty() || !keyid.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase()) {
        return Err(schema_err(format!(
            "{which} keyid is not lowercase hex: {keyid}"
        )));
    }
    Ok(())
}

fn schema_err(reason: String) -> Error {
    Error::SchemaInvalid(reason)
}
