#![forbid(unsafe_code)]

//! Signature creation.
//!
//! The credential document arrives with an empty `<signatures>` element.
//! Signing proceeds in two text-substitution passes, re-parsing in between
//! so the signed bytes are exactly what a later parse of the final document
//! will produce:
//! 1. digest the referenced element, render the `Signature` block with the
//!    digest filled in and an empty `SignatureValue`, insert it;
//! 2. canonicalize `SignedInfo` out of the updated document, sign, and fill
//!    `SignatureValue`.

use base64::Engine;
use speaksfor_c14n::C14nMode;
use speaksfor_core::{algorithm, Error, Result};
use speaksfor_crypto::{sign as crypto_sign, SignatureSuite, SigningKey};
use speaksfor_keys::keyinfo::KeyInfoBuilder;
use speaksfor_keys::CredentialBundle;
use speaksfor_xml::{dom, ids, NodeSet};

/// Sign a credential document in place.
///
/// `reference_id` is the registered ID value of the element the single
/// `Reference` selects (the `credential` element's `ref0`).
pub fn sign_document(
    document_xml: &str,
    bundle: &CredentialBundle,
    suite: SignatureSuite,
    reference_id: &str,
    debug: bool,
) -> Result<String> {
    let engine = base64::engine::general_purpose::STANDARD;

    // Pass 1: digest the referenced element.
    let doc = roxmltree::Document::parse_with_options(document_xml, speaksfor_xml::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    let id_map = ids::build_id_map(&doc)?;
    let target = ids::resolve_id(&doc, &id_map, reference_id)?;

    let target_set = NodeSet::tree_without_comments(target);
    let canonical = speaksfor_c14n::canonicalize_doc(&doc, C14nMode::Exclusive, Some(&target_set), &[])?;
    if debug {
        eprintln!("== PreDigest data - start buffer (URI=#{reference_id}):");
        eprint!("{}", String::from_utf8_lossy(&canonical));
        eprintln!("\n== PreDigest data - end buffer");
    }
    let digest = speaksfor_crypto::digest::digest(suite.digest_uri, &canonical)?;
    let digest_b64 = engine.encode(&digest);

    let key_info = KeyInfoBuilder::new(&bundle.public_key(), bundle.chain()).to_xml()?;
    let signature_xml = render_signature(&suite, reference_id, &digest_b64, &key_info);

    let with_signature = insert_signature(document_xml, &signature_xml)?;

    // Pass 2: canonicalize SignedInfo from the updated document and sign.
    let updated = roxmltree::Document::parse_with_options(&with_signature, speaksfor_xml::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    let sig_node = dom::find_element(&updated, speaksfor_core::ns::DSIG, speaksfor_core::ns::node::SIGNATURE)
        .ok_or_else(|| Error::MissingElement("Signature".into()))?;
    let signed_info = dom::find_child_element(
        sig_node,
        speaksfor_core::ns::DSIG,
        speaksfor_core::ns::node::SIGNED_INFO,
    )
    .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;

    let signed_info_set = NodeSet::tree_without_comments(signed_info);
    let canonical_signed_info =
        speaksfor_c14n::canonicalize_doc(&updated, C14nMode::Exclusive, Some(&signed_info_set), &[])?;
    if debug {
        eprintln!("== PreSigned data - start buffer:");
        eprint!("{}", String::from_utf8_lossy(&canonical_signed_info));
        eprintln!("\n== PreSigned data - end buffer");
    }

    let alg = crypto_sign::from_uri(suite.signature_uri)?;
    let signature = alg.sign(
        &SigningKey::Rsa(bundle.private_key().clone()),
        &canonical_signed_info,
    )?;
    let signature_b64 = engine.encode(&signature);

    let empty_value = "<SignatureValue></SignatureValue>";
    if !with_signature.contains(empty_value) {
        return Err(Error::XmlStructure(
            "inserted Signature lost its empty SignatureValue".into(),
        ));
    }
    Ok(with_signature.replacen(
        empty_value,
        &format!("<SignatureValue>{signature_b64}</SignatureValue>"),
        1,
    ))
}

/// Render the enveloped `Signature` element with an empty `SignatureValue`.
fn render_signature(
    suite: &SignatureSuite,
    reference_id: &str,
    digest_b64: &str,
    key_info: &str,
) -> String {
    format!(
        concat!(
            "<Signature xmlns=\"{dsig}\">",
            "<SignedInfo>",
            "<CanonicalizationMethod Algorithm=\"{c14n}\"></CanonicalizationMethod>",
            "<SignatureMethod Algorithm=\"{sig}\"></SignatureMethod>",
            "<Reference URI=\"#{id}\">",
            "<Transforms>",
            "<Transform Algorithm=\"{c14n}\"></Transform>",
            "</Transforms>",
            "<DigestMethod Algorithm=\"{digest}\"></DigestMethod>",
            "<DigestValue>{digest_value}</DigestValue>",
            "</Reference>",
            "</SignedInfo>",
            "<SignatureValue></SignatureValue>",
            "{key_info}",
            "</Signature>"
        ),
        dsig = speaksfor_core::ns::DSIG,
        c14n = algorithm::EXC_C14N,
        sig = suite.signature_uri,
        digest = suite.digest_uri,
        id = reference_id,
        digest_value = digest_b64,
        key_info = key_info,
    )
}

/// Insert the rendered signature into the document's `<signatures>` element.
fn insert_signature(document_xml: &str, signature_xml: &str) -> Result<String> {
    for empty_form in ["<signatures></signatures>", "<signatures/>"] {
        if document_xml.contains(empty_form) {
            return Ok(document_xml.replacen(
                empty_form,
                &format!("<signatures>{signature_xml}</signatures>"),
                1,
            ));
        }
    }
    Err(Error::MissingElement(
        "empty signatures element to hold the Signature".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_document_without_signatures_slot() {
        let err = insert_signature("<signed-credential/>", "<Signature/>").unwrap_err();
        assert!(matches!(err, Error::MissingElement(_)));
    }

    #[test]
    fn renders_profile_uris() {
        let xml = render_signature(&SignatureSuite::RSA_SHA1, "ref0", "AAAA", "<KeyInfo></KeyInfo>");
        assert!(xml.contains(r#"Algorithm="http://www.w3.org/2001/10/xml-exc-c14n#""#));
        assert!(xml.contains(r#"Algorithm="http://www.w3.org/2000/09/xmldsig#rsa-sha1""#));
        assert!(xml.contains(r##"URI="#ref0""##));
        assert!(xml.contains("<SignatureValue></SignatureValue>"));
    }
}
