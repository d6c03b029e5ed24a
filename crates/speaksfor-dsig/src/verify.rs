#![forbid(unsafe_code)]

//! Signature verification.
//!
//! Processing order:
//! 1. Parse the document, register ID attributes (duplicates rejected)
//! 2. Locate `<Signature>` under `/*/signatures` in the DSig namespace
//! 3. Read `SignedInfo`: CanonicalizationMethod, SignatureMethod
//! 4. For each `Reference`: resolve the URI, run the transforms, compare digests
//! 5. Extract the signing certificate from `KeyInfo/X509Data`
//! 6. Canonicalize `SignedInfo` and check `SignatureValue`

use base64::Engine;
use speaksfor_c14n::C14nMode;
use speaksfor_core::{ns, Error, Result};
use speaksfor_crypto::{sign as crypto_sign, SigningKey};
use speaksfor_keys::keyinfo::KeyInfoExtractor;
use speaksfor_keys::ParsedCertificate;
use speaksfor_xml::{dom, ids, NodeSet};
use std::collections::HashMap;

/// Outcome of a successful signature verification.
#[derive(Debug)]
pub struct VerifiedSignature {
    /// The certificate the signature was produced with (first in `X509Data`).
    pub signing_certificate: ParsedCertificate,
    /// The embedded chain, DER, in document order.
    pub chain_der: Vec<Vec<u8>>,
    /// The embedded chain re-armored as PEM, ready for the trust store.
    pub chain_pem: String,
}

/// Verify the enveloped signature of a credential document.
pub fn verify_enveloped(xml: &str, debug: bool) -> Result<VerifiedSignature> {
    let doc = roxmltree::Document::parse_with_options(xml, speaksfor_xml::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    let id_map = ids::build_id_map(&doc)?;

    // /*/signatures/Signature, namespace-qualified on the Signature only.
    let signatures = dom::find_child_element(doc.root_element(), "", ns::cred::SIGNATURES)
        .ok_or_else(|| Error::MissingElement("signatures".into()))?;
    let sig_node = dom::find_child_element(signatures, ns::DSIG, ns::node::SIGNATURE)
        .ok_or_else(|| Error::MissingElement("Signature".into()))?;

    let signed_info = dom::find_child_element(sig_node, ns::DSIG, ns::node::SIGNED_INFO)
        .ok_or_else(|| Error::MissingElement("SignedInfo".into()))?;

    // CanonicalizationMethod
    let c14n_node = dom::find_child_element(signed_info, ns::DSIG, ns::node::CANONICALIZATION_METHOD)
        .ok_or_else(|| Error::MissingElement("CanonicalizationMethod".into()))?;
    let c14n_uri = c14n_node
        .attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on CanonicalizationMethod".into()))?;
    let c14n_mode = C14nMode::from_uri(c14n_uri)
        .ok_or_else(|| Error::UnsupportedAlgorithm(format!("C14N: {c14n_uri}")))?;
    let signed_info_prefixes = read_inclusive_prefixes(c14n_node);

    // SignatureMethod
    let sig_method_node = dom::find_child_element(signed_info, ns::DSIG, ns::node::SIGNATURE_METHOD)
        .ok_or_else(|| Error::MissingElement("SignatureMethod".into()))?;
    let sig_method_uri = sig_method_node
        .attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on SignatureMethod".into()))?;
    let sig_alg = crypto_sign::from_uri(sig_method_uri)?;

    // References
    let references = dom::find_child_elements(signed_info, ns::DSIG, ns::node::REFERENCE);
    if references.is_empty() {
        return Err(Error::MissingElement("Reference".into()));
    }
    for reference in &references {
        verify_reference(reference, &doc, &id_map, debug)?;
    }

    // Signing key material: first certificate of the signature's X509Data.
    let extractor = KeyInfoExtractor::from_signature_node(sig_node)?;
    let signing_certificate = extractor.signing_certificate()?;
    let public_key = signing_certificate.rsa_public_key()?;

    // SignedInfo canonical form
    let signed_info_set = NodeSet::tree_without_comments(signed_info);
    let canonical_signed_info = speaksfor_c14n::canonicalize_doc(
        &doc,
        c14n_mode,
        Some(&signed_info_set),
        &signed_info_prefixes,
    )?;
    if debug {
        eprintln!("== PreSigned data - start buffer:");
        eprint!("{}", String::from_utf8_lossy(&canonical_signed_info));
        eprintln!("\n== PreSigned data - end buffer");
    }

    // SignatureValue
    let sig_value_node = dom::find_child_element(sig_node, ns::DSIG, ns::node::SIGNATURE_VALUE)
        .ok_or_else(|| Error::MissingElement("SignatureValue".into()))?;
    let sig_value_b64: String = sig_value_node
        .text()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let sig_value = base64::engine::general_purpose::STANDARD
        .decode(&sig_value_b64)
        .map_err(|e| Error::Base64(format!("SignatureValue: {e}")))?;

    let valid = sig_alg.verify(
        &SigningKey::RsaPublic(public_key),
        &canonical_signed_info,
        &sig_value,
    )?;
    if !valid {
        return Err(Error::SignatureInvalid(
            "signature value verification failed".into(),
        ));
    }

    let chain_pem = extractor.chain_pem()?;
    Ok(VerifiedSignature {
        signing_certificate,
        chain_der: extractor.chain_der().to_vec(),
        chain_pem,
    })
}

/// Verify a single `<Reference>`: resolve, transform, digest, compare.
fn verify_reference(
    reference: &roxmltree::Node<'_, '_>,
    doc: &roxmltree::Document<'_>,
    id_map: &HashMap<String, roxmltree::NodeId>,
    debug: bool,
) -> Result<()> {
    let uri = reference.attribute(ns::attr::URI).unwrap_or("");

    let digest_method_node = dom::find_child_element(*reference, ns::DSIG, ns::node::DIGEST_METHOD)
        .ok_or_else(|| Error::MissingElement("DigestMethod".into()))?;
    let digest_uri = digest_method_node
        .attribute(ns::attr::ALGORITHM)
        .ok_or_else(|| Error::MissingAttribute("Algorithm on DigestMethod".into()))?;

    let digest_value_node = dom::find_child_element(*reference, ns::DSIG, ns::node::DIGEST_VALUE)
        .ok_or_else(|| Error::MissingElement("DigestValue".into()))?;
    let expected_b64: String = digest_value_node
        .text()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let expected = base64::engine::general_purpose::STANDARD
        .decode(&expected_b64)
        .map_err(|e| Error::Base64(format!("DigestValue: {e}")))?;

    // Resolve the URI to a node set. The `id` attribute is authoritative.
    let node_set = if uri.is_empty() {
        NodeSet::all_without_comments(doc)
    } else if let Some(id) = ids::parse_same_document_ref(uri) {
        let target = ids::resolve_id(doc, id_map, id)?;
        NodeSet::tree_without_comments(target)
    } else {
        return Err(Error::InvalidUri(format!("unsupported Reference URI: {uri}")));
    };

    // Transforms: the profile admits only canonicalization transforms.
    let mut mode = C14nMode::Exclusive;
    let mut prefixes = Vec::new();
    if let Some(transforms) = dom::find_child_element(*reference, ns::DSIG, ns::node::TRANSFORMS) {
        for transform in dom::find_child_elements(transforms, ns::DSIG, ns::node::TRANSFORM) {
            let t_uri = transform.attribute(ns::attr::ALGORITHM).unwrap_or("");
            mode = C14nMode::from_uri(t_uri)
                .ok_or_else(|| Error::UnsupportedAlgorithm(format!("transform: {t_uri}")))?;
            prefixes = read_inclusive_prefixes(transform);
        }
    }

    let canonical = speaksfor_c14n::canonicalize_doc(doc, mode, Some(&node_set), &prefixes)?;
    if debug {
        eprintln!("== PreDigest data - start buffer (URI={uri}):");
        eprint!("{}", String::from_utf8_lossy(&canonical));
        eprintln!("\n== PreDigest data - end buffer");
    }
    let computed = speaksfor_crypto::digest::digest(digest_uri, &canonical)?;

    if computed != expected {
        return Err(Error::SignatureInvalid(format!(
            "Reference digest mismatch (URI={uri})"
        )));
    }
    Ok(())
}

/// Read the `InclusiveNamespaces PrefixList` child of a method/transform node.
fn read_inclusive_prefixes(node: roxmltree::Node<'_, '_>) -> Vec<String> {
    for child in node.children() {
        if child.is_element() && child.tag_name().name() == ns::node::INCLUSIVE_NAMESPACES {
            if let Some(prefix_list) = child.attribute(ns::attr::PREFIX_LIST) {
                return prefix_list
                    .split_whitespace()
                    .map(str::to_owned)
                    .collect();
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_signatures_element_is_reported() {
        let err = verify_enveloped("<signed-credential></signed-credential>", false).unwrap_err();
        assert!(matches!(err, Error::MissingElement(_)), "got: {err}");
    }

    #[test]
    fn unqualified_signature_is_not_accepted() {
        // A Signature outside the DSig namespace must not be found.
        let xml = "<signed-credential><signatures><Signature/></signatures></signed-credential>";
        let err = verify_enveloped(xml, false).unwrap_err();
        assert!(matches!(err, Error::MissingElement(_)), "got: {err}");
    }
}
