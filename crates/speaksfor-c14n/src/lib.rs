#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 (exc-C14N) for the credential profile.
//!
//! Algorithm URI: `http://www.w3.org/2001/10/xml-exc-c14n#`
//! With comments: `http://www.w3.org/2001/10/xml-exc-c14n#WithComments`
//!
//! Canonical output additionally passes through the `xml:id` fixup
//! ([`fixup::apply`]) on every path, signing and verifying alike, so that
//! signatures round-trip against the deployed Fed4FIRE verifiers.

pub mod escape;
pub mod exclusive;
pub mod fixup;
pub mod render;

use speaksfor_core::{algorithm, Error};
use speaksfor_xml::NodeSet;

/// The canonicalization mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C14nMode {
    /// Exclusive Canonical XML 1.0
    Exclusive,
    /// Exclusive Canonical XML 1.0 with comments
    ExclusiveWithComments,
}

impl C14nMode {
    /// Get the algorithm URI for this mode.
    pub fn uri(&self) -> &'static str {
        match self {
            Self::Exclusive => algorithm::EXC_C14N,
            Self::ExclusiveWithComments => algorithm::EXC_C14N_WITH_COMMENTS,
        }
    }

    /// Parse a C14N mode from an algorithm URI.
    pub fn from_uri(uri: &str) -> Option<Self> {
        match uri {
            algorithm::EXC_C14N => Some(Self::Exclusive),
            algorithm::EXC_C14N_WITH_COMMENTS => Some(Self::ExclusiveWithComments),
            _ => None,
        }
    }

    pub fn with_comments(&self) -> bool {
        matches!(self, Self::ExclusiveWithComments)
    }
}

/// Canonicalize an XML document.
///
/// - `xml`: the raw XML text
/// - `mode`: which exc-C14N variant to use
/// - `node_set`: optional node set (for document-subset canonicalization)
/// - `inclusive_prefixes`: the InclusiveNamespaces PrefixList
pub fn canonicalize(
    xml: &str,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let doc = roxmltree::Document::parse_with_options(xml, speaksfor_xml::parsing_options())
        .map_err(|e| Error::XmlParse(e.to_string()))?;
    canonicalize_doc(&doc, mode, node_set, inclusive_prefixes)
}

/// Canonicalize with a pre-parsed document.
pub fn canonicalize_doc(
    doc: &roxmltree::Document<'_>,
    mode: C14nMode,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let out = exclusive::canonicalize(doc, mode.with_comments(), node_set, inclusive_prefixes)?;
    Ok(fixup::apply(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n(xml: &str) -> String {
        String::from_utf8(canonicalize(xml, C14nMode::Exclusive, None, &[]).unwrap()).unwrap()
    }

    #[test]
    fn idempotent() {
        let xml = r#"<b a="2" b="1" xmlns="urn:x"><c>text &amp; more</c></b>"#;
        let once = c14n(xml);
        let twice = c14n(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn sorts_attributes_and_drops_unused_namespaces() {
        let xml = r#"<r xmlns:unused="urn:u" b="2" a="1"><x/></r>"#;
        assert_eq!(c14n(xml), r#"<r a="1" b="2"><x></x></r>"#);
    }

    #[test]
    fn keeps_utilized_prefix() {
        let xml = r#"<p:r xmlns:p="urn:p" xmlns:q="urn:q"><p:c/></p:r>"#;
        assert_eq!(c14n(xml), r#"<p:r xmlns:p="urn:p"><p:c></p:c></p:r>"#);
    }

    #[test]
    fn xml_id_gets_no_namespace_declaration() {
        let xml = r#"<credential xml:id="ref0" id="ref0"><x/></credential>"#;
        assert_eq!(
            c14n(xml),
            r#"<credential id="ref0" xml:id="ref0"><x></x></credential>"#
        );
    }

    #[test]
    fn comments_dropped_without_comments_mode() {
        let xml = "<r><!-- gone --><a/></r>";
        assert_eq!(c14n(xml), "<r><a></a></r>");
        let with = String::from_utf8(
            canonicalize(xml, C14nMode::ExclusiveWithComments, None, &[]).unwrap(),
        )
        .unwrap();
        assert_eq!(with, "<r><!-- gone --><a></a></r>");
    }

    #[test]
    fn empty_elements_expand() {
        assert_eq!(c14n("<r/>"), "<r></r>");
    }
}
