#![forbid(unsafe_code)]

//! Registered-ID attribute handling for same-document references.
//!
//! The credential profile resolves `Reference` URIs through the `id`
//! attribute (with `Id`, `ID`, and `xml:id` registered alongside it).
//! Duplicate ID values across distinct elements are rejected outright:
//! signature-wrapping attacks rely on a second element claiming the same ID
//! so that the signature verifies against one element while the consumer
//! reads another.

use speaksfor_core::{ns, Error};
use std::collections::HashMap;

/// Default ID attribute names, checked on every element.
const ID_ATTRS: [&str; 3] = ["id", "Id", "ID"];

/// Build the ID → node mapping for a parsed document.
///
/// Returns an error if two distinct elements carry the same ID value.
pub fn build_id_map(
    doc: &roxmltree::Document<'_>,
) -> Result<HashMap<String, roxmltree::NodeId>, Error> {
    let mut map: HashMap<String, roxmltree::NodeId> = HashMap::new();
    for node in doc.descendants() {
        if !node.is_element() {
            continue;
        }
        for attr_name in ID_ATTRS {
            if let Some(val) = node.attribute(attr_name) {
                insert_unique(&mut map, val, node.id())?;
            }
        }
        if let Some(val) = node.attribute((ns::XML, "id")) {
            insert_unique(&mut map, val, node.id())?;
        }
    }
    Ok(map)
}

fn insert_unique(
    map: &mut HashMap<String, roxmltree::NodeId>,
    value: &str,
    node: roxmltree::NodeId,
) -> Result<(), Error> {
    if let Some(existing) = map.get(value) {
        if *existing != node {
            return Err(Error::XmlStructure(format!("duplicate ID: {value}")));
        }
        return Ok(());
    }
    map.insert(value.to_owned(), node);
    Ok(())
}

/// Parse a same-document reference (e.g., `#ref0` → `ref0`).
pub fn parse_same_document_ref(uri: &str) -> Option<&str> {
    uri.strip_prefix('#')
}

/// Resolve an ID value in a parsed document using a pre-built ID map.
pub fn resolve_id<'a>(
    doc: &'a roxmltree::Document<'a>,
    id_map: &HashMap<String, roxmltree::NodeId>,
    id: &str,
) -> Result<roxmltree::Node<'a, 'a>, Error> {
    id_map
        .get(id)
        .and_then(|nid| doc.get_node(*nid))
        .ok_or_else(|| Error::InvalidUri(format!("ID not found: {id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_id_and_xml_id() {
        let xml = r#"<r><a id="one"/><b xml:id="two"/></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let map = build_id_map(&doc).unwrap();

        assert_eq!(resolve_id(&doc, &map, "one").unwrap().tag_name().name(), "a");
        assert_eq!(resolve_id(&doc, &map, "two").unwrap().tag_name().name(), "b");
        assert!(resolve_id(&doc, &map, "three").is_err());
    }

    #[test]
    fn same_element_may_carry_both_spellings() {
        // The credential element carries xml:id and id with the same value.
        let xml = r#"<r><credential xml:id="ref0" id="ref0"/></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let map = build_id_map(&doc).unwrap();
        assert_eq!(
            resolve_id(&doc, &map, "ref0").unwrap().tag_name().name(),
            "credential"
        );
    }

    #[test]
    fn rejects_duplicate_ids_across_elements() {
        let xml = r#"<r><a id="x"/><b id="x"/></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let err = build_id_map(&doc).unwrap_err();
        assert!(err.to_string().contains("duplicate ID"));
    }

    #[test]
    fn fragment_parsing() {
        assert_eq!(parse_same_document_ref("#ref0"), Some("ref0"));
        assert_eq!(parse_same_document_ref("ref0"), None);
    }
}
