#![forbid(unsafe_code)]

//! Namespace-aware element lookup helpers.

/// Find the first descendant element with the given local name and namespace.
/// An empty `ns_uri` matches elements carrying no namespace.
pub fn find_element<'a>(
    doc: &'a roxmltree::Document<'a>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    doc.descendants().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns_uri
    })
}

/// Find the first child element with the given local name and namespace.
pub fn find_child_element<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns_uri: &str,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    parent.children().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns_uri
    })
}

/// Find all child elements with the given local name and namespace.
pub fn find_child_elements<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns_uri: &str,
    local_name: &str,
) -> Vec<roxmltree::Node<'a, 'a>> {
    parent
        .children()
        .filter(|n| {
            n.is_element()
                && n.tag_name().name() == local_name
                && n.tag_name().namespace().unwrap_or("") == ns_uri
        })
        .collect()
}

/// Get the trimmed text content of a child element, if present.
pub fn child_text<'a>(
    parent: roxmltree::Node<'a, 'a>,
    ns_uri: &str,
    local_name: &str,
) -> Option<&'a str> {
    find_child_element(parent, ns_uri, local_name)
        .and_then(|n| n.text())
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_by_namespace_and_name() {
        let xml = r#"<r xmlns:a="urn:a"><a:x/><x/><y><x/></y></r>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let root = doc.root_element();

        assert!(find_element(&doc, "urn:a", "x").is_some());
        assert!(find_child_element(root, "urn:a", "x").is_some());
        assert!(find_child_element(root, "", "x").is_some());
        // the nested <x/> is not a direct child
        assert_eq!(find_child_elements(root, "", "x").len(), 1);
        assert!(find_element(&doc, "urn:b", "x").is_none());
    }

    #[test]
    fn child_text_trims() {
        let xml = "<r><expires>  2024-01-01T00:00:00Z\n</expires></r>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        assert_eq!(
            child_text(doc.root_element(), "", "expires"),
            Some("2024-01-01T00:00:00Z")
        );
    }
}
