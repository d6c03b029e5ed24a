#![forbid(unsafe_code)]

//! Exclusive Canonical XML 1.0 rendering.
//!
//! The key difference from inclusive C14N: only "visibly utilized"
//! namespace declarations are output. A namespace is visibly utilized if:
//! 1. Its prefix is used by the element's tag name, OR
//! 2. Its prefix is used by one of the element's attributes, OR
//! 3. The prefix appears in the InclusiveNamespaces PrefixList.

use crate::escape;
use crate::render::{Attr, NsDecl};
use speaksfor_core::{ns, Error};
use speaksfor_xml::NodeSet;
use std::collections::{BTreeMap, HashSet};

/// Canonicalize a document (or a node-set subset of it) with exc-C14N 1.0.
pub fn canonicalize(
    doc: &roxmltree::Document<'_>,
    with_comments: bool,
    node_set: Option<&NodeSet>,
    inclusive_prefixes: &[String],
) -> Result<Vec<u8>, Error> {
    let mut writer = ExcC14nWriter {
        doc,
        with_comments,
        node_set,
        inclusive_prefixes: inclusive_prefixes.iter().cloned().collect(),
        output: Vec::new(),
    };
    writer.write_node(doc.root(), &BTreeMap::new())?;
    Ok(writer.output)
}

struct ExcC14nWriter<'a, 'doc> {
    doc: &'a roxmltree::Document<'doc>,
    with_comments: bool,
    node_set: Option<&'a NodeSet>,
    inclusive_prefixes: HashSet<String>,
    output: Vec<u8>,
}

impl ExcC14nWriter<'_, '_> {
    fn is_visible(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        match self.node_set {
            None => true,
            Some(set) => set.contains(node),
        }
    }

    fn write_node(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        match node.node_type() {
            roxmltree::NodeType::Root => {
                for child in node.children() {
                    self.write_node(child, rendered_ns)?;
                }
            }
            roxmltree::NodeType::Element => {
                self.write_element(node, rendered_ns)?;
            }
            roxmltree::NodeType::Text => {
                if self.is_visible(&node) {
                    let text = node.text().unwrap_or("");
                    self.output.extend_from_slice(escape::escape_text(text).as_bytes());
                }
            }
            roxmltree::NodeType::Comment => {
                if self.with_comments && self.is_visible(&node) {
                    let at_document_level = node.parent().is_some_and(|p| p.is_root());
                    if at_document_level && has_preceding_element(node) {
                        self.output.push(b'\n');
                    }
                    self.output.extend_from_slice(b"<!--");
                    self.output.extend_from_slice(node.text().unwrap_or("").as_bytes());
                    self.output.extend_from_slice(b"-->");
                    if at_document_level && has_following_element(node) {
                        self.output.push(b'\n');
                    }
                }
            }
            roxmltree::NodeType::PI => {
                if self.is_visible(&node) {
                    let Some(pi) = node.pi() else { return Ok(()) };
                    let at_document_level = node.parent().is_some_and(|p| p.is_root());
                    if at_document_level && has_preceding_element(node) {
                        self.output.push(b'\n');
                    }
                    self.output.extend_from_slice(b"<?");
                    self.output.extend_from_slice(pi.target.as_bytes());
                    if let Some(value) = pi.value {
                        if !value.is_empty() {
                            self.output.push(b' ');
                            self.output.extend_from_slice(escape::escape_pi(value).as_bytes());
                        }
                    }
                    self.output.extend_from_slice(b"?>");
                    if at_document_level && has_following_element(node) {
                        self.output.push(b'\n');
                    }
                }
            }
        }
        Ok(())
    }

    fn write_element(
        &mut self,
        node: roxmltree::Node<'_, '_>,
        rendered_ns: &BTreeMap<String, String>,
    ) -> Result<(), Error> {
        if !self.is_visible(&node) {
            // In exclusive C14N, an invisible element contributes nothing of
            // its own; its children render against the same ancestor context.
            for child in node.children() {
                self.write_node(child, rendered_ns)?;
            }
            return Ok(());
        }

        let qname = qualified_element_name(self.doc, node);
        let elem_prefix = qname.split_once(':').map(|(p, _)| p).unwrap_or("");

        // Visibly utilized prefixes: element tag, attributes, PrefixList.
        let mut utilized: HashSet<String> = HashSet::new();
        utilized.insert(elem_prefix.to_owned());
        for attr in node.attributes() {
            if let Some(prefix) = attribute_prefix(node, &attr) {
                if !prefix.is_empty() {
                    utilized.insert(prefix);
                }
            }
        }
        for p in &self.inclusive_prefixes {
            if p == "#default" {
                utilized.insert(String::new());
            } else {
                utilized.insert(p.clone());
            }
        }

        let inscope = in_scope_namespaces(node);

        let mut ns_decls: Vec<NsDecl> = Vec::new();
        for prefix in &utilized {
            // The reserved xml prefix never needs a declaration.
            if prefix == "xml" {
                continue;
            }
            if let Some(uri) = inscope.get(prefix.as_str()) {
                if rendered_ns.get(prefix.as_str()) != Some(uri) {
                    ns_decls.push(NsDecl {
                        prefix: prefix.clone(),
                        uri: uri.clone(),
                    });
                }
            } else if prefix.is_empty() {
                // Default namespace went out of scope: emit xmlns="" when an
                // output ancestor rendered a non-empty default binding.
                if rendered_ns.get("").is_some_and(|u| !u.is_empty()) {
                    ns_decls.push(NsDecl {
                        prefix: String::new(),
                        uri: String::new(),
                    });
                }
            }
        }
        ns_decls.sort();

        let mut attrs: Vec<Attr> = Vec::new();
        for attr in node.attributes() {
            let ns_uri = attr.namespace().unwrap_or("");
            let qualified_name = match attribute_prefix(node, &attr) {
                Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, attr.name()),
                _ => attr.name().to_owned(),
            };
            attrs.push(Attr {
                ns_uri: ns_uri.to_owned(),
                local_name: attr.name().to_owned(),
                qualified_name,
                value: attr.value().to_owned(),
            });
        }
        attrs.sort();

        self.output.push(b'<');
        self.output.extend_from_slice(qname.as_bytes());
        for decl in &ns_decls {
            self.output.extend_from_slice(decl.render().as_bytes());
        }
        for attr in &attrs {
            self.output.extend_from_slice(attr.render().as_bytes());
        }
        self.output.push(b'>');

        let mut child_rendered = rendered_ns.clone();
        for decl in &ns_decls {
            child_rendered.insert(decl.prefix.clone(), decl.uri.clone());
        }
        for child in node.children() {
            self.write_node(child, &child_rendered)?;
        }

        self.output.extend_from_slice(b"</");
        self.output.extend_from_slice(qname.as_bytes());
        self.output.push(b'>');
        Ok(())
    }
}

/// The element's qualified name exactly as written in the source document.
fn qualified_element_name<'a>(
    doc: &'a roxmltree::Document<'_>,
    node: roxmltree::Node<'_, '_>,
) -> &'a str {
    let start = node.range().start;
    let rest = &doc.input_text()[start + 1..];
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(rest.len());
    &rest[..end]
}

/// The prefix an attribute is written with, resolved through the element's
/// in-scope bindings. Attributes never use the default namespace, so a
/// namespaced attribute always has a prefixed binding.
fn attribute_prefix(
    node: roxmltree::Node<'_, '_>,
    attr: &roxmltree::Attribute<'_, '_>,
) -> Option<String> {
    let ns_uri = attr.namespace()?;
    if ns_uri == ns::XML {
        return Some("xml".to_owned());
    }
    node.namespaces()
        .find(|b| b.name().is_some() && b.uri() == ns_uri)
        .and_then(|b| b.name())
        .map(str::to_owned)
}

/// All in-scope namespace bindings of an element (prefix → URI), with the
/// reserved xml binding excluded.
fn in_scope_namespaces(node: roxmltree::Node<'_, '_>) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for binding in node.namespaces() {
        let prefix = binding.name().unwrap_or("");
        if prefix == "xml" {
            continue;
        }
        map.insert(prefix.to_owned(), binding.uri().to_owned());
    }
    map
}

fn has_preceding_element(node: roxmltree::Node<'_, '_>) -> bool {
    let mut sibling = node.prev_sibling();
    while let Some(s) = sibling {
        if s.is_element() {
            return true;
        }
        sibling = s.prev_sibling();
    }
    false
}

fn has_following_element(node: roxmltree::Node<'_, '_>) -> bool {
    let mut sibling = node.next_sibling();
    while let Some(s) = sibling {
        if s.is_element() {
            return true;
        }
        sibling = s.next_sibling();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c14n_subset(xml: &str, subtree_name: &str) -> String {
        let doc = roxmltree::Document::parse(xml).unwrap();
        let target = doc
            .descendants()
            .find(|n| n.is_element() && n.tag_name().name() == subtree_name)
            .unwrap();
        let set = NodeSet::tree_without_comments(target);
        let out = canonicalize(&doc, false, Some(&set), &[]).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn subset_pulls_in_utilized_default_namespace() {
        // Canonicalizing SignedInfo out of its Signature context must carry
        // the default dsig namespace down onto the subset root.
        let xml = r##"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#"><SignedInfo><Reference URI="#r"></Reference></SignedInfo></Signature>"##;
        assert_eq!(
            c14n_subset(xml, "SignedInfo"),
            r##"<SignedInfo xmlns="http://www.w3.org/2000/09/xmldsig#"><Reference URI="#r"></Reference></SignedInfo>"##
        );
    }

    #[test]
    fn subset_of_unqualified_tree_stays_bare() {
        let xml = r#"<signed-credential><credential id="ref0"><type>abac</type></credential><signatures/></signed-credential>"#;
        assert_eq!(
            c14n_subset(xml, "credential"),
            r#"<credential id="ref0"><type>abac</type></credential>"#
        );
    }

    #[test]
    fn prefix_redeclaration_suppressed_for_descendants() {
        let xml = r#"<p:a xmlns:p="urn:p"><p:b><p:c/></p:b></p:a>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let out = String::from_utf8(canonicalize(&doc, false, None, &[]).unwrap()).unwrap();
        assert_eq!(out, r#"<p:a xmlns:p="urn:p"><p:b><p:c></p:c></p:b></p:a>"#);
    }

    #[test]
    fn inclusive_prefix_list_forces_declaration() {
        let xml = r#"<a xmlns:extra="urn:e"><b/></a>"#;
        let doc = roxmltree::Document::parse(xml).unwrap();
        let out = String::from_utf8(
            canonicalize(&doc, false, None, &["extra".to_owned()]).unwrap(),
        )
        .unwrap();
        assert_eq!(out, r#"<a xmlns:extra="urn:e"><b></b></a>"#);
    }
}
