#![forbid(unsafe_code)]

//! Node sets for document-subset canonicalization.
//!
//! A `NodeSet` marks which nodes of a parsed document are visible to the
//! canonicalizer. The credential profile needs whole-subtree sets (a
//! `Reference` to the credential element, or the `SignedInfo` element),
//! with comment nodes excluded per the XML-DSig defaults.

use std::collections::HashSet;

/// A set of XML document nodes identified by their `roxmltree::NodeId`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<usize>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes of the document except comments. Per the W3C DSig spec,
    /// a same-document reference without an XPointer excludes comments.
    pub fn all_without_comments(doc: &roxmltree::Document<'_>) -> Self {
        let nodes = doc
            .descendants()
            .filter(|n| !n.is_comment())
            .map(node_index)
            .collect();
        Self { nodes }
    }

    /// The subtree rooted at `root`, excluding comment nodes.
    pub fn tree_without_comments(root: roxmltree::Node<'_, '_>) -> Self {
        let mut nodes = HashSet::new();
        collect_subtree(root, &mut nodes, false);
        Self { nodes }
    }

    /// The subtree rooted at `root`, including comment nodes.
    pub fn tree_with_comments(root: roxmltree::Node<'_, '_>) -> Self {
        let mut nodes = HashSet::new();
        collect_subtree(root, &mut nodes, true);
        Self { nodes }
    }

    /// Check whether a node is in this set.
    pub fn contains(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        self.nodes.contains(&node_index(*node))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Stable numeric index of a node within its document.
pub fn node_index(node: roxmltree::Node<'_, '_>) -> usize {
    node.id().get() as usize
}

fn collect_subtree(
    node: roxmltree::Node<'_, '_>,
    set: &mut HashSet<usize>,
    include_comments: bool,
) {
    if !include_comments && node.is_comment() {
        return;
    }
    set.insert(node_index(node));
    for child in node.children() {
        collect_subtree(child, set, include_comments);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtree_excludes_comments() {
        let xml = "<r><a><!-- hidden --><b/></a><c/></r>";
        let doc = roxmltree::Document::parse(xml).unwrap();
        let a = doc
            .descendants()
            .find(|n| n.tag_name().name() == "a")
            .unwrap();

        let ns = NodeSet::tree_without_comments(a);
        let b = doc.descendants().find(|n| n.tag_name().name() == "b").unwrap();
        let c = doc.descendants().find(|n| n.tag_name().name() == "c").unwrap();
        let comment = doc.descendants().find(|n| n.is_comment()).unwrap();

        assert!(ns.contains(&a));
        assert!(ns.contains(&b));
        assert!(!ns.contains(&c));
        assert!(!ns.contains(&comment));

        let with = NodeSet::tree_with_comments(a);
        assert!(with.contains(&comment));
    }
}
