#![forbid(unsafe_code)]

//! Rendering of namespace declarations and attributes in canonical order.

use crate::escape;

/// A namespace declaration to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NsDecl {
    /// The prefix ("" for the default namespace).
    pub prefix: String,
    /// The namespace URI ("" to undeclare the default namespace).
    pub uri: String,
}

impl NsDecl {
    pub fn render(&self) -> String {
        if self.prefix.is_empty() {
            format!(" xmlns=\"{}\"", escape::escape_attr(&self.uri))
        } else {
            format!(" xmlns:{}=\"{}\"", self.prefix, escape::escape_attr(&self.uri))
        }
    }
}

impl Ord for NsDecl {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // The default namespace (empty prefix) sorts first, then by prefix.
        match (self.prefix.is_empty(), other.prefix.is_empty()) {
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            _ => self.prefix.cmp(&other.prefix),
        }
    }
}

impl PartialOrd for NsDecl {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// An attribute to be rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attr {
    /// The namespace URI of the attribute ("" for no namespace).
    pub ns_uri: String,
    /// The local name.
    pub local_name: String,
    /// The qualified name (prefix:local, or just local).
    pub qualified_name: String,
    /// The attribute value.
    pub value: String,
}

impl Attr {
    pub fn render(&self) -> String {
        format!(
            " {}=\"{}\"",
            self.qualified_name,
            escape::escape_attr(&self.value)
        )
    }
}

impl Ord for Attr {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Unqualified attributes sort before qualified ones; qualified
        // attributes sort by (namespace URI, local name).
        match (self.ns_uri.is_empty(), other.ns_uri.is_empty()) {
            (true, true) => self.local_name.cmp(&other.local_name),
            (true, false) => std::cmp::Ordering::Less,
            (false, true) => std::cmp::Ordering::Greater,
            (false, false) => self
                .ns_uri
                .cmp(&other.ns_uri)
                .then(self.local_name.cmp(&other.local_name)),
        }
    }
}

impl PartialOrd for Attr {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ns_decl_order() {
        let mut decls = vec![
            NsDecl { prefix: "b".into(), uri: "urn:b".into() },
            NsDecl { prefix: String::new(), uri: "urn:d".into() },
            NsDecl { prefix: "a".into(), uri: "urn:a".into() },
        ];
        decls.sort();
        assert_eq!(decls[0].prefix, "");
        assert_eq!(decls[1].prefix, "a");
        assert_eq!(decls[2].prefix, "b");
    }

    #[test]
    fn attr_order_unqualified_first() {
        let mut attrs = vec![
            Attr {
                ns_uri: "http://www.w3.org/XML/1998/namespace".into(),
                local_name: "id".into(),
                qualified_name: "xml:id".into(),
                value: "r".into(),
            },
            Attr {
                ns_uri: String::new(),
                local_name: "id".into(),
                qualified_name: "id".into(),
                value: "r".into(),
            },
        ];
        attrs.sort();
        assert_eq!(attrs[0].qualified_name, "id");
        assert_eq!(attrs[1].qualified_name, "xml:id");
    }
}
