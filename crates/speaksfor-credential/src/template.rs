#![forbid(unsafe_code)]

//! The ABAC credential document template.
//!
//! Rendering is literal substitution: the deployed verifiers digest the
//! credential subtree exactly as serialized here, so the shape (including
//! whitespace) is part of the interop surface and never regenerated through
//! a DOM.

/// Render the unsigned credential document.
///
/// `expires` is an ISO-8601 UTC instant; `user_keyhash` and `tool_keyhash`
/// are the ABAC principal keyids of the delegating user (head) and the
/// authorized tool (tail).
pub fn render(expires: &str, user_keyhash: &str, tool_keyhash: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<signed-credential>
  <credential xml:id="ref0" id="ref0">
    <type>abac</type>
    <serial/>
    <owner_gid/>
    <target_gid/>
    <uuid/>
    <expires>{expires}</expires>
    <abac>
      <rt0>
        <version>1.1</version>
        <head>
          <ABACprincipal><keyid>{user_keyhash}</keyid></ABACprincipal>
          <role>speaks_for_{user_keyhash}</role>
        </head>
        <tail>
          <ABACprincipal><keyid>{tool_keyhash}</keyid></ABACprincipal>
        </tail>
      </rt0>
    </abac>
  </credential>
  <signatures></signatures>
</signed-credential>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_template_parses_and_carries_fields() {
        let xml = render("2030-01-01T00:00:00.000Z", "aa".repeat(20).as_str(), "bb".repeat(20).as_str());
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert_eq!(doc.root_element().tag_name().name(), "signed-credential");
        assert!(xml.contains("<expires>2030-01-01T00:00:00.000Z</expires>"));
        assert!(xml.contains(&format!("<role>speaks_for_{}</role>", "aa".repeat(20))));
        assert!(xml.contains("<signatures></signatures>"));
    }
}
