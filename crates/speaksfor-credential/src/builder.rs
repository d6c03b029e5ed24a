#![forbid(unsafe_code)]

//! Credential assembly: render the ABAC document and sign it.

use chrono::{DateTime, Duration, Utc};
use speaksfor_core::Result;
use speaksfor_crypto::SignatureSuite;
use speaksfor_keys::{CredentialBundle, ParsedCertificate};

use crate::template;

/// Milliseconds per validity day.
const DAY_MS: i64 = 86_400_000;

/// Options for credential issuance.
#[derive(Debug, Clone, Copy)]
pub struct IssueOptions {
    /// Validity in whole days. Negative values produce an already-expired
    /// credential, which the verification test vectors rely on.
    pub days: i64,
    /// The signature suite; the deployed profile is RSA-SHA1.
    pub suite: SignatureSuite,
    /// Dump pre-digest and pre-signature buffers to stderr.
    pub debug: bool,
}

impl Default for IssueOptions {
    fn default() -> Self {
        Self {
            days: 120,
            suite: SignatureSuite::RSA_SHA1,
            debug: false,
        }
    }
}

/// Issue a speaks-for credential: user (bundle) delegates to tool
/// (certificate) until `now + days`.
pub fn issue(
    bundle: &CredentialBundle,
    tool_certificate: &ParsedCertificate,
    options: IssueOptions,
    now: DateTime<Utc>,
) -> Result<String> {
    let expires = now + Duration::milliseconds(options.days * DAY_MS);
    let expires_text = format_expires(expires);

    let user_keyhash = bundle.user_keyid()?;
    let tool_keyhash = tool_certificate.keyid()?;

    let document = template::render(&expires_text, &user_keyhash, &tool_keyhash);
    speaksfor_dsig::sign_document(
        &document,
        bundle,
        options.suite,
        speaksfor_core::ns::cred::REF_ID,
        options.debug,
    )
}

/// ISO-8601 UTC with milliseconds, e.g. `2025-01-01T00:00:00.000Z`.
pub fn format_expires(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expires_formatting_round_trips() {
        let instant = DateTime::parse_from_rfc3339("2025-03-04T05:06:07.089Z")
            .unwrap()
            .with_timezone(&Utc);
        let text = format_expires(instant);
        assert_eq!(text, "2025-03-04T05:06:07.089Z");
        let back = DateTime::parse_from_rfc3339(&text).unwrap();
        assert_eq!(back.timestamp_millis(), instant.timestamp_millis());
    }

    #[test]
    fn default_validity_is_120_days() {
        assert_eq!(IssueOptions::default().days, 120);
    }
}
