//! End-to-end issuance and verification against the generated fixtures.
//!
//! Fixtures live in `test-data/` (see `regen.sh`); every test skips with a
//! note when its fixture is missing so the suite stays runnable from a bare
//! checkout.

use chrono::{Duration, Utc};
use speaksfor_core::Error;
use speaksfor_credential::{issue, verify, IssueOptions, TailExpectation};
use speaksfor_keys::{loader, CredentialBundle, KeyFormat, ParsedCertificate};
use speaksfor_trust::TrustStore;
use std::path::Path;

// Ground truth computed with
// `openssl x509 -pubkey | openssl rsa -pubin -outform DER | sha1`.
const USER_KEYID: &str = "b2dd781e590df93764057d689dbab2f6cd492345";
const TOOL_KEYID: &str = "c877c0f1a9d4993c728f884989875f720420828d";

fn test_data() -> &'static Path {
    Path::new("../../test-data")
}

fn fixture(name: &str) -> Option<Vec<u8>> {
    let path = test_data().join(name);
    if !path.exists() {
        eprintln!("skipping test: {} not found", path.display());
        return None;
    }
    Some(std::fs::read(path).unwrap())
}

fn pem_bundle() -> Option<CredentialBundle> {
    let data = fixture("user.pem")?;
    Some(loader::load_bundle(&data, KeyFormat::Pem, None).unwrap())
}

fn tool_certificate() -> Option<ParsedCertificate> {
    let data = fixture("tool-cert.pem")?;
    Some(ParsedCertificate::load(&data).unwrap())
}

fn ca_store() -> Option<TrustStore> {
    let dir = test_data().join("ca-dir");
    if !dir.exists() {
        eprintln!("skipping test: {} not found", dir.display());
        return None;
    }
    Some(TrustStore::open(&dir).unwrap())
}

fn empty_store() -> TrustStore {
    let dir = std::env::temp_dir().join("speaksfor-roundtrip-empty-ca");
    std::fs::create_dir_all(&dir).unwrap();
    TrustStore::open(&dir).unwrap()
}

fn issue_days(days: i64) -> Option<String> {
    let bundle = pem_bundle()?;
    let tool = tool_certificate()?;
    let options = IssueOptions {
        days,
        ..Default::default()
    };
    Some(issue(&bundle, &tool, options, Utc::now()).unwrap())
}

#[test]
fn pem_sign_then_verify() {
    let (Some(xml), Some(store)) = (issue_days(1), ca_store()) else {
        return;
    };

    let report = verify(&xml, &store, None, Utc::now(), false).unwrap();
    assert_eq!(report.head_keyid, USER_KEYID);
    assert_eq!(report.tail_keyid, TOOL_KEYID);

    // expires ≈ now + 1 day
    let delta = report.expires - Utc::now();
    assert!(delta > Duration::hours(23) && delta <= Duration::days(1));

    // nothing supplied for the tail check → warning, not failure
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("tail keyid not verified"));
}

#[test]
fn pkcs12_sign_then_verify() {
    let (Some(p12), Some(tool), Some(store)) =
        (fixture("user.p12"), tool_certificate(), ca_store())
    else {
        return;
    };
    let bundle = loader::load_bundle(&p12, KeyFormat::Pkcs12, Some("123456")).unwrap();
    let xml = issue(&bundle, &tool, IssueOptions::default(), Utc::now()).unwrap();

    let report = verify(&xml, &store, None, Utc::now(), false).unwrap();
    assert_eq!(report.head_keyid, USER_KEYID);
    assert_eq!(report.tail_keyid, TOOL_KEYID);
}

#[test]
fn verify_with_matching_tool_certificate() {
    let (Some(xml), Some(store), Some(tool)) = (issue_days(1), ca_store(), tool_certificate())
    else {
        return;
    };
    let tail = TailExpectation::ToolCertificate(tool);
    let report = verify(&xml, &store, Some(&tail), Utc::now(), false).unwrap();
    assert!(report.warnings.is_empty());
    assert_eq!(
        report.tool_public_id.as_deref(),
        Some("urn:publicid:IDN+example+tool+speaksfor-client")
    );
}

#[test]
fn tampered_digest_fails_signature_stage() {
    let (Some(xml), Some(store)) = (issue_days(1), ca_store()) else {
        return;
    };

    // Flip one character inside the DigestValue.
    let start = xml.find("<DigestValue>").unwrap() + "<DigestValue>".len();
    let mut tampered = xml.clone();
    let original = tampered.as_bytes()[start];
    let replacement = if original == b'A' { b'B' } else { b'A' };
    replace_byte(&mut tampered, start, replacement);

    let err = verify(&tampered, &store, None, Utc::now(), false).unwrap_err();
    assert!(matches!(err, Error::SignatureInvalid(_)), "got: {err}");
}

fn replace_byte(s: &mut String, index: usize, byte: u8) {
    let mut bytes = std::mem::take(s).into_bytes();
    bytes[index] = byte;
    *s = String::from_utf8(bytes).unwrap();
}

#[test]
fn tampered_keyid_fails_signature_stage() {
    let (Some(xml), Some(store)) = (issue_days(1), ca_store()) else {
        return;
    };
    // Change credential content without touching the signature block: the
    // reference digest must no longer match.
    let tampered = xml.replacen(&USER_KEYID[..8], "deadbeef", 1);
    assert_ne!(tampered, xml);
    let err = verify(&tampered, &store, None, Utc::now(), false).unwrap_err();
    assert!(matches!(err, Error::SignatureInvalid(_)), "got: {err}");
}

#[test]
fn expired_credential_fails_stage_four() {
    let (Some(xml), Some(store)) = (issue_days(-1), ca_store()) else {
        return;
    };
    // Stages 1–3 pass (the chain itself is valid); stage 4 rejects.
    let err = verify(&xml, &store, None, Utc::now(), false).unwrap_err();
    assert!(matches!(err, Error::Expired(_)), "got: {err}");
}

#[test]
fn tail_mismatch_fails_stage_six() {
    let (Some(xml), Some(store)) = (issue_days(1), ca_store()) else {
        return;
    };
    let tail = TailExpectation::KeyId("deadbeef".repeat(5));
    let err = verify(&xml, &store, Some(&tail), Utc::now(), false).unwrap_err();
    assert!(matches!(err, Error::KeyBindingMismatch(_)), "got: {err}");
}

#[test]
fn untrusted_ca_fails_stage_three() {
    let Some(xml) = issue_days(1) else { return };
    let err = verify(&xml, &empty_store(), None, Utc::now(), false).unwrap_err();
    assert!(matches!(err, Error::ChainNotTrusted(_)), "got: {err}");
}

#[test]
fn issued_credential_embeds_full_chain() {
    let Some(xml) = issue_days(1) else { return };
    let document = speaksfor_credential::SpeaksForDocument::parse(&xml).unwrap();
    assert!(
        document.signing_chain_der.len() >= 2,
        "expected user + CA certificates in X509Data"
    );
}

#[test]
fn base64_transport_round_trip() {
    use base64::Engine;
    let (Some(xml), Some(store)) = (issue_days(1), ca_store()) else {
        return;
    };
    let encoded = speaksfor_keys::encode::wrap_base64(xml.as_bytes());
    let clean: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(clean)
        .unwrap();
    let xml_again = String::from_utf8(decoded).unwrap();
    verify(&xml_again, &store, None, Utc::now(), false).unwrap();
}
