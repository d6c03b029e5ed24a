#![forbid(unsafe_code)]

//! Enveloped XML-DSig for the speaks-for credential profile.
//!
//! The profile is deliberately narrow: exclusive C14N (with the `xml:id`
//! fixup), RSA PKCS#1 v1.5 signatures, one `Reference` resolved through the
//! `id` attribute, and the certificate chain carried inline in `X509Data`.
//! Anything outside the profile is rejected rather than silently accepted.

pub mod sign;
pub mod verify;

pub use sign::sign_document;
pub use verify::{verify_enveloped, VerifiedSignature};
