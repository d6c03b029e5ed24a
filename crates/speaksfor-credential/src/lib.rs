#![forbid(unsafe_code)]

//! Speaks-for credential assembly and verification.
//!
//! A speaks-for credential is a signed ABAC statement — "user U authorizes
//! tool T to act as U until E" — carried as XML with an enveloped XML-DSig
//! signature. [`builder::issue`] produces one from a signer's credential
//! bundle and the tool's certificate; [`verifier::verify`] runs the strictly
//! ordered verification pipeline over incoming credential bytes.

pub mod builder;
pub mod document;
pub mod schema;
pub mod template;
pub mod verifier;

pub use builder::{issue, IssueOptions};
pub use document::SpeaksForDocument;
pub use verifier::{verify, TailExpectation, VerifyReport};
