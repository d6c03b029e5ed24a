#![forbid(unsafe_code)]

//! Cryptographic algorithms for the speaksfor credential profile.
//!
//! Digest and signature algorithms are addressed by their XML-DSig URI.
//! The deployed profile is SHA-1 / RSA-SHA1; the SHA-256 suite is registered
//! alongside so a future transition is a constant swap.

pub mod digest;
pub mod sign;

pub use sign::{SignatureSuite, SigningKey};
