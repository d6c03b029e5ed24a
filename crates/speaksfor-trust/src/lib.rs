#![forbid(unsafe_code)]

//! Trust anchor store and chain evaluation.
//!
//! Anchors live in an OpenSSL-style hash directory: each CA PEM is
//! addressed by a `<subject_hash>.N` name. Chain evaluation walks from the
//! presented end-entity certificate up to a self-signed trusted anchor,
//! verifying each signature along the way, and reports expiry of any
//! certificate in the chain distinctly from a trust failure.

pub mod chain;
pub mod store;
pub mod subject_hash;

pub use chain::verify_chain;
pub use store::TrustStore;
