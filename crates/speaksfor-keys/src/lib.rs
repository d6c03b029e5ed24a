#![forbid(unsafe_code)]

//! Key and certificate handling for the speaksfor toolkit.
//!
//! A signer is loaded into a [`CredentialBundle`]: one RSA private key plus
//! the ordered certificate chain whose first element is the end-entity
//! certificate matching that key. Sources are PEM (PKCS#1/PKCS#8, plain or
//! encrypted) and PKCS#12.

pub mod bundle;
pub mod cert;
pub mod encode;
pub mod fingerprint;
pub mod keyinfo;
pub mod loader;
pub mod pem;

pub use bundle::CredentialBundle;
pub use cert::ParsedCertificate;
pub use loader::KeyFormat;
