#![forbid(unsafe_code)]

/// Errors produced by the speaksfor toolkit.
///
/// Each verification stage and loader converts its lower-level failure into
/// exactly one of these kinds with a human-readable reason; callers react to
/// the kind, not the text.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("XML parsing error: {0}")]
    XmlParse(String),

    #[error("invalid XML structure: {0}")]
    XmlStructure(String),

    #[error("malformed input: {0}")]
    InputParse(String),

    #[error("{0}")]
    KeyDecryption(String),

    #[error("{0}")]
    KeyAmbiguity(String),

    #[error("schema validation failed: {0}")]
    SchemaInvalid(String),

    #[error("signature verification failed: {0}")]
    SignatureInvalid(String),

    #[error("certificate chain not trusted: {0}")]
    ChainNotTrusted(String),

    #[error("certificate chain not acceptable: {0}")]
    ChainExpired(String),

    #[error("certificate chain malformed: {0}")]
    ChainMalformed(String),

    #[error("credential expired: {0}")]
    Expired(String),

    #[error("keyid binding mismatch: {0}")]
    KeyBindingMismatch(String),

    #[error("conflicting options: {0}")]
    UsageConflict(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),

    #[error("key error: {0}")]
    Key(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("canonicalization error: {0}")]
    Canonicalization(String),

    #[error("base64 decode error: {0}")]
    Base64(String),

    #[error("missing required element: {0}")]
    MissingElement(String),

    #[error("missing required attribute: {0}")]
    MissingAttribute(String),

    #[error("invalid URI reference: {0}")]
    InvalidUri(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
