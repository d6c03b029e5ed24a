#![forbid(unsafe_code)]

//! XML namespace constants and element vocabularies.

/// XML Digital Signature namespace
pub const DSIG: &str = "http://www.w3.org/2000/09/xmldsig#";

/// Exclusive C14N namespace
pub const EXC_C14N: &str = "http://www.w3.org/2001/10/xml-exc-c14n#";

/// XML namespace (bound to the reserved `xml` prefix)
pub const XML: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS: &str = "http://www.w3.org/2000/xmlns/";

// ── XML-DSig element names ───────────────────────────────────────────

pub mod node {
    pub const SIGNATURE: &str = "Signature";
    pub const SIGNED_INFO: &str = "SignedInfo";
    pub const CANONICALIZATION_METHOD: &str = "CanonicalizationMethod";
    pub const SIGNATURE_METHOD: &str = "SignatureMethod";
    pub const SIGNATURE_VALUE: &str = "SignatureValue";
    pub const DIGEST_METHOD: &str = "DigestMethod";
    pub const DIGEST_VALUE: &str = "DigestValue";
    pub const REFERENCE: &str = "Reference";
    pub const TRANSFORMS: &str = "Transforms";
    pub const TRANSFORM: &str = "Transform";
    pub const INCLUSIVE_NAMESPACES: &str = "InclusiveNamespaces";

    pub const KEY_INFO: &str = "KeyInfo";
    pub const KEY_VALUE: &str = "KeyValue";
    pub const RSA_KEY_VALUE: &str = "RSAKeyValue";
    pub const RSA_MODULUS: &str = "Modulus";
    pub const RSA_EXPONENT: &str = "Exponent";

    pub const X509_DATA: &str = "X509Data";
    pub const X509_CERTIFICATE: &str = "X509Certificate";
}

// ── Attribute names ──────────────────────────────────────────────────

pub mod attr {
    pub const ID: &str = "Id";
    pub const URI: &str = "URI";
    pub const ALGORITHM: &str = "Algorithm";
    pub const PREFIX_LIST: &str = "PrefixList";
}

// ── Speaks-for credential vocabulary ─────────────────────────────────

/// Element names of the ABAC credential document. The credential elements
/// carry no namespace.
pub mod cred {
    pub const SIGNED_CREDENTIAL: &str = "signed-credential";
    pub const CREDENTIAL: &str = "credential";
    pub const SIGNATURES: &str = "signatures";
    pub const TYPE: &str = "type";
    pub const SERIAL: &str = "serial";
    pub const OWNER_GID: &str = "owner_gid";
    pub const TARGET_GID: &str = "target_gid";
    pub const UUID: &str = "uuid";
    pub const EXPIRES: &str = "expires";
    pub const ABAC: &str = "abac";
    pub const RT0: &str = "rt0";
    pub const VERSION: &str = "version";
    pub const HEAD: &str = "head";
    pub const TAIL: &str = "tail";
    pub const ABAC_PRINCIPAL: &str = "ABACprincipal";
    pub const KEYID: &str = "keyid";
    pub const ROLE: &str = "role";

    /// Credential type carried by `<type>`.
    pub const TYPE_ABAC: &str = "abac";

    /// ABAC rule version carried by `<version>`.
    pub const RT0_VERSION: &str = "1.1";

    /// Reference anchor shared by `xml:id` and `id` on `<credential>`.
    pub const REF_ID: &str = "ref0";
}

/// Prefix a tool certificate's SubjectAltName URI must carry to count as
/// the tool's publicId.
pub const PUBLICID_URN_PREFIX: &str = "urn:publicid:";
