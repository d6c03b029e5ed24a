#![forbid(unsafe_code)]

//! KeyInfo handling: a builder producing `<KeyInfo>` XML from a bundle and
//! an extractor recovering the certificate chain from a parsed signature.
//!
//! Both shapes expose the same small capability — the PEM-wrapped chain
//! text — which is what the trust store consumes.

use base64::Engine;
use rsa::traits::PublicKeyParts;
use speaksfor_core::{ns, Error, Result};

use crate::cert::ParsedCertificate;
use crate::encode;

/// Builds the `<KeyInfo>` block for an enveloped credential signature: a
/// `KeyValue/RSAKeyValue` of the signing public key and an `X509Data`
/// listing the whole chain.
pub struct KeyInfoBuilder<'a> {
    public_key: &'a rsa::RsaPublicKey,
    chain: &'a [ParsedCertificate],
}

impl<'a> KeyInfoBuilder<'a> {
    pub fn new(public_key: &'a rsa::RsaPublicKey, chain: &'a [ParsedCertificate]) -> Self {
        Self { public_key, chain }
    }

    /// Render the `<KeyInfo>` element.
    pub fn to_xml(&self) -> Result<String> {
        let modulus = encode::wrap_base64(&encode::positive_int_bytes(
            &self.public_key.n().to_bytes_be(),
        ));
        let exponent = encode::wrap_base64(&encode::positive_int_bytes(
            &self.public_key.e().to_bytes_be(),
        ));

        let mut xml = String::new();
        xml.push_str("<KeyInfo>");
        xml.push_str("<KeyValue><RSAKeyValue>");
        xml.push_str(&format!("<Modulus>{modulus}</Modulus>"));
        xml.push_str(&format!("<Exponent>{exponent}</Exponent>"));
        xml.push_str("</RSAKeyValue></KeyValue>");
        xml.push_str("<X509Data>");
        for cert in self.chain {
            let body = encode::pem_body(&cert.to_pem()?);
            xml.push_str(&format!("<X509Certificate>{body}</X509Certificate>"));
        }
        xml.push_str("</X509Data>");
        xml.push_str("</KeyInfo>");
        Ok(xml)
    }

    /// The chain as PEM-wrapped text.
    pub fn chain_pem(&self) -> Result<String> {
        let mut out = String::new();
        for cert in self.chain {
            out.push_str(&cert.to_pem()?);
        }
        Ok(out)
    }
}

/// Extracts the certificate chain from the `X509Data` of a parsed
/// `<Signature>` element. The first certificate is the signing certificate.
pub struct KeyInfoExtractor {
    chain_der: Vec<Vec<u8>>,
}

impl KeyInfoExtractor {
    /// Read `KeyInfo/X509Data/X509Certificate` entries under a Signature
    /// element, in document order.
    pub fn from_signature_node(sig_node: roxmltree::Node<'_, '_>) -> Result<Self> {
        let key_info = find_dsig_child(sig_node, ns::node::KEY_INFO)
            .ok_or_else(|| Error::MissingElement("KeyInfo".into()))?;
        let x509_data = find_dsig_child(key_info, ns::node::X509_DATA)
            .ok_or_else(|| Error::MissingElement("X509Data".into()))?;

        let engine = base64::engine::general_purpose::STANDARD;
        let mut chain_der = Vec::new();
        for child in x509_data.children() {
            if !child.is_element() || child.tag_name().name() != ns::node::X509_CERTIFICATE {
                continue;
            }
            let b64 = child.text().unwrap_or("");
            let clean: String = b64.chars().filter(|c| !c.is_whitespace()).collect();
            let der = engine
                .decode(&clean)
                .map_err(|e| Error::Base64(format!("X509Certificate: {e}")))?;
            chain_der.push(der);
        }

        if chain_der.is_empty() {
            return Err(Error::MissingElement(
                "X509Data holds no X509Certificate".into(),
            ));
        }
        Ok(Self { chain_der })
    }

    /// The raw DER chain in document order.
    pub fn chain_der(&self) -> &[Vec<u8>] {
        &self.chain_der
    }

    /// The first certificate — the one the signature was produced with.
    pub fn signing_certificate(&self) -> Result<ParsedCertificate> {
        ParsedCertificate::from_der(&self.chain_der[0])
    }

    /// The chain as PEM-wrapped text.
    pub fn chain_pem(&self) -> Result<String> {
        let mut out = String::new();
        for der in &self.chain_der {
            out.push_str(&encode::der_to_pem("CERTIFICATE", der)?);
        }
        Ok(out)
    }
}

fn find_dsig_child<'a>(
    parent: roxmltree::Node<'a, 'a>,
    local_name: &str,
) -> Option<roxmltree::Node<'a, 'a>> {
    parent.children().find(|n| {
        n.is_element()
            && n.tag_name().name() == local_name
            && n.tag_name().namespace().unwrap_or("") == ns::DSIG
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extractor_reads_chain_in_order() {
        let xml = format!(
            r#"<Signature xmlns="{dsig}"><KeyInfo><X509Data>
                 <X509Certificate>AAEC</X509Certificate>
                 <X509Certificate>AwQF</X509Certificate>
               </X509Data></KeyInfo></Signature>"#,
            dsig = ns::DSIG
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        let extractor = KeyInfoExtractor::from_signature_node(doc.root_element()).unwrap();
        assert_eq!(extractor.chain_der(), &[vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn extractor_requires_a_certificate() {
        let xml = format!(
            r#"<Signature xmlns="{dsig}"><KeyInfo><X509Data/></KeyInfo></Signature>"#,
            dsig = ns::DSIG
        );
        let doc = roxmltree::Document::parse(&xml).unwrap();
        assert!(KeyInfoExtractor::from_signature_node(doc.root_element()).is_err());
    }
}
