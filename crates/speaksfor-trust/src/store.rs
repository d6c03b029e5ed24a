#![forbid(unsafe_code)]

//! The trust anchor store: a directory of CA certificates addressed by
//! OpenSSL subject-hash names (`<hash>.0`, `<hash>.1`, …).
//!
//! The folder is scanned once at open; anchors are indexed both by their
//! file-stem hash and by subject DER, so lookups succeed even against
//! folders whose hash links were produced by a different OpenSSL
//! generation. Files that do not parse as certificates are skipped.

use speaksfor_core::{Error, Result};
use speaksfor_keys::{pem, ParsedCertificate};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::subject_hash;

/// One trust anchor, with the file it came from for diagnostics.
pub struct Anchor {
    pub cert: ParsedCertificate,
    pub path: PathBuf,
}

/// A scanned CA folder.
pub struct TrustStore {
    anchors: Vec<Anchor>,
    by_hash: HashMap<String, Vec<usize>>,
    by_subject: HashMap<Vec<u8>, Vec<usize>>,
}

impl TrustStore {
    /// Scan a CA folder. A missing directory is an error; an empty one is a
    /// valid (if useless) store.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("CA folder not found: {}", dir.display()),
            )));
        }

        let mut store = Self {
            anchors: Vec::new(),
            by_hash: HashMap::new(),
            by_subject: HashMap::new(),
        };

        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let Ok(data) = std::fs::read(&path) else { continue };
            for cert in parse_all_certs(&data) {
                store.add_anchor(cert, &path);
            }
        }
        Ok(store)
    }

    fn add_anchor(&mut self, cert: ParsedCertificate, path: &Path) {
        let index = self.anchors.len();
        if let Some(stem_hash) = hash_file_stem(path) {
            self.by_hash.entry(stem_hash).or_default().push(index);
        }
        if let Ok(subject) = cert.subject_der() {
            self.by_subject.entry(subject).or_default().push(index);
        }
        self.anchors.push(Anchor {
            cert,
            path: path.to_path_buf(),
        });
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    /// Anchors whose subject matches the given issuer name. The subject-hash
    /// index is consulted first; the subject-DER index is authoritative.
    pub fn find_issuer_anchors(&self, issuer: &x509_cert::name::Name) -> Result<Vec<&Anchor>> {
        let issuer_der = der::Encode::to_der(issuer)
            .map_err(|e| Error::Certificate(format!("failed to encode issuer: {e}")))?;

        let mut indices: Vec<usize> = Vec::new();
        if let Ok(hash) = subject_hash::subject_hash(issuer) {
            if let Some(hashed) = self.by_hash.get(&hash) {
                indices.extend(hashed.iter().copied());
            }
        }
        if let Some(matched) = self.by_subject.get(&issuer_der) {
            indices.extend(matched.iter().copied());
        }
        indices.sort_unstable();
        indices.dedup();

        // The hash pre-filter may pull in unrelated anchors on collision;
        // keep only true subject matches.
        Ok(indices
            .into_iter()
            .map(|i| &self.anchors[i])
            .filter(|a| {
                a.cert
                    .subject_der()
                    .is_ok_and(|subject| subject == issuer_der)
            })
            .collect())
    }
}

/// Parse every certificate found in a file (PEM with any number of
/// CERTIFICATE blocks, or a single DER).
fn parse_all_certs(data: &[u8]) -> Vec<ParsedCertificate> {
    if data.starts_with(b"-----BEGIN") || data.windows(10).any(|w| w == b"-----BEGIN") {
        let Ok(text) = std::str::from_utf8(data) else {
            return Vec::new();
        };
        let Ok(regions) = pem::scan_regions(text) else {
            return Vec::new();
        };
        regions
            .iter()
            .filter(|r| r.label == "CERTIFICATE")
            .filter_map(|r| r.decode().ok())
            .filter_map(|der| ParsedCertificate::from_der(&der).ok())
            .collect()
    } else {
        ParsedCertificate::from_der(data).into_iter().collect()
    }
}

/// Extract the hash part of an OpenSSL-style `<hash>.N` file name.
fn hash_file_stem(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let (stem, suffix) = name.split_once('.')?;
    if stem.len() == 8
        && stem.chars().all(|c| c.is_ascii_hexdigit() && !c.is_uppercase())
        && suffix.chars().all(|c| c.is_ascii_digit())
        && !suffix.is_empty()
    {
        Some(stem.to_owned())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_stem_recognition() {
        assert_eq!(
            hash_file_stem(Path::new("/ca/0a1b2c3d.0")),
            Some("0a1b2c3d".to_owned())
        );
        assert_eq!(
            hash_file_stem(Path::new("/ca/0a1b2c3d.12")),
            Some("0a1b2c3d".to_owned())
        );
        assert_eq!(hash_file_stem(Path::new("/ca/readme.txt")), None);
        assert_eq!(hash_file_stem(Path::new("/ca/ca-cert.pem")), None);
        assert_eq!(hash_file_stem(Path::new("/ca/0A1B2C3D.0")), None);
    }

    #[test]
    fn empty_folder_is_a_valid_store() {
        let dir = std::env::temp_dir().join("speaksfor-empty-ca-test");
        std::fs::create_dir_all(&dir).unwrap();
        let store = TrustStore::open(&dir).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn missing_folder_is_an_error() {
        assert!(TrustStore::open(Path::new("/nonexistent/ca/folder")).is_err());
    }

    #[test]
    fn scans_fixture_folder() {
        let dir = std::path::Path::new("../../test-data/ca-dir");
        if !dir.exists() {
            eprintln!("skipping test: {} not found", dir.display());
            return;
        }
        let store = TrustStore::open(dir).unwrap();
        assert!(!store.is_empty());

        let anchor = &store.anchors()[0];
        let found = store
            .find_issuer_anchors(&anchor.cert.inner().tbs_certificate.subject)
            .unwrap();
        assert!(!found.is_empty());
    }
}
