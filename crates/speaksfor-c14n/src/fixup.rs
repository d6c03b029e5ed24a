#![forbid(unsafe_code)]

//! The `xml:id` namespace fixup.
//!
//! Per XML C14N 1.1, `xml:id` is not a simple inheritable attribute and must
//! not receive an empty-namespace propagation. Widely deployed XML-DSig
//! libraries nonetheless emit `xmlns:xml="" xml:id` in canonical output, and
//! the Fed4FIRE verifiers patch exactly that byte sequence away before
//! digesting. Reproducing the patched form bit-exactly is an interop
//! requirement, so the rewrite runs over every canonical buffer this crate
//! produces, on the signing and verifying paths alike.

const BROKEN: &[u8] = b"xmlns:xml=\"\" xml:id";
const FIXED: &[u8] = b"xml:id";

/// Rewrite every occurrence of `xmlns:xml="" xml:id` to `xml:id`.
pub fn apply(input: Vec<u8>) -> Vec<u8> {
    if find(&input, 0).is_none() {
        return input;
    }
    let mut out = Vec::with_capacity(input.len());
    let mut pos = 0;
    while let Some(hit) = find(&input, pos) {
        out.extend_from_slice(&input[pos..hit]);
        out.extend_from_slice(FIXED);
        pos = hit + BROKEN.len();
    }
    out.extend_from_slice(&input[pos..]);
    out
}

fn find(haystack: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(BROKEN.len())
        .position(|w| w == BROKEN)
        .map(|i| i + from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rewrites_broken_sequence() {
        let input = br#"<credential xmlns:xml="" xml:id="ref0" id="ref0">"#.to_vec();
        let out = apply(input);
        assert_eq!(out, br#"<credential xml:id="ref0" id="ref0">"#.to_vec());
    }

    #[test]
    fn rewrites_every_occurrence() {
        let input = br#"<a xmlns:xml="" xml:id="1"><b xmlns:xml="" xml:id="2"/></a>"#.to_vec();
        let out = apply(input);
        assert_eq!(out, br#"<a xml:id="1"><b xml:id="2"/></a>"#.to_vec());
    }

    #[test]
    fn leaves_clean_output_alone() {
        let input = br#"<credential xml:id="ref0">"#.to_vec();
        assert_eq!(apply(input.clone()), input);
    }
}
