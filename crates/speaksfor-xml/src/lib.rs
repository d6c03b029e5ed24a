#![forbid(unsafe_code)]

//! XML document helpers for the speaksfor toolkit.
//!
//! Thin utilities over `roxmltree`: namespace-aware element lookup,
//! registered-ID maps with duplicate rejection, and the `NodeSet` type used
//! for document-subset canonicalization.

pub mod dom;
pub mod ids;
pub mod nodeset;

pub use nodeset::NodeSet;

/// Parsing options used across the toolkit.
pub fn parsing_options() -> roxmltree::ParsingOptions {
    roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    }
}
