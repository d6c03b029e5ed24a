#![forbid(unsafe_code)]

//! Shared foundation for the speaksfor toolkit: the error type every crate
//! converges on, plus XML namespace, element, and algorithm URI constants.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Error, Result};
