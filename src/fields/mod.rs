//! Documentation field extraction.
//!
//! - [`source`]: source-type inference and confidence attribution.
//! - [`extractor`]: schema-driven field matching per documentation section.

pub mod extractor;
pub mod source;
