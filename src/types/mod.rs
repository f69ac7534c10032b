//! Common types for XMP metadata

pub mod value;

pub use value::{ArrayItem, ArrayKind, XmpValue};
