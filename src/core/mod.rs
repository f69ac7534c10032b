//! XMP Core module
//!
//! The metadata side of the crate: the error taxonomy, a small property model,
//! and the parser/serializer that turn it into XMP packets and back.

pub mod error;
pub mod metadata;
pub mod namespace;
pub mod packet;
pub mod parser;
pub mod serializer;

pub use error::{ErrorKind, XmpError, XmpResult};
pub use metadata::{PropertyKey, XmpMeta};
pub use namespace::ns;
pub use packet::XmpPacket;
pub use parser::XmpParser;
pub use serializer::XmpSerializer;
