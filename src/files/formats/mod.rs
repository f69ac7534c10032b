//! Smart file format handlers
//!
//! Each handler understands one container family well enough to locate the
//! XMP packet, replace it in place, or insert one where the format allows.
//! A handler whose cargo feature is disabled is simply absent; its format
//! then falls back to packet scanning.

#[cfg(feature = "jpeg")]
pub mod jpeg;
#[cfg(feature = "mov")]
pub mod mov;
#[cfg(feature = "pdf")]
pub mod pdf;
#[cfg(feature = "png")]
pub mod png;
#[cfg(feature = "tiff")]
pub mod tiff;
