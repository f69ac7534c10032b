//! # xmpfiles
//!
//! Locate, read and safely rewrite the XMP packet embedded in TIFF, JPEG,
//! PNG, PDF, Illustrator and QuickTime files, and in plain `.xmp` sidecars.
//!
//! A file is opened through an [`XmpFiles`] session. Opening classifies the
//! container, validates the [`XmpOptions`] against the format, and selects
//! either a structure-aware smart handler or the generic [`PacketScanner`].
//! Injected packets are staged in memory and written back on close.
//!
//! ```rust,no_run
//! use xmpfiles::{ns, XmpFiles, XmpOptions};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut file = XmpFiles::open_file("photo.tif", XmpOptions::default().for_update())?;
//! let mut meta = file.get_metadata()?;
//! meta.set_property(ns::DC, "format", "image/tiff")?;
//! file.inject(&meta)?;
//! file.try_close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! Each smart handler sits behind a cargo feature (`tiff`, `jpeg`, `png`,
//! `pdf`, `mov`; all enabled by `full-formats`). A format whose handler is
//! compiled out is served by packet scanning only.

pub mod core;
pub mod files;
pub mod types;

pub use crate::core::error::{ErrorKind, XmpError, XmpResult};
pub use crate::core::metadata::{PropertyKey, XmpMeta};
pub use crate::core::namespace::ns;
pub use crate::core::packet::XmpPacket;
pub use crate::files::capability::{capability, FormatCapability, HandlerChoice};
pub use crate::files::file::{SessionState, XmpFiles};
pub use crate::files::format::FileFormat;
pub use crate::files::handler::XmpOptions;
pub use crate::files::scanner::PacketScanner;
pub use crate::types::value::{ArrayItem, ArrayKind, XmpValue};
