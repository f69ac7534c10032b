//! File format support for XMP
//!
//! This module classifies containers, decides which handler may serve a
//! session, and locates or rewrites the embedded packet. All implementations
//! are pure Rust; the PDF family goes through `lopdf`.

pub mod capability;
pub mod file;
pub mod format;
pub mod formats;
pub mod handler;
pub mod registry;
pub mod scanner;

pub use capability::{
    capability, select_handler, validate_options, FormatCapability, HandlerChoice, OpenFlag,
    BAD_COMBINATIONS,
};
pub use file::{SessionState, XmpFiles};
pub use format::FileFormat;
#[cfg(feature = "jpeg")]
pub use formats::jpeg::JpegHandler;
#[cfg(feature = "mov")]
pub use formats::mov::MovHandler;
#[cfg(feature = "pdf")]
pub use formats::pdf::PdfHandler;
#[cfg(feature = "png")]
pub use formats::png::PngHandler;
#[cfg(feature = "tiff")]
pub use formats::tiff::TiffHandler;
pub use handler::{FileHandler, XmpOptions};
pub use registry::{default_registry, Handler, HandlerRegistry};
pub use scanner::{PacketLocation, PacketScanner, LIMITED_SCAN_WINDOW};
