//! File handler trait for XMP packets
//!
//! This module defines the open options and the trait that every smart
//! handler implements. Handlers move raw packet buffers; they never parse the
//! metadata inside.

use crate::core::error::XmpResult;
use crate::files::capability::validate_options;
use crate::files::format::FileFormat;
use std::io::{Read, Seek, Write};

/// Options for opening an XMP file session.
///
/// Use the builder pattern to configure options. Options are fixed for the
/// lifetime of one open session.
///
/// # Example
///
/// ```rust,no_run
/// use xmpfiles::{XmpFiles, XmpOptions};
///
/// let mut file = XmpFiles::new();
/// file.open("photo.jpg", XmpOptions::default().for_update().use_smart_handler())?;
/// // ... inject metadata ...
/// file.try_close()?;
/// # Ok::<(), xmpfiles::XmpError>(())
/// ```
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct XmpOptions {
    /// Open for reading and writing (default: read-only)
    pub for_update: bool,
    /// Require the use of a smart handler
    pub use_smart_handler: bool,
    /// Force packet scanning (do not use smart handler)
    pub use_packet_scanning: bool,
    /// Bound the packet scan to the start of the file
    pub limited_scanning: bool,
}

impl XmpOptions {
    /// Open for read-only access (default).
    pub fn for_read(mut self) -> Self {
        self.for_update = false;
        self
    }

    /// Open for reading and writing.
    ///
    /// Files opened for update are written to only when closing.
    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    /// Require the use of a smart handler.
    ///
    /// Do not fall back to packet scanning.
    pub fn use_smart_handler(mut self) -> Self {
        self.use_smart_handler = true;
        self
    }

    /// Force packet scanning.
    ///
    /// Do not use a smart handler.
    pub fn use_packet_scanning(mut self) -> Self {
        self.use_packet_scanning = true;
        self
    }

    /// Only scan the leading part of the file for a packet.
    pub fn limited_scanning(mut self) -> Self {
        self.limited_scanning = true;
        self
    }
}

/// Trait for smart file format handlers
///
/// Each handler understands one container family well enough to locate the
/// XMP packet, replace it, or insert one where none exists.
pub trait FileHandler: Send + Sync {
    /// Check if this handler can handle the given file
    ///
    /// This method should peek at the file header to determine if it matches
    /// the expected format.
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool>;

    /// Locate and read the XMP packet
    ///
    /// # Returns
    ///
    /// * `Ok(Some(packet))` if a packet is found
    /// * `Ok(None)` if the container carries no packet
    /// * `Err(XmpError)` if the container is malformed
    fn read_packet<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<Option<Vec<u8>>>;

    /// Copy the container from `reader` to `writer` with `packet` injected
    ///
    /// # Errors
    ///
    /// * [`XmpError::InjectionUnsupported`](crate::XmpError::InjectionUnsupported)
    ///   if the container has no slot for a packet and none can be created
    /// * any I/O or structural error while rewriting
    fn write_packet<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut R,
        writer: &mut W,
        packet: &[u8],
    ) -> XmpResult<()>;

    /// The container format this handler supports
    fn format(&self) -> FileFormat;

    /// Whether the container has a metadata slot a packet can be written into
    ///
    /// A slot may exist while holding no packet, such as an empty PDF
    /// Metadata stream. Containers that can always take a new packet keep the
    /// default.
    fn has_packet_slot<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool> {
        let _ = reader;
        Ok(true)
    }

    /// Whether this handler may be used under `options`
    fn supports(&self, options: &XmpOptions) -> bool {
        validate_options(self.format(), options).is_ok()
    }
}
