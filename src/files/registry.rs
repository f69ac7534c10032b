//! File handler registry for XMP packets
//!
//! This module provides the closed set of smart handlers and a registry for
//! looking them up by format.

use crate::core::error::XmpResult;
use crate::files::format::FileFormat;
use crate::files::handler::FileHandler;
use std::io::{Read, Seek, Write};

/// Enum of supported smart handlers
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub enum Handler {
    #[cfg(feature = "jpeg")]
    Jpeg(crate::files::formats::jpeg::JpegHandler),
    #[cfg(feature = "mov")]
    Mov(crate::files::formats::mov::MovHandler),
    #[cfg(feature = "pdf")]
    Pdf(crate::files::formats::pdf::PdfHandler),
    #[cfg(feature = "png")]
    Png(crate::files::formats::png::PngHandler),
    #[cfg(feature = "tiff")]
    Tiff(crate::files::formats::tiff::TiffHandler),
}

impl FileHandler for Handler {
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool> {
        match self {
            #[cfg(feature = "jpeg")]
            Handler::Jpeg(h) => h.can_handle(reader),
            #[cfg(feature = "mov")]
            Handler::Mov(h) => h.can_handle(reader),
            #[cfg(feature = "pdf")]
            Handler::Pdf(h) => h.can_handle(reader),
            #[cfg(feature = "png")]
            Handler::Png(h) => h.can_handle(reader),
            #[cfg(feature = "tiff")]
            Handler::Tiff(h) => h.can_handle(reader),
        }
    }

    fn read_packet<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<Option<Vec<u8>>> {
        match self {
            #[cfg(feature = "jpeg")]
            Handler::Jpeg(h) => h.read_packet(reader),
            #[cfg(feature = "mov")]
            Handler::Mov(h) => h.read_packet(reader),
            #[cfg(feature = "pdf")]
            Handler::Pdf(h) => h.read_packet(reader),
            #[cfg(feature = "png")]
            Handler::Png(h) => h.read_packet(reader),
            #[cfg(feature = "tiff")]
            Handler::Tiff(h) => h.read_packet(reader),
        }
    }

    fn write_packet<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut R,
        writer: &mut W,
        packet: &[u8],
    ) -> XmpResult<()> {
        match self {
            #[cfg(feature = "jpeg")]
            Handler::Jpeg(h) => h.write_packet(reader, writer, packet),
            #[cfg(feature = "mov")]
            Handler::Mov(h) => h.write_packet(reader, writer, packet),
            #[cfg(feature = "pdf")]
            Handler::Pdf(h) => h.write_packet(reader, writer, packet),
            #[cfg(feature = "png")]
            Handler::Png(h) => h.write_packet(reader, writer, packet),
            #[cfg(feature = "tiff")]
            Handler::Tiff(h) => h.write_packet(reader, writer, packet),
        }
    }

    fn format(&self) -> FileFormat {
        match self {
            #[cfg(feature = "jpeg")]
            Handler::Jpeg(h) => h.format(),
            #[cfg(feature = "mov")]
            Handler::Mov(h) => h.format(),
            #[cfg(feature = "pdf")]
            Handler::Pdf(h) => h.format(),
            #[cfg(feature = "png")]
            Handler::Png(h) => h.format(),
            #[cfg(feature = "tiff")]
            Handler::Tiff(h) => h.format(),
        }
    }

    fn has_packet_slot<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool> {
        match self {
            #[cfg(feature = "jpeg")]
            Handler::Jpeg(h) => h.has_packet_slot(reader),
            #[cfg(feature = "mov")]
            Handler::Mov(h) => h.has_packet_slot(reader),
            #[cfg(feature = "pdf")]
            Handler::Pdf(h) => h.has_packet_slot(reader),
            #[cfg(feature = "png")]
            Handler::Png(h) => h.has_packet_slot(reader),
            #[cfg(feature = "tiff")]
            Handler::Tiff(h) => h.has_packet_slot(reader),
        }
    }
}

/// Registry for smart handlers
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    handlers: Vec<Handler>,
}

impl HandlerRegistry {
    /// Create a new handler registry with every compiled-in handler
    pub fn new() -> Self {
        let handlers = vec![
            #[cfg(feature = "tiff")]
            Handler::Tiff(crate::files::formats::tiff::TiffHandler),
            #[cfg(feature = "jpeg")]
            Handler::Jpeg(crate::files::formats::jpeg::JpegHandler),
            #[cfg(feature = "png")]
            Handler::Png(crate::files::formats::png::PngHandler),
            #[cfg(feature = "pdf")]
            Handler::Pdf(crate::files::formats::pdf::PdfHandler::pdf()),
            #[cfg(feature = "pdf")]
            Handler::Pdf(crate::files::formats::pdf::PdfHandler::illustrator()),
            #[cfg(feature = "mov")]
            Handler::Mov(crate::files::formats::mov::MovHandler),
        ];
        Self { handlers }
    }

    /// Find the handler serving `format`
    pub fn find_by_format(&self, format: FileFormat) -> Option<&Handler> {
        self.handlers.iter().find(|h| h.format() == format)
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry holding every compiled-in smart handler
pub fn default_registry() -> HandlerRegistry {
    HandlerRegistry::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::capability::capability;
    use crate::files::handler::XmpOptions;
    use std::io::Cursor;

    fn accepts(format: FileFormat, data: &[u8]) -> bool {
        let registry = HandlerRegistry::new();
        let handler = registry.find_by_format(format).unwrap();
        let mut reader = Cursor::new(data.to_vec());
        let accepted = handler.can_handle(&mut reader).unwrap();
        // Detection leaves the reader where it was
        assert_eq!(reader.position(), 0);
        accepted
    }

    #[test]
    fn test_registry_matches_capabilities() {
        let registry = HandlerRegistry::new();
        let smart = XmpOptions::default().use_smart_handler();
        for format in FileFormat::ALL {
            let handler = registry.find_by_format(format);
            assert_eq!(handler.is_some(), capability(format).has_smart_handler);
            if let Some(handler) = handler {
                // The PDF family cannot promise injection into barren files
                let pdf_family = matches!(format, FileFormat::Pdf | FileFormat::Illustrator);
                assert_eq!(handler.supports(&smart), !pdf_family);
                assert!(handler.supports(&XmpOptions::default()));
            }
        }
    }

    #[test]
    fn test_no_handler_for_text_or_unknown() {
        let registry = HandlerRegistry::new();
        assert!(registry.find_by_format(FileFormat::Text).is_none());
        assert!(registry.find_by_format(FileFormat::Unknown).is_none());
    }

    #[cfg(feature = "jpeg")]
    #[test]
    fn test_can_handle_jpeg() {
        assert!(accepts(FileFormat::Jpeg, &[0xFF, 0xD8, 0xFF, 0xE0]));
        assert!(!accepts(FileFormat::Jpeg, &[0x00, 0x01, 0x02, 0x03]));
    }

    #[cfg(feature = "pdf")]
    #[test]
    fn test_can_handle_pdf_family() {
        let header = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n";
        assert!(accepts(FileFormat::Pdf, header));
        assert!(accepts(FileFormat::Illustrator, header));
    }

    #[cfg(feature = "png")]
    #[test]
    fn test_can_handle_png() {
        assert!(accepts(
            FileFormat::Png,
            &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
        ));
    }

    #[cfg(feature = "tiff")]
    #[test]
    fn test_can_handle_tiff() {
        assert!(accepts(
            FileFormat::Tiff,
            &[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]
        ));
        assert!(accepts(
            FileFormat::Tiff,
            &[0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]
        ));
    }

    #[cfg(feature = "mov")]
    #[test]
    fn test_can_handle_mov() {
        let data = [
            0x00, 0x00, 0x00, 0x14, b'f', b't', b'y', b'p', b'q', b't', b' ', b' ', 0, 0, 0, 0,
            b'q', b't', b' ', b' ',
        ];
        assert!(accepts(FileFormat::Mov, &data));
    }
}
