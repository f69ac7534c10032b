//! PDF file format handler
//!
//! PDF XMP Storage:
//! - XMP is stored in a Metadata stream object referenced by the document catalog
//! - The XMP packet is embedded with standard markers:
//!   `<?xpacket begin="..." id="W5M0MpCehiHzreSzNTczkc9d"?>` ... `<?xpacket end="w"?>`
//!
//! Illustrator files are PDF-compatible and share this handler.
//!
//! A document without a Metadata stream is barren: building a new stream and
//! wiring it into the catalog is refused rather than attempted.
//!
//! Reference: Adobe XMP Specification Part 3 - Storage in Files

use crate::core::error::{XmpError, XmpResult};
use crate::files::format::FileFormat;
use crate::files::handler::FileHandler;
use lopdf::{Document, Object, ObjectId, Stream};
use std::io::{Read, Seek, SeekFrom, Write};

/// PDF file signature
const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// PDF-family file handler for XMP packets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PdfHandler {
    format: FileFormat,
}

impl PdfHandler {
    /// Handler for plain PDF documents
    pub fn pdf() -> Self {
        Self {
            format: FileFormat::Pdf,
        }
    }

    /// Handler for Illustrator documents
    pub fn illustrator() -> Self {
        Self {
            format: FileFormat::Illustrator,
        }
    }
}

impl Default for PdfHandler {
    fn default() -> Self {
        Self::pdf()
    }
}

impl FileHandler for PdfHandler {
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool> {
        let pos = reader.stream_position()?;
        let mut header = [0u8; 5];
        let matched = reader.read_exact(&mut header).is_ok() && header == PDF_SIGNATURE;
        reader.seek(SeekFrom::Start(pos))?;
        Ok(matched)
    }

    fn read_packet<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<Option<Vec<u8>>> {
        self.read_xmp(reader)
    }

    fn write_packet<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut R,
        writer: &mut W,
        packet: &[u8],
    ) -> XmpResult<()> {
        self.write_xmp(reader, writer, packet)
    }

    fn format(&self) -> FileFormat {
        self.format
    }

    fn has_packet_slot<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool> {
        reader.rewind()?;
        let doc = self.load(reader)?;
        let Some(metadata_id) = self.metadata_ref(&doc)? else {
            return Ok(false);
        };
        Ok(matches!(doc.get_object(metadata_id), Ok(Object::Stream(_))))
    }
}

impl PdfHandler {
    /// Read the packet held by the catalog's Metadata stream
    ///
    /// # Returns
    ///
    /// * `Ok(Some(packet))` if the catalog references a non-empty Metadata stream
    /// * `Ok(None)` if it does not
    /// * `Err(XmpError::HandlerFault)` if the stream's filters cannot be decoded
    pub fn read_xmp<R: Read>(&self, reader: R) -> XmpResult<Option<Vec<u8>>> {
        let doc = self.load(reader)?;
        let Some(metadata_id) = self.metadata_ref(&doc)? else {
            return Ok(None);
        };

        let xmp_bytes = match doc.get_object(metadata_id) {
            Ok(Object::Stream(stream)) => self.stream_content(stream)?,
            _ => return Ok(None),
        };

        if xmp_bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(xmp_bytes))
    }

    /// Rewrite the Metadata stream in place, keeping its object number
    ///
    /// # Errors
    ///
    /// [`XmpError::InjectionUnsupported`] if the catalog has no Metadata stream.
    pub fn write_xmp<R: Read, W: Write>(
        &self,
        reader: R,
        mut writer: W,
        packet: &[u8],
    ) -> XmpResult<()> {
        let mut doc = self.load(reader)?;
        let Some(metadata_id) = self.metadata_ref(&doc)? else {
            return Err(XmpError::InjectionUnsupported(format!(
                "{} has no Metadata stream to update",
                self.format
            )));
        };

        let stream = doc
            .get_object_mut(metadata_id)
            .and_then(Object::as_stream_mut)
            .map_err(|_| {
                XmpError::InjectionUnsupported(format!(
                    "{} Metadata object is not a stream",
                    self.format
                ))
            })?;
        stream.dict.remove(b"Filter");
        stream.dict.remove(b"DecodeParms");
        stream.set_content(packet.to_vec());

        doc.save_to(&mut writer)
            .map_err(|e| XmpError::fault(self.format, format!("Failed to save PDF: {}", e)))?;
        log::debug!("Rewrote {} Metadata stream {:?}", self.format, metadata_id);
        Ok(())
    }

    /// Decoded bytes of a Metadata stream
    fn stream_content(&self, stream: &Stream) -> XmpResult<Vec<u8>> {
        // XMP streams are normally stored unfiltered
        if !stream.dict.has(b"Filter") {
            return Ok(stream.content.clone());
        }
        let decoded = stream.decompressed_content().map_err(|e| {
            XmpError::fault(self.format, format!("Cannot decode Metadata stream: {}", e))
        })?;
        // A failed inflate comes back empty rather than as an error
        if decoded.is_empty() && !stream.content.is_empty() {
            return Err(XmpError::fault(
                self.format,
                "Metadata stream does not decode with its declared filter",
            ));
        }
        Ok(decoded)
    }

    fn load<R: Read>(&self, reader: R) -> XmpResult<Document> {
        Document::load_from(reader)
            .map_err(|e| XmpError::fault(self.format, format!("Failed to load PDF: {}", e)))
    }

    /// Object id of the catalog's Metadata stream, if any
    fn metadata_ref(&self, doc: &Document) -> XmpResult<Option<ObjectId>> {
        let catalog = doc.catalog().map_err(|e| {
            XmpError::fault(self.format, format!("Failed to get PDF catalog: {}", e))
        })?;
        Ok(catalog
            .get(b"Metadata")
            .ok()
            .and_then(|obj| obj.as_reference().ok()))
    }
}
