//! JPEG file format handler
//!
//! JPEG XMP Storage:
//! - The XMP Packet is stored in an APP1 segment with identifier
//!   `http://ns.adobe.com/xap/1.0/\0`
//! - Extended XMP segments (`.../xap/1.0/ext/`) are dropped on rewrite; the
//!   standard segment alone must hold the packet
//! - APP1 segment size limit: 65535 bytes including the length field

use crate::core::error::{XmpError, XmpResult};
use crate::files::format::FileFormat;
use crate::files::handler::FileHandler;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// JPEG segment markers
const MARKER_SOI: u8 = 0xD8; // Start of Image
const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
const MARKER_SOS: u8 = 0xDA; // Start of Scan
const MARKER_EOI: u8 = 0xD9; // End of Image
const MARKER_TEM: u8 = 0x01;

/// XMP namespace identifier in APP1 segment
const XMP_NAMESPACE: &[u8] = b"http://ns.adobe.com/xap/1.0/\0";

/// Extended XMP namespace identifier
const EXTENDED_XMP_NAMESPACE: &[u8] = b"http://ns.adobe.com/xap/1.0/ext/\0";

/// Exif signature in APP1 segment
const EXIF_SIGNATURE: &[u8] = b"Exif\0";

/// Largest packet an APP1 segment can carry after the length and identifier
pub const MAX_XMP_PACKET: usize = 65535 - 2 - XMP_NAMESPACE.len();

/// JPEG file handler for XMP packets
#[derive(Debug, Clone, Copy)]
pub struct JpegHandler;

impl FileHandler for JpegHandler {
    /// Check if this is a valid JPEG file:
    /// 1. Check for SOI marker (0xFFD8) at offset 0
    /// 2. Skip any 0xFF padding bytes
    /// 3. Validate the second marker ID
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool> {
        let pos = reader.stream_position()?;
        let mut buffer = [0u8; 100];
        let bytes_read = read_up_to(reader, &mut buffer)?;
        reader.seek(SeekFrom::Start(pos))?;

        if bytes_read < 2 || buffer[0] != 0xFF || buffer[1] != MARKER_SOI {
            return Ok(false);
        }

        // Skip 0xFF padding and high order 0xFF of next marker
        let mut buffer_pos = 2;
        while buffer_pos < bytes_read && buffer[buffer_pos] == 0xFF {
            buffer_pos += 1;
        }
        if buffer_pos >= bytes_read {
            return Ok(true);
        }

        let id = buffer[buffer_pos];
        if id >= 0xDD {
            return Ok(true);
        }
        // Standalone markers and anything below 0xC0 cannot follow SOI
        Ok(!(id < 0xC0 || (id & 0xF8) == 0xD0 || id == 0xD8 || id == 0xDA || id == 0xDC))
    }

    fn read_packet<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<Option<Vec<u8>>> {
        Self::read_xmp(reader)
    }

    fn write_packet<R: Read + Seek, W: Write + Seek>(
        &self,
        reader: &mut R,
        writer: &mut W,
        packet: &[u8],
    ) -> XmpResult<()> {
        Self::write_xmp(reader, writer, packet)
    }

    fn format(&self) -> FileFormat {
        FileFormat::Jpeg
    }
}

impl JpegHandler {
    /// Read the standard XMP packet from a JPEG stream
    ///
    /// # Returns
    ///
    /// * `Ok(Some(packet))` if an XMP APP1 segment precedes the first scan
    /// * `Ok(None)` if there is none
    pub fn read_xmp<R: Read + Seek>(mut reader: R) -> XmpResult<Option<Vec<u8>>> {
        Self::read_soi(&mut reader)?;

        while let Some(marker) = Self::next_marker(&mut reader)? {
            if marker == MARKER_SOS || marker == MARKER_EOI {
                break;
            }
            if is_standalone(marker) {
                continue;
            }
            if marker == MARKER_APP1 {
                let content = Self::read_segment(&mut reader)?;
                if Self::is_xmp_segment(&content) {
                    return Ok(Some(content[XMP_NAMESPACE.len()..].to_vec()));
                }
            } else {
                let length = Self::read_segment_length(&mut reader)?;
                reader.seek(SeekFrom::Current(i64::from(length) - 2))?;
            }
        }
        Ok(None)
    }

    /// Copy a JPEG stream, replacing its XMP with `packet`
    ///
    /// The new APP1 segment goes after any leading APP0 (JFIF) and Exif
    /// segments. Existing standard and extended XMP segments are dropped.
    pub fn write_xmp<R: Read + Seek, W: Write>(
        mut reader: R,
        mut writer: W,
        packet: &[u8],
    ) -> XmpResult<()> {
        if packet.len() > MAX_XMP_PACKET {
            return Err(XmpError::InjectionUnsupported(format!(
                "JPEG packet of {} bytes exceeds the {} byte APP1 limit",
                packet.len(),
                MAX_XMP_PACKET
            )));
        }

        Self::read_soi(&mut reader)?;
        writer.write_all(&[0xFF, MARKER_SOI])?;

        let mut xmp_written = false;
        while let Some(marker) = Self::next_marker(&mut reader)? {
            if marker == MARKER_SOS || marker == MARKER_EOI {
                if !xmp_written {
                    Self::write_app1_xmp_segment(&mut writer, packet)?;
                    xmp_written = true;
                }
                // Scan data and everything after it is copied verbatim
                writer.write_all(&[0xFF, marker])?;
                io::copy(&mut reader, &mut writer)?;
                break;
            }
            if is_standalone(marker) {
                writer.write_all(&[0xFF, marker])?;
                continue;
            }

            let content = Self::read_segment(&mut reader)?;
            let leading =
                marker == MARKER_APP0 || (marker == MARKER_APP1 && content.starts_with(EXIF_SIGNATURE));
            if !leading && !xmp_written {
                Self::write_app1_xmp_segment(&mut writer, packet)?;
                xmp_written = true;
            }
            if marker == MARKER_APP1
                && (Self::is_xmp_segment(&content) || Self::is_extended_xmp_segment(&content))
            {
                continue;
            }
            Self::write_segment(&mut writer, marker, &content)?;
        }

        if !xmp_written {
            Self::write_app1_xmp_segment(&mut writer, packet)?;
        }
        Ok(())
    }

    fn read_soi<R: Read>(reader: &mut R) -> XmpResult<()> {
        let mut header = [0u8; 2];
        reader.read_exact(&mut header)?;
        if header[0] != 0xFF || header[1] != MARKER_SOI {
            return Err(XmpError::fault(FileFormat::Jpeg, "Missing SOI marker"));
        }
        Ok(())
    }

    /// Find the next JPEG marker
    fn find_marker<R: Read>(reader: &mut R) -> io::Result<u8> {
        let mut buffer = [0u8; 1];
        loop {
            reader.read_exact(&mut buffer)?;
            if buffer[0] == 0xFF {
                reader.read_exact(&mut buffer)?;
                while buffer[0] == 0xFF {
                    reader.read_exact(&mut buffer)?;
                }
                if buffer[0] != 0x00 {
                    return Ok(buffer[0]);
                }
            }
        }
    }

    /// Next marker, or `None` at end of stream
    fn next_marker<R: Read>(reader: &mut R) -> XmpResult<Option<u8>> {
        match Self::find_marker(reader) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read segment length (2 bytes, big-endian)
    fn read_segment_length<R: Read>(reader: &mut R) -> XmpResult<u16> {
        let mut length_bytes = [0u8; 2];
        reader.read_exact(&mut length_bytes)?;
        let length = u16::from_be_bytes(length_bytes);
        if length < 2 {
            return Err(XmpError::fault(
                FileFormat::Jpeg,
                format!("Invalid segment length {}", length),
            ));
        }
        Ok(length)
    }

    /// Read a segment's content (without marker and length)
    fn read_segment<R: Read>(reader: &mut R) -> XmpResult<Vec<u8>> {
        let length = Self::read_segment_length(reader)?;
        let mut data = vec![0u8; length as usize - 2];
        reader.read_exact(&mut data)?;
        Ok(data)
    }

    fn write_segment<W: Write>(writer: &mut W, marker: u8, content: &[u8]) -> XmpResult<()> {
        writer.write_all(&[0xFF, marker])?;
        writer.write_all(&((content.len() + 2) as u16).to_be_bytes())?;
        writer.write_all(content)?;
        Ok(())
    }

    /// Check if a segment is an XMP segment
    fn is_xmp_segment(segment_data: &[u8]) -> bool {
        segment_data.starts_with(XMP_NAMESPACE)
    }

    /// Check if a segment is an Extended XMP segment
    fn is_extended_xmp_segment(segment_data: &[u8]) -> bool {
        segment_data.starts_with(EXTENDED_XMP_NAMESPACE)
    }

    /// Write APP1 XMP segment
    fn write_app1_xmp_segment<W: Write>(writer: &mut W, xmp_data: &[u8]) -> XmpResult<()> {
        writer.write_all(&[0xFF, MARKER_APP1])?;
        let segment_length = (XMP_NAMESPACE.len() + xmp_data.len() + 2) as u16;
        writer.write_all(&segment_length.to_be_bytes())?;
        writer.write_all(XMP_NAMESPACE)?;
        writer.write_all(xmp_data)?;
        Ok(())
    }
}

/// Markers without a length field
fn is_standalone(marker: u8) -> bool {
    marker == MARKER_TEM || (0xD0..=0xD7).contains(&marker)
}

/// `read` until `buf` is full or the stream ends
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
