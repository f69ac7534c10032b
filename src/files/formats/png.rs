//! PNG file format handler
//!
//! PNG XMP Storage:
//! - XMP Packet is stored in iTXt chunk with keyword "XML:com.adobe.xmp"
//! - iTXt chunk format: keyword (null-terminated) + compression flag + compression method + language tag + translated keyword + text
//! - For XMP, compression flag is 0 (uncompressed)
//!
//! Ancillary chunks may be inserted freely, so a file without XMP gets a new
//! chunk right after IHDR.

use crate::core::error::{XmpError, XmpResult};
use crate::files::format::FileFormat;
use crate::files::handler::FileHandler;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// PNG file signature
const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// XMP keyword in iTXt chunk
const XMP_KEYWORD: &[u8] = b"XML:com.adobe.xmp\0";

const CHUNK_TYPE_IHDR: &[u8; 4] = b"IHDR";
const CHUNK_TYPE_ITXT: &[u8; 4] = b"iTXt";
const CHUNK_TYPE_IEND: &[u8; 4] = b"IEND";

/// PNG file handler for XMP packets
#[derive(Debug, Clone, Copy)]
pub struct PngHandler;

impl FileHandler for PngHandler {
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool> {
        let pos = reader.stream_position()?;
        let mut signature = [0u8; 8];
        let matched = match reader.read_exact(&mut signature) {
            Ok(()) => signature == PNG_SIGNATURE,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => false,
            Err(e) => return Err(e.into()),
        };
        reader.seek(SeekFrom::Start(pos))?;
        Ok(matched)
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
        FileFormat::Png
    }
}

#[derive(Debug, Clone)]
struct PngChunk {
    chunk_type: [u8; 4],
    data: Vec<u8>,
    crc: u32,
}

impl PngChunk {
    fn is_xmp(&self) -> bool {
        self.chunk_type == *CHUNK_TYPE_ITXT && PngHandler::is_xmp_itxt(&self.data)
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&(self.data.len() as u32).to_be_bytes())?;
        writer.write_all(&self.chunk_type)?;
        writer.write_all(&self.data)?;
        writer.write_all(&self.crc.to_be_bytes())
    }
}

impl PngHandler {
    /// Read the XMP packet from a PNG stream
    ///
    /// # Returns
    ///
    /// * `Ok(Some(packet))` if an XMP iTXt chunk is found
    /// * `Ok(None)` if no XMP chunk precedes IEND
    pub fn read_xmp<R: Read + Seek>(mut reader: R) -> XmpResult<Option<Vec<u8>>> {
        Self::read_signature(&mut reader)?;

        while let Some(chunk) = Self::next_chunk(&mut reader)? {
            if chunk.chunk_type == *CHUNK_TYPE_IEND {
                break;
            }
            if chunk.is_xmp() {
                return Self::extract_xmp_from_itxt(&chunk.data);
            }
        }
        Ok(None)
    }

    /// Copy a PNG stream with `packet` as its XMP chunk
    ///
    /// An existing XMP chunk is replaced where it stands; otherwise the new
    /// chunk is inserted after IHDR.
    pub fn write_xmp<R: Read + Seek, W: Write>(
        mut reader: R,
        mut writer: W,
        packet: &[u8],
    ) -> XmpResult<()> {
        Self::read_signature(&mut reader)?;

        let mut chunks = Vec::new();
        while let Some(chunk) = Self::next_chunk(&mut reader)? {
            let is_end = chunk.chunk_type == *CHUNK_TYPE_IEND;
            chunks.push(chunk);
            if is_end {
                break;
            }
        }
        if chunks.first().map(|c| &c.chunk_type) != Some(CHUNK_TYPE_IHDR) {
            return Err(XmpError::fault(FileFormat::Png, "First chunk is not IHDR"));
        }

        let xmp_chunk = Self::build_xmp_itxt_chunk(packet)?;
        let has_xmp = chunks.iter().any(PngChunk::is_xmp);

        writer.write_all(PNG_SIGNATURE)?;
        let mut xmp_written = false;
        for chunk in &chunks {
            if chunk.is_xmp() {
                if !xmp_written {
                    xmp_chunk.write_to(&mut writer)?;
                    xmp_written = true;
                }
                continue;
            }
            chunk.write_to(&mut writer)?;
            if !has_xmp && !xmp_written && chunk.chunk_type == *CHUNK_TYPE_IHDR {
                xmp_chunk.write_to(&mut writer)?;
                xmp_written = true;
            }
        }

        // Trailing bytes after IEND are kept as-is
        io::copy(&mut reader, &mut writer)?;
        Ok(())
    }

    fn read_signature<R: Read>(reader: &mut R) -> XmpResult<()> {
        let mut signature = [0u8; 8];
        reader.read_exact(&mut signature)?;
        if signature != PNG_SIGNATURE {
            return Err(XmpError::fault(FileFormat::Png, "Not a valid PNG file"));
        }
        Ok(())
    }

    /// Read a PNG chunk, or `None` at a clean end of stream
    fn next_chunk<R: Read>(reader: &mut R) -> XmpResult<Option<PngChunk>> {
        let mut length_bytes = [0u8; 4];
        match reader.read_exact(&mut length_bytes) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let length = u32::from_be_bytes(length_bytes);
        if length > i32::MAX as u32 {
            return Err(XmpError::fault(
                FileFormat::Png,
                format!("Chunk length {} out of range", length),
            ));
        }

        let mut chunk_type = [0u8; 4];
        reader.read_exact(&mut chunk_type)?;

        let mut data = Vec::new();
        let read = reader
            .by_ref()
            .take(u64::from(length))
            .read_to_end(&mut data)?;
        if read != length as usize {
            return Err(XmpError::fault(FileFormat::Png, "Truncated chunk"));
        }

        let mut crc_bytes = [0u8; 4];
        reader.read_exact(&mut crc_bytes)?;

        Ok(Some(PngChunk {
            chunk_type,
            data,
            crc: u32::from_be_bytes(crc_bytes),
        }))
    }

    /// Check if an iTXt chunk contains XMP data
    fn is_xmp_itxt(data: &[u8]) -> bool {
        data.starts_with(XMP_KEYWORD)
    }

    /// Extract XMP data from an iTXt chunk
    fn extract_xmp_from_itxt(data: &[u8]) -> XmpResult<Option<Vec<u8>>> {
        if !Self::is_xmp_itxt(data) {
            return Ok(None);
        }

        let keyword_len = XMP_KEYWORD.len();
        if data.len() < keyword_len + 2 {
            return Ok(None);
        }

        // XMP must be stored uncompressed
        if data[keyword_len] != 0 {
            return Err(XmpError::fault(
                FileFormat::Png,
                "Compressed XMP iTXt chunk",
            ));
        }

        // Skip compression flag and method, then language tag and translated keyword
        let mut text_start = keyword_len + 2;
        for _ in 0..2 {
            let Some(nul) = data[text_start..].iter().position(|&b| b == 0) else {
                return Ok(None);
            };
            text_start += nul + 1;
        }

        Ok(Some(data[text_start..].to_vec()))
    }

    /// Build an XMP iTXt chunk
    fn build_xmp_itxt_chunk(xmp_data: &[u8]) -> XmpResult<PngChunk> {
        let mut data = Vec::with_capacity(XMP_KEYWORD.len() + 4 + xmp_data.len());
        data.extend_from_slice(XMP_KEYWORD);
        data.push(0); // compression flag (0 = uncompressed)
        data.push(0); // compression method
        data.push(0); // language tag (empty, null-terminated)
        data.push(0); // translated keyword (empty, null-terminated)
        data.extend_from_slice(xmp_data);

        if data.len() > i32::MAX as usize {
            return Err(XmpError::InjectionUnsupported(format!(
                "PNG packet of {} bytes exceeds the chunk size limit",
                xmp_data.len()
            )));
        }

        let mut hasher = Crc32::new();
        hasher.update(CHUNK_TYPE_ITXT);
        hasher.update(&data);
        Ok(PngChunk {
            chunk_type: *CHUNK_TYPE_ITXT,
            data,
            crc: hasher.finish(),
        })
    }
}

/// PNG CRC-32 (polynomial 0xEDB88320) over chunk type and data
struct Crc32 {
    table: [u32; 256],
    crc: u32,
}

impl Crc32 {
    fn new() -> Self {
        let mut table = [0u32; 256];
        for (i, item) in table.iter_mut().enumerate() {
            let mut crc = i as u32;
            for _ in 0..8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB88320
                } else {
                    crc >> 1
                };
            }
            *item = crc;
        }
        Self {
            table,
            crc: 0xFFFFFFFF,
        }
    }

    fn update(&mut self, data: &[u8]) {
        for &byte in data {
            let index = ((self.crc ^ u32::from(byte)) & 0xFF) as usize;
            self.crc = (self.crc >> 8) ^ self.table[index];
        }
    }

    fn finish(&self) -> u32 {
        self.crc ^ 0xFFFFFFFF
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    const PACKET: &[u8] = b"<?xpacket begin=\"\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?><x:xmpmeta xmlns:x=\"adobe:ns:meta/\"/><?xpacket end=\"w\"?>";

    fn chunk(chunk_type: &[u8; 4], data: &[u8]) -> Vec<u8> {
        let mut hasher = Crc32::new();
        hasher.update(chunk_type);
        hasher.update(data);
        let mut out = (data.len() as u32).to_be_bytes().to_vec();
        out.extend_from_slice(chunk_type);
        out.extend_from_slice(data);
        out.extend_from_slice(&hasher.finish().to_be_bytes());
        out
    }

    fn minimal_png() -> Vec<u8> {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend(chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
        data.extend(chunk(b"IDAT", &[0x78, 0x9C, 0x63, 0, 0, 0, 1, 0, 1]));
        data.extend(chunk(b"IEND", &[]));
        data
    }

    fn write(data: Vec<u8>, packet: &[u8]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        PngHandler::write_xmp(Cursor::new(data), &mut out, packet).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_crc_known_value() {
        let mut hasher = Crc32::new();
        hasher.update(b"IEND");
        assert_eq!(hasher.finish(), 0xAE426082);
    }

    #[test]
    fn test_is_xmp_itxt() {
        let mut data = XMP_KEYWORD.to_vec();
        data.extend_from_slice(b"XMP data");
        assert!(PngHandler::is_xmp_itxt(&data));
        assert!(!PngHandler::is_xmp_itxt(b"Other keyword\0"));
    }

    #[test]
    fn test_extract_xmp_from_itxt() {
        let mut data = XMP_KEYWORD.to_vec();
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(b"<rdf:RDF>test</rdf:RDF>");
        let extracted = PngHandler::extract_xmp_from_itxt(&data).unwrap();
        assert_eq!(extracted, Some(b"<rdf:RDF>test</rdf:RDF>".to_vec()));
    }

    #[test]
    fn test_compressed_itxt_is_fault() {
        let mut data = XMP_KEYWORD.to_vec();
        data.extend_from_slice(&[1, 0, 0, 0, 0x78, 0x9C]);
        let err = PngHandler::extract_xmp_from_itxt(&data).unwrap_err();
        assert!(matches!(err, XmpError::HandlerFault { .. }));
    }

    #[test]
    fn test_barren_png_gets_chunk_after_ihdr() {
        let out = write(minimal_png(), PACKET);
        // signature(8) + IHDR(12 + 13)
        assert_eq!(&out[37..41], b"iTXt");
        let packet = PngHandler::read_xmp(Cursor::new(out)).unwrap();
        assert_eq!(packet.as_deref(), Some(PACKET));
    }

    #[test]
    fn test_existing_chunk_replaced_in_place() {
        let mut data = PNG_SIGNATURE.to_vec();
        data.extend(chunk(b"IHDR", &[0, 0, 0, 1, 0, 0, 0, 1, 8, 0, 0, 0, 0]));
        data.extend(chunk(b"IDAT", &[0x78, 0x9C, 0x63, 0, 0, 0, 1, 0, 1]));
        let mut itxt = XMP_KEYWORD.to_vec();
        itxt.extend_from_slice(&[0, 0, 0, 0]);
        itxt.extend_from_slice(b"old");
        data.extend(chunk(b"iTXt", &itxt));
        data.extend(chunk(b"IEND", &[]));

        let out = write(data, PACKET);
        // IDAT still precedes the XMP chunk
        assert_eq!(&out[37..41], b"IDAT");
        assert_eq!(&out[58..62], b"iTXt");
        let packet = PngHandler::read_xmp(Cursor::new(out)).unwrap();
        assert_eq!(packet.as_deref(), Some(PACKET));
    }

    #[test]
    fn test_no_xmp() {
        assert!(PngHandler::read_xmp(Cursor::new(minimal_png()))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_not_png() {
        assert!(PngHandler::read_xmp(Cursor::new(b"GIF89a..".to_vec())).is_err());
        assert!(!PngHandler
            .can_handle(&mut Cursor::new(b"GIF".to_vec()))
            .unwrap());
    }
}
