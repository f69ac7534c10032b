//! TIFF file format handler
//!
//! TIFF XMP Storage:
//! - XMP Packet is stored in Tag 700 (kTIFF_XMP) in the Primary IFD (0th IFD)
//! - Tag type is typically BYTE (1) or UNDEFINED (7)
//! - Value is stored inline if <= 4 bytes, otherwise as an offset to the data
//!
//! Rewrites never move existing data. A packet that fits its old slot is
//! written over it; anything else is appended at the end of the file and the
//! IFD entry is repointed. Adding the tag appends a rebuilt IFD0 as well.

use crate::core::error::{XmpError, XmpResult};
use crate::files::format::FileFormat;
use crate::files::handler::FileHandler;
use std::io::{Read, Seek, SeekFrom, Write};

/// TIFF file header signatures
const TIFF_SIGNATURE_LE: &[u8] = &[0x49, 0x49, 0x2A, 0x00]; // II/42 (little-endian)
const TIFF_SIGNATURE_BE: &[u8] = &[0x4D, 0x4D, 0x00, 0x2A]; // MM/42 (big-endian)

/// TIFF Tag IDs
const TAG_XMP: u16 = 700;

/// TIFF Data Types
const TYPE_BYTE: u16 = 1;
const TYPE_ASCII: u16 = 2;
const TYPE_UNDEFINED: u16 = 7;

/// Size of an IFD entry in bytes
const IFD_ENTRY_SIZE: usize = 12;

/// TIFF file handler for XMP packets
#[derive(Debug, Clone, Copy)]
pub struct TiffHandler;

impl FileHandler for TiffHandler {
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool> {
        let pos = reader.stream_position()?;
        let mut header = [0u8; 4];
        let read = reader.read(&mut header)?;
        reader.seek(SeekFrom::Start(pos))?;
        Ok(read == 4 && (header == *TIFF_SIGNATURE_LE || header == *TIFF_SIGNATURE_BE))
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
        FileFormat::Tiff
    }
}

/// Byte order for TIFF file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    LittleEndian,
    BigEndian,
}

impl ByteOrder {
    fn from_header(header: &[u8]) -> XmpResult<Self> {
        match header.get(0..4) {
            Some(sig) if sig == TIFF_SIGNATURE_LE => Ok(ByteOrder::LittleEndian),
            Some(sig) if sig == TIFF_SIGNATURE_BE => Ok(ByteOrder::BigEndian),
            Some([b'I', b'I', 0x2B, 0x00]) | Some([b'M', b'M', 0x00, 0x2B]) => Err(
                XmpError::fault(FileFormat::Tiff, "BigTIFF files are not supported"),
            ),
            _ => Err(XmpError::fault(FileFormat::Tiff, "Not a valid TIFF file")),
        }
    }

    fn u16(self, bytes: &[u8]) -> u16 {
        let raw = [bytes[0], bytes[1]];
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(raw),
            ByteOrder::BigEndian => u16::from_be_bytes(raw),
        }
    }

    fn u32(self, bytes: &[u8]) -> u32 {
        let raw = [bytes[0], bytes[1], bytes[2], bytes[3]];
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(raw),
            ByteOrder::BigEndian => u32::from_be_bytes(raw),
        }
    }

    fn put_u16(self, value: u16) -> [u8; 2] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }

    fn put_u32(self, value: u32) -> [u8; 4] {
        match self {
            ByteOrder::LittleEndian => value.to_le_bytes(),
            ByteOrder::BigEndian => value.to_be_bytes(),
        }
    }
}

/// IFD Entry structure; the value field is kept raw
#[derive(Debug, Clone, Copy)]
struct IfdEntry {
    tag: u16,
    type_: u16,
    count: u32,
    value: [u8; 4],
}

impl IfdEntry {
    fn parse(bytes: &[u8], order: ByteOrder) -> Self {
        Self {
            tag: order.u16(&bytes[0..2]),
            type_: order.u16(&bytes[2..4]),
            count: order.u32(&bytes[4..8]),
            value: [bytes[8], bytes[9], bytes[10], bytes[11]],
        }
    }

    fn encode(&self, order: ByteOrder) -> [u8; IFD_ENTRY_SIZE] {
        let mut out = [0u8; IFD_ENTRY_SIZE];
        out[0..2].copy_from_slice(&order.put_u16(self.tag));
        out[2..4].copy_from_slice(&order.put_u16(self.type_));
        out[4..8].copy_from_slice(&order.put_u32(self.count));
        out[8..12].copy_from_slice(&self.value);
        out
    }

    /// Size of the value in bytes
    fn data_size(&self) -> XmpResult<u64> {
        Ok(u64::from(self.count) * get_type_size(self.type_)?)
    }

    fn offset(&self, order: ByteOrder) -> u32 {
        order.u32(&self.value)
    }
}

/// The primary IFD as found in the file
struct Ifd0 {
    offset: u64,
    entries: Vec<IfdEntry>,
    next_ifd: [u8; 4],
}

impl Ifd0 {
    fn xmp_index(&self) -> Option<usize> {
        self.entries.iter().position(|e| e.tag == TAG_XMP)
    }

    /// File offset of entry `index`
    fn entry_offset(&self, index: usize) -> usize {
        self.offset as usize + 2 + index * IFD_ENTRY_SIZE
    }
}

impl TiffHandler {
    /// Read the XMP packet from a TIFF stream
    ///
    /// # Returns
    ///
    /// * `Ok(Some(packet))` if IFD0 carries tag 700
    /// * `Ok(None)` if it does not
    pub fn read_xmp<R: Read + Seek>(mut reader: R) -> XmpResult<Option<Vec<u8>>> {
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let order = ByteOrder::from_header(&header)?;
        let ifd0 = Self::read_ifd0(&mut reader, order, u64::from(order.u32(&header[4..8])))?;

        let Some(entry) = ifd0.xmp_index().map(|i| ifd0.entries[i]) else {
            return Ok(None);
        };
        Self::read_tag_value(&mut reader, &entry, order).map(Some)
    }

    /// Copy a TIFF stream with `packet` stored in tag 700 of IFD0
    pub fn write_xmp<R: Read + Seek, W: Write>(
        mut reader: R,
        mut writer: W,
        packet: &[u8],
    ) -> XmpResult<()> {
        reader.rewind()?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::inject(&mut data, packet)?;
        writer.write_all(&data)?;
        Ok(())
    }

    /// Update `data` in memory
    fn inject(data: &mut Vec<u8>, packet: &[u8]) -> XmpResult<()> {
        let order = ByteOrder::from_header(data)?;
        if data.len() < 8 {
            return Err(XmpError::fault(FileFormat::Tiff, "Truncated header"));
        }
        let ifd0_offset = u64::from(order.u32(&data[4..8]));
        let ifd0 = Self::read_ifd0(&mut std::io::Cursor::new(&data[..]), order, ifd0_offset)?;
        let count = u32::try_from(packet.len()).map_err(|_| {
            XmpError::InjectionUnsupported("Packet too large for a TIFF tag".to_string())
        })?;

        match ifd0.xmp_index() {
            Some(index) => {
                let entry = ifd0.entries[index];
                let old_size = entry.data_size()?;
                let entry_pos = ifd0.entry_offset(index);
                let mut updated = IfdEntry {
                    tag: TAG_XMP,
                    type_: TYPE_UNDEFINED,
                    count,
                    value: [0; 4],
                };

                if packet.len() <= 4 {
                    updated.value[..packet.len()].copy_from_slice(packet);
                } else if old_size > 4 && packet.len() as u64 <= old_size {
                    // Overwrite the old slot, clearing its tail
                    let start = entry.offset(order) as usize;
                    let end = start + old_size as usize;
                    if end > data.len() {
                        return Err(XmpError::fault(FileFormat::Tiff, "XMP tag data out of range"));
                    }
                    data[start..end].fill(0);
                    data[start..start + packet.len()].copy_from_slice(packet);
                    updated.value = entry.value;
                } else {
                    let offset = Self::append_aligned(data, packet)?;
                    updated.value = order.put_u32(offset);
                }
                data[entry_pos..entry_pos + IFD_ENTRY_SIZE].copy_from_slice(&updated.encode(order));
                log::debug!("Rewrote TIFF XMP tag ({} bytes)", packet.len());
            }
            None => {
                let mut value = [0u8; 4];
                if packet.len() <= 4 {
                    value[..packet.len()].copy_from_slice(packet);
                } else {
                    value = order.put_u32(Self::append_aligned(data, packet)?);
                }
                let mut entries = ifd0.entries;
                entries.push(IfdEntry {
                    tag: TAG_XMP,
                    type_: TYPE_UNDEFINED,
                    count,
                    value,
                });
                entries.sort_by_key(|e| e.tag);

                let count = u16::try_from(entries.len())
                    .map_err(|_| XmpError::fault(FileFormat::Tiff, "Too many IFD entries"))?;
                let mut ifd = Vec::with_capacity(2 + entries.len() * IFD_ENTRY_SIZE + 4);
                ifd.extend_from_slice(&order.put_u16(count));
                for entry in &entries {
                    ifd.extend_from_slice(&entry.encode(order));
                }
                ifd.extend_from_slice(&ifd0.next_ifd);
                let new_ifd_offset = Self::append_aligned(data, &ifd)?;
                data[4..8].copy_from_slice(&order.put_u32(new_ifd_offset));
                log::debug!("Added TIFF XMP tag, IFD0 moved to {}", new_ifd_offset);
            }
        }
        Ok(())
    }

    /// Append `bytes` at an even offset, returning that offset
    fn append_aligned(data: &mut Vec<u8>, bytes: &[u8]) -> XmpResult<u32> {
        if data.len() % 2 == 1 {
            data.push(0);
        }
        let offset = u32::try_from(data.len()).map_err(|_| {
            XmpError::InjectionUnsupported("TIFF file would exceed 4 GiB".to_string())
        })?;
        if u32::try_from(data.len() + bytes.len()).is_err() {
            return Err(XmpError::InjectionUnsupported(
                "TIFF file would exceed 4 GiB".to_string(),
            ));
        }
        data.extend_from_slice(bytes);
        Ok(offset)
    }

    /// Read the entries of IFD0
    fn read_ifd0<R: Read + Seek>(reader: &mut R, order: ByteOrder, offset: u64) -> XmpResult<Ifd0> {
        if offset < 8 {
            return Err(XmpError::fault(
                FileFormat::Tiff,
                format!("Invalid IFD0 offset {}", offset),
            ));
        }
        reader.seek(SeekFrom::Start(offset))?;

        let mut count_bytes = [0u8; 2];
        reader.read_exact(&mut count_bytes)?;
        let entry_count = order.u16(&count_bytes);

        let mut raw = vec![0u8; entry_count as usize * IFD_ENTRY_SIZE];
        reader.read_exact(&mut raw)?;
        let entries = raw
            .chunks_exact(IFD_ENTRY_SIZE)
            .map(|bytes| IfdEntry::parse(bytes, order))
            .collect();

        let mut next_ifd = [0u8; 4];
        reader.read_exact(&mut next_ifd)?;

        Ok(Ifd0 {
            offset,
            entries,
            next_ifd,
        })
    }

    /// Read tag value (handles inline values and offsets)
    fn read_tag_value<R: Read + Seek>(
        reader: &mut R,
        entry: &IfdEntry,
        order: ByteOrder,
    ) -> XmpResult<Vec<u8>> {
        let data_size = entry.data_size()?;
        if data_size <= 4 {
            return Ok(entry.value[..data_size as usize].to_vec());
        }

        reader.seek(SeekFrom::Start(u64::from(entry.offset(order))))?;
        let mut data = Vec::new();
        reader.by_ref().take(data_size).read_to_end(&mut data)?;
        if data.len() as u64 != data_size {
            return Err(XmpError::fault(FileFormat::Tiff, "XMP tag data out of range"));
        }
        Ok(data)
    }
}

/// Get size of a TIFF data type
fn get_type_size(type_: u16) -> XmpResult<u64> {
    match type_ {
        TYPE_BYTE | TYPE_ASCII | TYPE_UNDEFINED | 6 => Ok(1),
        3 | 8 => Ok(2),  // SHORT, SSHORT
        4 | 9 => Ok(4),  // LONG, SLONG
        5 | 10 => Ok(8), // RATIONAL, SRATIONAL
        11 | 13 => Ok(4), // FLOAT, IFD
        12 => Ok(8),     // DOUBLE
        _ => Err(XmpError::fault(
            FileFormat::Tiff,
            format!("Unknown TIFF type: {}", type_),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Cursor;

    // Minimal valid TIFF file (little-endian) with one ImageWidth entry
    fn create_minimal_tiff_le() -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00, 0x08, 0x00, 0x00, 0x00]);
        tiff.extend_from_slice(&[0x01, 0x00]);
        tiff.extend_from_slice(&[0x00, 0x01, 0x03, 0x00]); // tag 256, SHORT
        tiff.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]); // count
        tiff.extend_from_slice(&[0x64, 0x00, 0x00, 0x00]); // value
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]); // next IFD
        tiff
    }

    fn create_minimal_tiff_be() -> Vec<u8> {
        let mut tiff = Vec::new();
        tiff.extend_from_slice(&[0x4D, 0x4D, 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
        tiff.extend_from_slice(&[0x00, 0x00]);
        tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
        tiff
    }

    fn write(data: Vec<u8>, packet: &[u8]) -> Vec<u8> {
        let mut out = Cursor::new(Vec::new());
        TiffHandler::write_xmp(Cursor::new(data), &mut out, packet).unwrap();
        out.into_inner()
    }

    fn read(data: Vec<u8>) -> Option<Vec<u8>> {
        TiffHandler::read_xmp(Cursor::new(data)).unwrap()
    }

    #[test]
    fn test_read_xmp_no_xmp() {
        assert!(read(create_minimal_tiff_le()).is_none());
        assert!(read(create_minimal_tiff_be()).is_none());
    }

    #[test]
    fn test_invalid_tiff() {
        let result = TiffHandler::read_xmp(Cursor::new(vec![0x00, 0x01, 0x02, 0x03]));
        assert!(result.is_err());
    }

    #[test]
    fn test_bigtiff_is_fault() {
        let data = vec![b'I', b'I', 0x2B, 0x00, 0x08, 0x00, 0x00, 0x00];
        let err = TiffHandler::read_xmp(Cursor::new(data)).unwrap_err();
        assert!(err.to_string().contains("BigTIFF"));
    }

    #[test]
    fn test_add_tag_moves_ifd0() {
        let packet = vec![b'x'; 300];
        let out = write(create_minimal_tiff_le(), &packet);
        // IFD0 repointed past the original data, entries sorted
        let ifd0 = u32::from_le_bytes([out[4], out[5], out[6], out[7]]) as usize;
        assert!(ifd0 > 26);
        assert_eq!(ifd0 % 2, 0);
        assert_eq!(u16::from_le_bytes([out[ifd0], out[ifd0 + 1]]), 2);
        assert_eq!(u16::from_le_bytes([out[ifd0 + 2], out[ifd0 + 3]]), 256);
        assert_eq!(u16::from_le_bytes([out[ifd0 + 14], out[ifd0 + 15]]), TAG_XMP);
        assert_eq!(read(out), Some(packet));
    }

    #[test]
    fn test_big_endian_round_trip() {
        let packet = b"<?xpacket begin=\"\"?><a/><?xpacket end=\"w\"?>".to_vec();
        let out = write(create_minimal_tiff_be(), &packet);
        assert_eq!(read(out), Some(packet));
    }

    #[test]
    fn test_smaller_packet_rewritten_in_place() {
        let first = write(create_minimal_tiff_le(), &[b'a'; 400]);
        let second = write(first.clone(), &[b'b'; 100]);
        assert_eq!(second.len(), first.len());
        assert_eq!(read(second), Some(vec![b'b'; 100]));
    }

    #[test]
    fn test_larger_packet_appended() {
        let first = write(create_minimal_tiff_le(), &[b'a'; 100]);
        let second = write(first.clone(), &[b'c'; 1000]);
        assert!(second.len() >= first.len() + 1000);
        // Original bytes are untouched
        assert_eq!(&second[..8], &first[..8]);
        assert_eq!(read(second), Some(vec![b'c'; 1000]));
    }

    #[test]
    fn test_inline_value() {
        let out = write(create_minimal_tiff_le(), b"ab");
        assert_eq!(read(out), Some(b"ab".to_vec()));
    }
}
