//! QuickTime / MOV file format handler
//!
//! MOV XMP Storage:
//! - Preferred: a top-level `uuid` box with UUID BE7ACFCB-97A9-42E8-9C71-999491E3AFAC
//!   whose payload is the packet
//! - Legacy QuickTime: a `moov/udta/XMP_` box whose payload is the packet
//!
//! Rewrites never move media data. A packet that fits the old box is written
//! over it and any leftover space becomes a `free` box. Otherwise the old box
//! is turned into `free` and a new `uuid` box is appended at the end of the
//! file, unless the old box already is the last one.

use crate::core::error::{XmpError, XmpResult};
use crate::files::format::FileFormat;
use crate::files::handler::FileHandler;
use std::io::{Cursor, Read, Seek, SeekFrom, Write};

/// UUID of the XMP box
const XMP_UUID: &[u8; 16] = &[
    0xBE, 0x7A, 0xCF, 0xCB, 0x97, 0xA9, 0x42, 0xE8, 0x9C, 0x71, 0x99, 0x94, 0x91, 0xE3, 0xAF, 0xAC,
];

const BOX_TYPE_MOOV: &[u8; 4] = b"moov";
const BOX_TYPE_UDTA: &[u8; 4] = b"udta";
const BOX_TYPE_UUID: &[u8; 4] = b"uuid";
const BOX_TYPE_XMP: &[u8; 4] = b"XMP_";
const BOX_TYPE_FREE: &[u8; 4] = b"free";

/// Top-level box types accepted as the first box of a QuickTime file
const LEADING_BOX_TYPES: &[&[u8; 4]] = &[
    b"ftyp", b"moov", b"mdat", b"wide", b"free", b"skip", b"pnot", b"uuid",
];

/// Header (8) plus UUID (16)
const UUID_BOX_OVERHEAD: usize = 24;

/// QuickTime file handler for XMP packets
#[derive(Debug, Clone, Copy)]
pub struct MovHandler;

impl FileHandler for MovHandler {
    fn can_handle<R: Read + Seek>(&self, reader: &mut R) -> XmpResult<bool> {
        let pos = reader.stream_position()?;
        let mut header = [0u8; 8];
        let matched = match reader.read_exact(&mut header) {
            Ok(()) => LEADING_BOX_TYPES.iter().any(|t| header[4..8] == **t),
            Err(_) => false,
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
        FileFormat::Mov
    }
}

/// A box header as found in the file
#[derive(Debug, Clone, Copy)]
struct MovBox {
    offset: u64,
    header_len: u64,
    size: u64,
    box_type: [u8; 4],
    /// Size field was 0: the box runs to the end of its parent
    open_ended: bool,
}

impl MovBox {
    fn content_offset(&self) -> u64 {
        self.offset + self.header_len
    }

    fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }
}

/// Where the current packet lives
#[derive(Debug, Clone, Copy)]
struct XmpSlot {
    container: MovBox,
    payload_offset: u64,
    top_level: bool,
}

impl MovHandler {
    /// Read the XMP packet from a QuickTime stream
    ///
    /// # Returns
    ///
    /// * `Ok(Some(packet))` if a top-level XMP `uuid` or `moov/udta/XMP_` box exists
    /// * `Ok(None)` otherwise
    pub fn read_xmp<R: Read + Seek>(mut reader: R) -> XmpResult<Option<Vec<u8>>> {
        let file_len = reader.seek(SeekFrom::End(0))?;
        let top = Self::read_children(&mut reader, 0, file_len)?;
        let Some(slot) = Self::locate(&mut reader, &top)? else {
            return Ok(None);
        };

        let len = slot.container.end() - slot.payload_offset;
        reader.seek(SeekFrom::Start(slot.payload_offset))?;
        let mut packet = Vec::new();
        reader.by_ref().take(len).read_to_end(&mut packet)?;
        Ok(Some(packet))
    }

    /// Copy a QuickTime stream with `packet` as its XMP
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
        let file_len = data.len() as u64;
        let mut cursor = Cursor::new(&data[..]);
        let top = Self::read_children(&mut cursor, 0, file_len)?;
        let Some(last) = top.last().copied() else {
            return Err(XmpError::fault(FileFormat::Mov, "File has no boxes"));
        };
        let slot = Self::locate(&mut cursor, &top)?;
        let uuid_box = Self::build_box(BOX_TYPE_UUID, Some(XMP_UUID), packet)?;

        if let Some(slot) = slot {
            let old = slot.container;
            let new_box = if slot.top_level {
                uuid_box.clone()
            } else {
                Self::build_box(BOX_TYPE_XMP, None, packet)?
            };
            let old_len = old.size as usize;
            let start = old.offset as usize;

            // A remainder must hold at least a free box header
            let leftover = old_len
                .checked_sub(new_box.len())
                .filter(|l| *l == 0 || (8..=u32::MAX as usize).contains(l));
            if let Some(leftover) = leftover {
                data[start..start + new_box.len()].copy_from_slice(&new_box);
                if leftover > 0 {
                    Self::write_free(&mut data[start + new_box.len()..start + old_len]);
                }
                log::debug!("Rewrote MOV XMP box in place at {}", start);
                return Ok(());
            }

            if slot.top_level && old.end() == file_len {
                data.truncate(start);
                data.extend_from_slice(&uuid_box);
                log::debug!("Replaced trailing MOV XMP box at {}", start);
                return Ok(());
            }

            data[start + 4..start + 8].copy_from_slice(BOX_TYPE_FREE);
        }

        if last.open_ended {
            // Pin the size so that a box can follow it
            let size = u32::try_from(last.size).map_err(|_| {
                XmpError::fault(FileFormat::Mov, "Open-ended final box exceeds 4 GiB")
            })?;
            let at = last.offset as usize;
            data[at..at + 4].copy_from_slice(&size.to_be_bytes());
        }
        data.extend_from_slice(&uuid_box);
        log::debug!("Appended MOV XMP box at {}", file_len);
        Ok(())
    }

    /// Find the XMP box: top-level `uuid` first, then `moov/udta/XMP_`
    fn locate<R: Read + Seek>(reader: &mut R, top: &[MovBox]) -> XmpResult<Option<XmpSlot>> {
        for bx in top.iter().filter(|b| b.box_type == *BOX_TYPE_UUID) {
            if bx.size < bx.header_len + 16 {
                continue;
            }
            reader.seek(SeekFrom::Start(bx.content_offset()))?;
            let mut uuid = [0u8; 16];
            reader.read_exact(&mut uuid)?;
            if uuid == *XMP_UUID {
                return Ok(Some(XmpSlot {
                    container: *bx,
                    payload_offset: bx.content_offset() + 16,
                    top_level: true,
                }));
            }
        }

        for moov in top.iter().filter(|b| b.box_type == *BOX_TYPE_MOOV) {
            let children = Self::read_children(reader, moov.content_offset(), moov.end())?;
            for udta in children.iter().filter(|b| b.box_type == *BOX_TYPE_UDTA) {
                let items = Self::read_children(reader, udta.content_offset(), udta.end())?;
                if let Some(xmp) = items.iter().find(|b| b.box_type == *BOX_TYPE_XMP) {
                    return Ok(Some(XmpSlot {
                        container: *xmp,
                        payload_offset: xmp.content_offset(),
                        top_level: false,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Read the box headers between `start` and `end`
    fn read_children<R: Read + Seek>(reader: &mut R, start: u64, end: u64) -> XmpResult<Vec<MovBox>> {
        let mut boxes = Vec::new();
        let mut pos = start;
        while pos + 8 <= end {
            let bx = Self::read_box(reader, pos, end)?;
            pos = bx.end();
            boxes.push(bx);
        }
        Ok(boxes)
    }

    /// Read a box header at `offset`
    fn read_box<R: Read + Seek>(reader: &mut R, offset: u64, parent_end: u64) -> XmpResult<MovBox> {
        reader.seek(SeekFrom::Start(offset))?;
        let mut header = [0u8; 8];
        reader.read_exact(&mut header)?;
        let size32 = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let box_type = [header[4], header[5], header[6], header[7]];

        let (size, header_len) = match size32 {
            0 => (parent_end - offset, 8),
            1 => {
                let mut ext = [0u8; 8];
                reader.read_exact(&mut ext)?;
                (u64::from_be_bytes(ext), 16)
            }
            n => (u64::from(n), 8),
        };

        let in_parent = offset.checked_add(size).is_some_and(|end| end <= parent_end);
        if size < header_len || !in_parent {
            return Err(XmpError::fault(
                FileFormat::Mov,
                format!(
                    "Box '{}' at {} has invalid size {}",
                    String::from_utf8_lossy(&box_type),
                    offset,
                    size
                ),
            ));
        }

        Ok(MovBox {
            offset,
            header_len,
            size,
            box_type,
            open_ended: size32 == 0,
        })
    }

    /// Serialize a box with a 32-bit size
    fn build_box(box_type: &[u8; 4], uuid: Option<&[u8; 16]>, payload: &[u8]) -> XmpResult<Vec<u8>> {
        let header = if uuid.is_some() { UUID_BOX_OVERHEAD } else { 8 };
        let size = u32::try_from(header + payload.len()).map_err(|_| {
            XmpError::InjectionUnsupported(format!(
                "MOV packet of {} bytes exceeds the box size limit",
                payload.len()
            ))
        })?;
        let mut out = Vec::with_capacity(size as usize);
        out.extend_from_slice(&size.to_be_bytes());
        out.extend_from_slice(box_type);
        if let Some(uuid) = uuid {
            out.extend_from_slice(uuid);
        }
        out.extend_from_slice(payload);
        Ok(out)
    }

    /// Turn `space` (at least 8 bytes) into a zero-filled `free` box
    fn write_free(space: &mut [u8]) {
        let len = space.len() as u32;
        space.fill(0);
        space[0..4].copy_from_slice(&len.to_be_bytes());
        space[4..8].copy_from_slice(BOX_TYPE_FREE);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
        out.extend_from_slice(box_type);
        out.extend_from_slice(payload);
        out
    }

    fn minimal_mov() -> Vec<u8> {
        let mut data = raw_box(b"ftyp", b"qt  \0\0\0\0qt  ");
        data.extend(raw_box(b"moov", &raw_box(b"mvhd", &[0u8; 20])));
        data.extend(raw_box(b"mdat", &[0xAB; 32]));
        data
    }

    fn write(data: Vec<u8>, packet: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        MovHandler::write_xmp(Cursor::new(data), &mut out, packet).unwrap();
        out
    }

    fn read(data: Vec<u8>) -> Option<Vec<u8>> {
        MovHandler::read_xmp(Cursor::new(data)).unwrap()
    }

    fn mdat_offset(data: &[u8]) -> usize {
        data.windows(4).position(|w| w == b"mdat").unwrap()
    }

    #[test]
    fn test_can_handle() {
        assert!(MovHandler.can_handle(&mut Cursor::new(minimal_mov())).unwrap());
        assert!(!MovHandler
            .can_handle(&mut Cursor::new(b"%PDF-1.4".to_vec()))
            .unwrap());
    }

    #[test]
    fn test_read_no_xmp() {
        assert!(read(minimal_mov()).is_none());
    }

    #[test]
    fn test_append_and_read() {
        let source = minimal_mov();
        let out = write(source.clone(), b"<packet/>");
        assert_eq!(&out[..source.len()], &source[..]);
        assert_eq!(read(out), Some(b"<packet/>".to_vec()));
    }

    #[test]
    fn test_trailing_box_replaced() {
        let once = write(minimal_mov(), b"<a/>");
        let twice = write(once.clone(), &[b'x'; 100]);
        assert_eq!(twice.len(), once.len() - 4 + 100);
        assert_eq!(read(twice), Some(vec![b'x'; 100]));
    }

    #[test]
    fn test_smaller_packet_leaves_free_box() {
        let once = write(minimal_mov(), &[b'a'; 100]);
        let twice = write(once.clone(), &[b'b'; 50]);
        assert_eq!(twice.len(), once.len());
        assert_eq!(read(twice.clone()), Some(vec![b'b'; 50]));
        let free_at = once.len() - 50;
        assert_eq!(&twice[free_at + 4..free_at + 8], b"free");
    }

    #[test]
    fn test_mdat_never_moves() {
        // XMP box before mdat must not shift it
        let mut source = raw_box(b"ftyp", b"qt  \0\0\0\0qt  ");
        let mut uuid_payload = XMP_UUID.to_vec();
        uuid_payload.extend_from_slice(b"<a/>");
        source.extend(raw_box(b"uuid", &uuid_payload));
        source.extend(raw_box(b"mdat", &[0xAB; 32]));
        let before = mdat_offset(&source);

        let out = write(source, &[b'y'; 200]);
        assert_eq!(mdat_offset(&out), before);
        assert_eq!(read(out), Some(vec![b'y'; 200]));
    }

    #[test]
    fn test_udta_xmp_read_and_rewritten_in_place() {
        let udta = raw_box(b"udta", &raw_box(b"XMP_", &[b'q'; 64]));
        let mut source = raw_box(b"ftyp", b"qt  \0\0\0\0qt  ");
        source.extend(raw_box(b"moov", &udta));
        source.extend(raw_box(b"mdat", &[0xAB; 32]));
        assert_eq!(read(source.clone()), Some(vec![b'q'; 64]));

        let out = write(source.clone(), &[b'r'; 40]);
        assert_eq!(out.len(), source.len());
        assert_eq!(read(out), Some(vec![b'r'; 40]));
    }

    #[test]
    fn test_open_ended_mdat_pinned() {
        let mut source = raw_box(b"ftyp", b"qt  \0\0\0\0qt  ");
        let mdat_at = source.len();
        source.extend_from_slice(&[0, 0, 0, 0]);
        source.extend_from_slice(b"mdat");
        source.extend_from_slice(&[0xAB; 16]);

        let out = write(source, b"<p/>");
        assert_eq!(&out[mdat_at..mdat_at + 4], &24u32.to_be_bytes());
        assert_eq!(read(out), Some(b"<p/>".to_vec()));
    }

    #[test]
    fn test_truncated_box_is_fault() {
        let mut data = minimal_mov();
        data.truncate(data.len() - 4);
        let err = MovHandler::read_xmp(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, XmpError::HandlerFault { .. }));
    }

    #[test]
    fn test_oversized_largesize_is_fault() {
        let mut data = raw_box(b"ftyp", b"qt  \0\0\0\0qt  ");
        data.extend_from_slice(&1u32.to_be_bytes());
        data.extend_from_slice(b"moov");
        data.extend_from_slice(&(u64::MAX - 10).to_be_bytes());
        data.extend_from_slice(&[0u8; 16]);
        let err = MovHandler::read_xmp(Cursor::new(data)).unwrap_err();
        assert!(matches!(err, XmpError::HandlerFault { .. }));
    }
}
