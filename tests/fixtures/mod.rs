//! Test fixtures
//!
//! Fixtures are synthesised into a temporary directory so every test works
//! on its own copy. `BlueSquare.*` files carry a packet with `dc:format` and
//! `xmp:CreatorTool`; `zeros.*` files carry none.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use xmpfiles::{ns, XmpMeta};

pub const CREATOR_TOOL: &str = "Adobe Photoshop CS2 Windows";

/// A temporary directory holding generated fixtures
pub struct Fixtures {
    dir: TempDir,
}

impl Fixtures {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    /// Write the named fixture and return its path
    pub fn path(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, fixture_bytes(name)).unwrap();
        path
    }

    /// Write arbitrary content under `name`
    pub fn write(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }
}

/// Packet embedded in every `BlueSquare` fixture
pub fn blue_square_packet(mime: &str) -> Vec<u8> {
    let mut meta = XmpMeta::new();
    meta.set_property(ns::DC, "format", mime).unwrap();
    meta.set_property(ns::XMP, "CreatorTool", CREATOR_TOOL).unwrap();
    meta.serialize_packet().unwrap().into_bytes()
}

pub fn fixture_bytes(name: &str) -> Vec<u8> {
    match name {
        "BlueSquare.tif" => tiff(Some(&blue_square_packet("image/tiff"))),
        "zeros.tif" => tiff(None),
        "BlueSquare.jpg" => jpeg(Some(&blue_square_packet("image/jpeg"))),
        "zeros.jpg" => jpeg(None),
        "BlueSquare.png" => png(Some(&blue_square_packet("image/png"))),
        "zeros.png" => png(None),
        "BlueSquare.mov" => mov(Some(&blue_square_packet("video/quicktime"))),
        "zeros.mov" => mov(None),
        "BlueSquare.xmp" => blue_square_packet("application/rdf+xml"),
        #[cfg(feature = "pdf")]
        "BlueSquare.pdf" => pdf(Some(&blue_square_packet("application/pdf"))),
        #[cfg(feature = "pdf")]
        "zeros.pdf" => pdf(None),
        #[cfg(feature = "pdf")]
        "BlueSquare.ai" => pdf(Some(&blue_square_packet("application/vnd.adobe.illustrator"))),
        other => panic!("unknown fixture {}", other),
    }
}

/// Little-endian TIFF: one 8x8 8-bit grey strip
pub fn tiff(packet: Option<&[u8]>) -> Vec<u8> {
    let pixels = vec![0u8; 64];
    let mut entries: Vec<(u16, u16, u32, u32)> = vec![
        (256, 3, 1, 8),  // ImageWidth
        (257, 3, 1, 8),  // ImageLength
        (258, 3, 1, 8),  // BitsPerSample
        (259, 3, 1, 1),  // Compression
        (262, 3, 1, 1),  // PhotometricInterpretation
        (273, 4, 1, 0),  // StripOffsets, patched below
        (277, 3, 1, 1),  // SamplesPerPixel
        (278, 3, 1, 8),  // RowsPerStrip
        (279, 4, 1, 64), // StripByteCounts
    ];
    if let Some(packet) = packet {
        entries.push((700, 7, packet.len() as u32, 0));
    }

    let ifd_len = 2 + entries.len() * 12 + 4;
    let strip_offset = 8 + ifd_len;
    let xmp_offset = strip_offset + pixels.len();

    let mut out = b"II*\0".to_vec();
    out.extend_from_slice(&8u32.to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for (tag, type_, count, value) in entries {
        let value = match tag {
            273 => strip_offset as u32,
            700 => xmp_offset as u32,
            _ => value,
        };
        out.extend_from_slice(&tag.to_le_bytes());
        out.extend_from_slice(&type_.to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&value.to_le_bytes());
    }
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&pixels);
    if let Some(packet) = packet {
        out.extend_from_slice(packet);
    }
    out
}

pub fn jpeg(packet: Option<&[u8]>) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];
    // APP0 JFIF
    out.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x10]);
    out.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
    if let Some(packet) = packet {
        let header = b"http://ns.adobe.com/xap/1.0/\0";
        let len = (2 + header.len() + packet.len()) as u16;
        out.extend_from_slice(&[0xFF, 0xE1]);
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(header);
        out.extend_from_slice(packet);
    }
    // SOS with a few bytes of entropy-coded data
    out.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 0x01, 0x01, 0x00, 0x00, 0x3F, 0x00]);
    out.extend_from_slice(&[0x12, 0x34, 0xFF, 0x00, 0x56]);
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

pub fn png(packet: Option<&[u8]>) -> Vec<u8> {
    let mut out = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&1u32.to_be_bytes());
    ihdr.extend_from_slice(&[8, 0, 0, 0, 0]);
    png_chunk(&mut out, b"IHDR", &ihdr);
    if let Some(packet) = packet {
        let mut itxt = b"XML:com.adobe.xmp\0\0\0\0\0".to_vec();
        itxt.extend_from_slice(packet);
        png_chunk(&mut out, b"iTXt", &itxt);
    }
    png_chunk(&mut out, b"IDAT", &[0x78, 0x9C, 0x63, 0x60, 0x00, 0x00, 0x00, 0x02, 0x00, 0x01]);
    png_chunk(&mut out, b"IEND", &[]);
    out
}

fn png_chunk(out: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    out.extend_from_slice(&(data.len() as u32).to_be_bytes());
    out.extend_from_slice(chunk_type);
    out.extend_from_slice(data);
    let mut crc_input = chunk_type.to_vec();
    crc_input.extend_from_slice(data);
    out.extend_from_slice(&crc32(&crc_input).to_be_bytes());
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFFu32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

pub fn mov(packet: Option<&[u8]>) -> Vec<u8> {
    let mut out = mov_box(b"ftyp", b"qt  \0\0\x02\0qt  ");
    out.extend(mov_box(b"moov", &mov_box(b"mvhd", &[0u8; 100])));
    out.extend(mov_box(b"mdat", &[0x5A; 64]));
    if let Some(packet) = packet {
        let mut payload = vec![
            0xBE, 0x7A, 0xCF, 0xCB, 0x97, 0xA9, 0x42, 0xE8, 0x9C, 0x71, 0x99, 0x94, 0x91, 0xE3,
            0xAF, 0xAC,
        ];
        payload.extend_from_slice(packet);
        out.extend(mov_box(b"uuid", &payload));
    }
    out
}

fn mov_box(box_type: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(box_type);
    out.extend_from_slice(payload);
    out
}

#[cfg(feature = "pdf")]
pub fn pdf(packet: Option<&[u8]>) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.6");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => Object::Reference(pages_id),
        "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );

    let mut catalog = dictionary! {
        "Type" => "Catalog",
        "Pages" => Object::Reference(pages_id),
    };
    if let Some(packet) = packet {
        let stream = Stream::new(
            dictionary! { "Type" => "Metadata", "Subtype" => "XML" },
            packet.to_vec(),
        );
        let metadata_id = doc.add_object(Object::Stream(stream));
        catalog.set("Metadata", Object::Reference(metadata_id));
    }
    let catalog_id = doc.add_object(Object::Dictionary(catalog));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}
