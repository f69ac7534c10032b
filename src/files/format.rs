//! Container format classification
//!
//! A file is classified once, at open time, from its extension and, when the
//! extension says nothing, from the first bytes of its content.

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Number of leading bytes inspected when the extension is not recognized
pub const SNIFF_LEN: usize = 64;

/// Container formats known to the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Tiff,
    Jpeg,
    Png,
    Pdf,
    /// Adobe Illustrator (PDF-compatible)
    Illustrator,
    /// QuickTime / ISO base media
    Mov,
    /// XMP sidecar; the whole file is the packet
    Text,
    Unknown,
}

const EXTENSIONS: &[(FileFormat, &[&str])] = &[
    (FileFormat::Tiff, &["tif", "tiff"]),
    (FileFormat::Jpeg, &["jpg", "jpeg", "jpe"]),
    (FileFormat::Png, &["png"]),
    (FileFormat::Pdf, &["pdf"]),
    (FileFormat::Illustrator, &["ai"]),
    (FileFormat::Mov, &["mov", "qt", "mp4", "m4v", "m4a"]),
    (FileFormat::Text, &["xmp", "txt", "xml"]),
];

/// Top-level box types that may open a QuickTime file
const MOV_LEADING_BOXES: &[&[u8; 4]] = &[b"ftyp", b"moov", b"mdat", b"wide", b"free"];

impl FileFormat {
    /// All formats, in table order
    pub const ALL: [FileFormat; 8] = [
        FileFormat::Tiff,
        FileFormat::Jpeg,
        FileFormat::Png,
        FileFormat::Pdf,
        FileFormat::Illustrator,
        FileFormat::Mov,
        FileFormat::Text,
        FileFormat::Unknown,
    ];

    /// Display name of the format
    pub fn name(self) -> &'static str {
        match self {
            FileFormat::Tiff => "TIFF",
            FileFormat::Jpeg => "JPEG",
            FileFormat::Png => "PNG",
            FileFormat::Pdf => "PDF",
            FileFormat::Illustrator => "Illustrator",
            FileFormat::Mov => "MOV",
            FileFormat::Text => "Text",
            FileFormat::Unknown => "Unknown",
        }
    }

    /// File extensions mapped to this format (lowercase)
    pub fn extensions(self) -> &'static [&'static str] {
        EXTENSIONS
            .iter()
            .find(|(format, _)| *format == self)
            .map(|(_, exts)| *exts)
            .unwrap_or(&[])
    }

    /// Format for a file extension, case-insensitive
    pub fn from_extension(extension: &str) -> FileFormat {
        let ext = extension.to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(_, exts)| exts.contains(&ext.as_str()))
            .map(|(format, _)| *format)
            .unwrap_or(FileFormat::Unknown)
    }

    /// Format from leading content bytes
    pub fn from_signature(header: &[u8]) -> FileFormat {
        if header.starts_with(b"II*\0") || header.starts_with(b"MM\0*") {
            return FileFormat::Tiff;
        }
        if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return FileFormat::Jpeg;
        }
        if header.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            return FileFormat::Png;
        }
        if header.starts_with(b"%PDF-") {
            return FileFormat::Pdf;
        }
        if header.len() >= 8 && MOV_LEADING_BOXES.iter().any(|b| &header[4..8] == *b) {
            return FileFormat::Mov;
        }
        let text = header.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(header);
        let text = trim_leading_whitespace(text);
        if text.starts_with(b"<?xpacket") || text.starts_with(b"<x:xmpmeta") {
            return FileFormat::Text;
        }
        FileFormat::Unknown
    }

    /// Classify a file by extension, falling back to content sniffing.
    ///
    /// Never fails: anything that cannot be read or recognized is `Unknown`.
    pub fn classify(path: &Path) -> FileFormat {
        let by_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(FileFormat::from_extension)
            .unwrap_or(FileFormat::Unknown);
        if by_extension != FileFormat::Unknown {
            return by_extension;
        }

        let mut header = Vec::with_capacity(SNIFF_LEN);
        match File::open(path).and_then(|f| f.take(SNIFF_LEN as u64).read_to_end(&mut header)) {
            Ok(_) => FileFormat::from_signature(&header),
            Err(e) => {
                log::debug!("Cannot sniff {}: {}", path.display(), e);
                FileFormat::Unknown
            }
        }
    }
}

fn trim_leading_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
