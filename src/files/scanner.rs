//! Generic packet scanner
//!
//! Finds an XMP packet by its `<?xpacket` delimiters without understanding the
//! container around it. Rewrites are byte-range replacements: a packet that
//! fits is padded to the old length, a larger one is spliced in only where the
//! format tolerates the file growing in the middle.

use crate::core::error::{XmpError, XmpResult};
use crate::core::serializer::padding;
use crate::files::capability::capability;
use crate::files::format::FileFormat;
use crate::files::handler::XmpOptions;
use std::ops::Range;

/// Search window used by `limited_scanning`
pub const LIMITED_SCAN_WINDOW: usize = 1024 * 1024;

const PACKET_START: &[u8] = b"<?xpacket begin=";
const PACKET_END: &[u8] = b"<?xpacket end=";

/// Byte range of a packet inside a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketLocation {
    /// Offset of `<?xpacket begin=`
    pub offset: usize,
    /// Length up to and including the trailer's `?>`
    pub length: usize,
    /// Trailer is `end="w"`
    pub writable: bool,
}

impl PacketLocation {
    /// Byte range covered by the packet
    pub fn range(&self) -> Range<usize> {
        self.offset..self.offset + self.length
    }
}

/// Generic handler based on delimiter search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketScanner {
    window: Option<usize>,
    whole_file: bool,
    resize_allowed: bool,
}

impl PacketScanner {
    /// Unbounded scanner that never resizes
    pub fn new() -> Self {
        Self {
            window: None,
            whole_file: false,
            resize_allowed: false,
        }
    }

    /// Scanner configured from the capability table and open options
    pub fn for_format(format: FileFormat, options: &XmpOptions) -> Self {
        let caps = capability(format);
        Self {
            window: options.limited_scanning.then_some(LIMITED_SCAN_WINDOW),
            whole_file: caps.whole_file_packet,
            resize_allowed: caps.generic_resize_allowed,
        }
    }

    /// Only accept packets starting within the first `window` bytes
    pub fn with_window(mut self, window: Option<usize>) -> Self {
        self.window = window;
        self
    }

    /// Allow packets larger than the existing one to be spliced in
    pub fn with_resize(mut self, allowed: bool) -> Self {
        self.resize_allowed = allowed;
        self
    }

    /// Treat the whole file as the packet
    pub fn with_whole_file(mut self, whole_file: bool) -> Self {
        self.whole_file = whole_file;
        self
    }

    /// Find the first complete packet in `data`
    pub fn find_packet(&self, data: &[u8]) -> Option<PacketLocation> {
        let limit = self.window.map_or(data.len(), |w| w.min(data.len()));
        let mut search_pos = 0;

        while let Some(pos) = find(&data[search_pos..limit], PACKET_START) {
            let start = search_pos + pos;
            if let Some((end, writable)) = Self::find_trailer(data, start) {
                log::trace!("Packet found at {}..{} (writable: {})", start, end, writable);
                return Some(PacketLocation {
                    offset: start,
                    length: end - start,
                    writable,
                });
            }
            search_pos = start + 1;
        }

        if self.whole_file && !data.iter().all(u8::is_ascii_whitespace) {
            return Some(PacketLocation {
                offset: 0,
                length: data.len(),
                writable: true,
            });
        }
        None
    }

    /// Locate the trailer after `start`; returns (end offset, writable)
    fn find_trailer(data: &[u8], start: usize) -> Option<(usize, bool)> {
        let marker = start + find(&data[start..], PACKET_END)?;
        let rest = &data[marker + PACKET_END.len()..];
        // end="w"?> or end='r'?>
        let (quote, mode) = (*rest.first()?, *rest.get(1)?);
        if !matches!(quote, b'"' | b'\'') || rest.get(2) != Some(&quote) {
            return None;
        }
        let close = find(rest, b"?>")?;
        let writable = match mode {
            b'w' => true,
            b'r' => false,
            _ => return None,
        };
        Some((marker + PACKET_END.len() + close + 2, writable))
    }

    /// Locate the packet and borrow its bytes
    pub fn read<'a>(&self, data: &'a [u8]) -> Option<(PacketLocation, &'a [u8])> {
        let location = self.find_packet(data)?;
        Some((location, &data[location.range()]))
    }

    /// Whether a packet of `new_len` bytes can replace the one at `location`
    pub fn can_write(&self, location: Option<&PacketLocation>, new_len: usize) -> bool {
        if self.whole_file {
            return true;
        }
        match location {
            Some(loc) => loc.writable && (new_len <= loc.length || self.resize_allowed),
            None => false,
        }
    }

    /// Produce the new file content with `packet` in place of the one at `location`
    pub fn write(
        &self,
        data: &[u8],
        location: Option<&PacketLocation>,
        packet: &[u8],
    ) -> XmpResult<Vec<u8>> {
        if self.whole_file {
            return Ok(packet.to_vec());
        }
        let Some(loc) = location else {
            return Err(XmpError::InjectionUnsupported(
                "No existing packet for the packet scanner to replace".to_string(),
            ));
        };
        if !loc.writable {
            return Err(XmpError::InjectionUnsupported(
                "Existing packet is marked read-only".to_string(),
            ));
        }

        let replacement = if packet.len() <= loc.length {
            pad_packet(packet, loc.length)
        } else if self.resize_allowed {
            packet.to_vec()
        } else {
            return Err(XmpError::InjectionUnsupported(format!(
                "Packet of {} bytes does not fit the existing {} byte packet",
                packet.len(),
                loc.length
            )));
        };

        let mut out = Vec::with_capacity(data.len() - loc.length + replacement.len());
        out.extend_from_slice(&data[..loc.offset]);
        out.extend_from_slice(&replacement);
        out.extend_from_slice(&data[loc.offset + loc.length..]);
        Ok(out)
    }
}

impl Default for PacketScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Grow `packet` to exactly `target` bytes with whitespace before its trailer
fn pad_packet(packet: &[u8], target: usize) -> Vec<u8> {
    let fill = padding(target - packet.len());
    let split = rfind(packet, PACKET_END).unwrap_or(packet.len());
    let mut out = Vec::with_capacity(target);
    out.extend_from_slice(&packet[..split]);
    out.extend_from_slice(fill.as_bytes());
    out.extend_from_slice(&packet[split..]);
    out
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn rfind(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .rposition(|window| window == needle)
}
