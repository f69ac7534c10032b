//! The boundary between file handling and the metadata model
//!
//! The file layer never looks inside a packet. It asks the metadata object for
//! a serialized buffer before injection and builds one from the raw buffer it
//! located on read. Any type implementing [`XmpPacket`] can stand on the other
//! side of that boundary.

use crate::core::error::XmpResult;

/// A metadata value that round-trips through a serialized XMP packet
pub trait XmpPacket: Default + Sized {
    /// Build a value from a raw packet buffer as found in a file
    fn from_packet(packet: &[u8]) -> XmpResult<Self>;

    /// Serialize to the buffer that will be embedded in a file
    fn to_packet(&self) -> XmpResult<Vec<u8>>;
}

/// Raw bytes, for callers that want to move packets without parsing them
impl XmpPacket for Vec<u8> {
    fn from_packet(packet: &[u8]) -> XmpResult<Self> {
        Ok(packet.to_vec())
    }

    fn to_packet(&self) -> XmpResult<Vec<u8>> {
        Ok(self.clone())
    }
}
