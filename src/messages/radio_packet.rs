//! # Radio Packet Module
//!
//! Low-level frame structure for radio transmission and reception.
//!
//! ## Frame Layout
//!
//! All multi-byte fields are little-endian. Every frame starts with the same
//! three words:
//! - Bytes 0-3: Source node ID
//! - Bytes 4-7: Timestamp (milliseconds since boot, wrapping)
//! - Bytes 8-11: Sequence number
//!
//! Beacons follow with a 4 byte device type, payloads with `READING_LENGTH`
//! 4 byte sensor readings.

use crate::{BEACON_PACKET_SIZE, PAYLOAD_PACKET_SIZE, RADIO_PACKET_SIZE};

/// Kind of a received frame, derived from its length
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum FrameKind {
    Beacon,
    Payload,
    Unknown,
}

/// Error type for frame decoding
///
/// Decoding errors never propagate past the receive path: the frame is
/// dropped and the error only shows up in the trace log.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum PacketError {
    /// Frame length does not match the expected structure
    WrongSize { expected: usize, actual: usize },

    /// Device type field holds neither the sender nor the receiver tag
    UnknownDeviceType(i32),
}

#[cfg(feature = "std")]
impl core::fmt::Display for PacketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PacketError::WrongSize { expected, actual } => write!(f, "frame has {} bytes, expected {}", actual, expected),
            PacketError::UnknownDeviceType(value) => write!(f, "unknown device type {}", value),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PacketError {}

/// Raw radio frame
///
/// A fixed-size buffer plus the number of valid bytes.
///
/// # Public Fields
/// The `data` and `length` fields are public so radio device implementations
/// can fill the buffer in place.
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct RadioPacket {
    /// Raw frame data buffer of fixed size
    pub data: [u8; RADIO_PACKET_SIZE],

    /// Actual number of valid bytes in the data buffer
    pub length: usize,
}

impl RadioPacket {
    /// Creates a frame by copying `bytes`
    ///
    /// # Returns
    /// `None` if `bytes` does not fit into a radio frame
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > RADIO_PACKET_SIZE {
            return None;
        }
        let mut data = [0u8; RADIO_PACKET_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(RadioPacket { data, length: bytes.len() })
    }

    /// The valid bytes of this frame
    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.length.min(RADIO_PACKET_SIZE)]
    }

    pub fn kind(&self) -> FrameKind {
        match self.length {
            BEACON_PACKET_SIZE => FrameKind::Beacon,
            PAYLOAD_PACKET_SIZE => FrameKind::Payload,
            _ => FrameKind::Unknown,
        }
    }

    /// Source node ID common to every frame kind
    ///
    /// # Returns
    /// `None` if the frame is too short to carry the header
    pub fn source_id(&self) -> Option<u32> {
        if self.length < 4 {
            return None;
        }
        Some(read_u32(&self.data, 0))
    }

    pub(crate) fn expect_length(&self, expected: usize) -> Result<(), PacketError> {
        if self.length != expected {
            return Err(PacketError::WrongSize {
                expected,
                actual: self.length,
            });
        }
        Ok(())
    }
}

pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

pub(crate) fn read_i32(data: &[u8], offset: usize) -> i32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    i32::from_le_bytes(bytes)
}

pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

pub(crate) fn write_i32(data: &mut [u8], offset: usize, value: i32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn frame_kind_follows_length() {
        let beacon = RadioPacket::from_bytes(&[0u8; BEACON_PACKET_SIZE]).unwrap();
        assert_eq!(beacon.kind(), FrameKind::Beacon);

        let payload = RadioPacket::from_bytes(&[0u8; PAYLOAD_PACKET_SIZE]).unwrap();
        assert_eq!(payload.kind(), FrameKind::Payload);

        let odd = RadioPacket::from_bytes(&[0u8; BEACON_PACKET_SIZE + 1]).unwrap();
        assert_eq!(odd.kind(), FrameKind::Unknown);
    }

    #[test]
    fn oversized_input_is_rejected() {
        assert!(RadioPacket::from_bytes(&[0u8; RADIO_PACKET_SIZE + 1]).is_none());
        assert_eq!(RadioPacket::from_bytes(&[7u8; RADIO_PACKET_SIZE]).unwrap().as_bytes().len(), RADIO_PACKET_SIZE);
    }

    #[test]
    fn source_id_needs_a_full_word() {
        let short = RadioPacket::from_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(short.source_id(), None);

        let frame = RadioPacket::from_bytes(&[0x2A, 0, 0, 0, 9]).unwrap();
        assert_eq!(frame.source_id(), Some(42));
    }

    #[test]
    fn expect_length_reports_both_sizes() {
        let frame = RadioPacket::from_bytes(&[0u8; 5]).unwrap();
        assert_eq!(frame.expect_length(16), Err(PacketError::WrongSize { expected: 16, actual: 5 }));
        assert_eq!(format!("{}", PacketError::WrongSize { expected: 16, actual: 5 }), "frame has 5 bytes, expected 16");
    }
}
