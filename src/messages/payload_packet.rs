//! Sensor payload piggybacked on a good-quality contact

use super::radio_packet::{read_i32, read_u32, write_i32, write_u32, PacketError, RadioPacket};
use crate::{LIGHT_DEFAULT, PAYLOAD_PACKET_HEADER_SIZE, PAYLOAD_PACKET_SIZE, RADIO_PACKET_SIZE, READING_LENGTH};

/// Snapshot of a node's sensor buffer
///
/// Sent only as a direct response to a qualifying beacon, never retried.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct PayloadPacket {
    pub source_id: u32,
    pub timestamp: u32,
    pub sequence: u32,
    pub readings: [i32; READING_LENGTH],
}

impl PayloadPacket {
    pub const fn with(source_id: u32, timestamp: u32, sequence: u32, readings: [i32; READING_LENGTH]) -> Self {
        PayloadPacket {
            source_id,
            timestamp,
            sequence,
            readings,
        }
    }

    pub fn to_packet(&self) -> RadioPacket {
        let mut packet = RadioPacket {
            data: [0u8; RADIO_PACKET_SIZE],
            length: PAYLOAD_PACKET_SIZE,
        };
        write_u32(&mut packet.data, 0, self.source_id);
        write_u32(&mut packet.data, 4, self.timestamp);
        write_u32(&mut packet.data, 8, self.sequence);
        for (i, reading) in self.readings.iter().enumerate() {
            write_i32(&mut packet.data, PAYLOAD_PACKET_HEADER_SIZE + i * 4, *reading);
        }
        packet
    }

    pub fn from_packet(packet: &RadioPacket) -> Result<Self, PacketError> {
        packet.expect_length(PAYLOAD_PACKET_SIZE)?;
        let data = packet.as_bytes();
        let mut readings = [LIGHT_DEFAULT; READING_LENGTH];
        for (i, reading) in readings.iter_mut().enumerate() {
            *reading = read_i32(data, PAYLOAD_PACKET_HEADER_SIZE + i * 4);
        }
        Ok(PayloadPacket {
            source_id: read_u32(data, 0),
            timestamp: read_u32(data, 4),
            sequence: read_u32(data, 8),
            readings,
        })
    }

    /// Readings up to the first empty slot
    ///
    /// Slots holding `LIGHT_DEFAULT` were never filled by the sender.
    pub fn valid_readings(&self) -> impl Iterator<Item = i32> + '_ {
        self.readings.iter().copied().take_while(|reading| *reading != LIGHT_DEFAULT)
    }
}
