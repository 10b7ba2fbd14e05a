//! Neighbour discovery beacon

use super::radio_packet::{read_i32, read_u32, write_i32, write_u32, PacketError, RadioPacket};
use crate::{BEACON_PACKET_SIZE, RADIO_PACKET_SIZE};

/// Role of a node in the discovery exchange
///
/// Nodes only pair with the opposite role; a sender ignores other senders.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum DeviceType {
    Sender,
    Receiver,
}

impl DeviceType {
    /// Integer tag used on the wire
    pub const fn wire_value(self) -> i32 {
        match self {
            DeviceType::Sender => 0,
            DeviceType::Receiver => 1,
        }
    }

    pub fn from_wire(value: i32) -> Result<Self, PacketError> {
        match value {
            0 => Ok(DeviceType::Sender),
            1 => Ok(DeviceType::Receiver),
            other => Err(PacketError::UnknownDeviceType(other)),
        }
    }

    pub const fn opposite(self) -> Self {
        match self {
            DeviceType::Sender => DeviceType::Receiver,
            DeviceType::Receiver => DeviceType::Sender,
        }
    }
}

/// Discovery beacon, built fresh for every transmission
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct BeaconPacket {
    pub source_id: u32,
    pub timestamp: u32,
    pub sequence: u32,
    pub device_type: DeviceType,
}

impl BeaconPacket {
    pub const fn with(source_id: u32, timestamp: u32, sequence: u32, device_type: DeviceType) -> Self {
        BeaconPacket {
            source_id,
            timestamp,
            sequence,
            device_type,
        }
    }

    pub fn to_packet(&self) -> RadioPacket {
        let mut packet = RadioPacket {
            data: [0u8; RADIO_PACKET_SIZE],
            length: BEACON_PACKET_SIZE,
        };
        write_u32(&mut packet.data, 0, self.source_id);
        write_u32(&mut packet.data, 4, self.timestamp);
        write_u32(&mut packet.data, 8, self.sequence);
        write_i32(&mut packet.data, 12, self.device_type.wire_value());
        packet
    }

    /// Decodes a beacon
    ///
    /// The frame must be exactly `BEACON_PACKET_SIZE` bytes long.
    pub fn from_packet(packet: &RadioPacket) -> Result<Self, PacketError> {
        packet.expect_length(BEACON_PACKET_SIZE)?;
        let data = packet.as_bytes();
        Ok(BeaconPacket {
            source_id: read_u32(data, 0),
            timestamp: read_u32(data, 4),
            sequence: read_u32(data, 8),
            device_type: DeviceType::from_wire(read_i32(data, 12))?,
        })
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::FrameKind;

    #[test]
    fn encodes_little_endian_fields() {
        let beacon = BeaconPacket::with(0x0102_0304, 500, 7, DeviceType::Receiver);
        let packet = beacon.to_packet();
        assert_eq!(packet.kind(), FrameKind::Beacon);
        assert_eq!(&packet.as_bytes()[0..4], &[4, 3, 2, 1]);
        assert_eq!(&packet.as_bytes()[8..12], &[7, 0, 0, 0]);
        assert_eq!(&packet.as_bytes()[12..16], &[1, 0, 0, 0]);
        assert_eq!(BeaconPacket::from_packet(&packet), Ok(beacon));
    }

    #[test]
    fn rejects_wrong_length() {
        let packet = RadioPacket::from_bytes(&[0u8; 12]).unwrap();
        assert_eq!(
            BeaconPacket::from_packet(&packet),
            Err(PacketError::WrongSize { expected: 16, actual: 12 })
        );
    }

    #[test]
    fn rejects_unknown_device_type() {
        let mut packet = BeaconPacket::with(1, 2, 3, DeviceType::Sender).to_packet();
        packet.data[12] = 5;
        assert_eq!(BeaconPacket::from_packet(&packet), Err(PacketError::UnknownDeviceType(5)));
    }

    #[test]
    fn opposite_roles() {
        assert_eq!(DeviceType::Sender.opposite(), DeviceType::Receiver);
        assert_eq!(DeviceType::Receiver.opposite(), DeviceType::Sender);
    }
}
