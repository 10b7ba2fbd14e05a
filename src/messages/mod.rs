//! # Messages Module
//!
//! Wire structures exchanged between discovery nodes.
//!
//! ## Architecture
//!
//! - **RadioPacket**: Raw frame as handed to and received from the radio
//! - **BeaconPacket**: Short periodic discovery frame identifying a node and its role
//! - **PayloadPacket**: Snapshot of the sender's sensor buffer, sent after a good-quality beacon
//!
//! ## Frame Discrimination
//!
//! Frames carry no type byte. Like the link layer they were designed for, the
//! receiver tells beacons and payloads apart by their exact length, and drops
//! any frame whose length matches neither.

pub mod beacon_packet;
pub mod payload_packet;
pub mod radio_packet;

pub use beacon_packet::{BeaconPacket, DeviceType};
pub use payload_packet::PayloadPacket;
pub use radio_packet::{FrameKind, PacketError, RadioPacket};
