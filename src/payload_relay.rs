//! Opportunistic payload relay
//!
//! Turns the sensor buffer into a payload packet when a beacon confirms a good
//! link. The relay is fire-and-forget: one packet per qualifying beacon, no
//! acknowledgement and no retry.

use log::log;

use crate::sensor_buffer::SensorBuffer;
use crate::PayloadPacket;

pub struct PayloadRelay {
    source_id: u32,
    sequence: u32,
}

impl PayloadRelay {
    pub const fn new(source_id: u32) -> Self {
        Self { source_id, sequence: 0 }
    }

    /// Sequence number of the most recent payload, 0 before the first one
    pub fn last_sequence(&self) -> u32 {
        self.sequence
    }

    /// Builds the next payload from `buffer` and resets the buffer
    ///
    /// `timestamp` is the node's locally tracked time of its last beacon.
    pub fn relay(&mut self, buffer: &mut SensorBuffer, timestamp: u32) -> PayloadPacket {
        self.sequence = self.sequence.wrapping_add(1);
        let packet = PayloadPacket::with(self.source_id, timestamp, self.sequence, buffer.snapshot());
        log!(
            log::Level::Debug,
            "[{}] Relaying {} readings, seq {}",
            self.source_id,
            buffer.len(),
            self.sequence
        );
        buffer.reset();
        packet
    }
}
