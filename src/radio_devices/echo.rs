//! # Radio Device Echo - Loopback Device for Testing
//!
//! Minimal radio device that hands every transmitted packet straight back to
//! its own node with a fixed, strong RSSI. A node ignores beacons of its own
//! role, so the echo device exercises the transmit and receive plumbing
//! without producing detections. Multi-node behaviour needs the simulator.

use crate::RadioCommand;
use crate::ReceivedFrame;
use crate::RxFrameQueueSender;
use crate::TxCommandQueueReceiver;
use crate::MAX_NODE_COUNT;
use embassy_sync::channel::TrySendError;
use log::{log, Level};

/// RSSI assigned to every echoed frame
pub const ECHO_RSSI: i16 = -30;

/// Echo radio device task
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn radio_device_task(
    mut radio_device: RadioDevice,
    tx_receiver: TxCommandQueueReceiver,
    rx_sender: RxFrameQueueSender,
    own_node_id: u32,
) -> ! {
    log!(Level::Info, "[{}] Echo radio device task started", own_node_id);
    radio_device.run(tx_receiver, rx_sender, own_node_id).await
}

/// Echo radio device
#[derive(Default)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct RadioDevice {
    powered: bool,
}

impl RadioDevice {
    pub const fn new() -> Self {
        RadioDevice { powered: false }
    }

    /// Applies a command, returning the frame to echo for a powered transmit
    fn echo(&mut self, command: RadioCommand) -> Option<ReceivedFrame> {
        match command {
            RadioCommand::PowerOn => {
                self.powered = true;
                None
            }
            RadioCommand::PowerOff => {
                self.powered = false;
                None
            }
            RadioCommand::Transmit(packet, _) if self.powered => Some(ReceivedFrame { packet, rssi: ECHO_RSSI }),
            RadioCommand::Transmit(_, _) => None,
        }
    }

    async fn run(&mut self, tx_receiver: TxCommandQueueReceiver, rx_sender: RxFrameQueueSender, own_node_id: u32) -> ! {
        loop {
            let command = tx_receiver.receive().await;
            let Some(frame) = self.echo(command) else {
                continue;
            };
            log::trace!("[{}] Echoing {} byte packet", own_node_id, frame.packet.length);
            if let Err(TrySendError::Full(dropped)) = rx_sender.try_send(frame) {
                // Backpressure: drop echoed frame and log
                log!(
                    Level::Warn,
                    "[{}] RX queue full, dropping echoed frame of {} bytes",
                    own_node_id,
                    dropped.packet.length
                );
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::{LinkAddress, PayloadPacket, LIGHT_DEFAULT, READING_LENGTH};

    #[test]
    fn echoes_only_while_powered() {
        let mut radio = RadioDevice::new();
        let packet = PayloadPacket::with(3, 0, 1, [LIGHT_DEFAULT; READING_LENGTH]).to_packet();

        assert!(radio.echo(RadioCommand::Transmit(packet.clone(), LinkAddress::NULL)).is_none());
        assert!(radio.echo(RadioCommand::PowerOn).is_none());
        let frame = radio.echo(RadioCommand::Transmit(packet, LinkAddress::NULL)).expect("radio is on");
        assert_eq!(frame.rssi, ECHO_RSSI);
        assert_eq!(frame.packet.length, 52);

        radio.echo(RadioCommand::PowerOff);
        let packet = PayloadPacket::with(3, 0, 2, [LIGHT_DEFAULT; READING_LENGTH]).to_packet();
        assert!(radio.echo(RadioCommand::Transmit(packet, LinkAddress::NULL)).is_none());
    }
}
