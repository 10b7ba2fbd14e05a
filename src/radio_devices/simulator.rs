//! # Radio Device Simulator
//!
//! Simulated transceiver for running several nodes inside one process. The
//! device talks to a network simulator through two queues:
//! - **Output Queue**: packets this node transmits and its power transitions
//! - **Input Queue**: frames the simulator delivers to this node, RSSI included
//!
//! The simulator decides topology and signal strength. The device only models
//! the radio power state: frames that arrive while the radio is off are lost,
//! and transmissions are refused until the radio is powered on again.

use crate::LinkAddress;
use crate::RadioCommand;
use crate::RadioPacket;
use crate::ReceivedFrame;
use crate::RxFrameQueueSender;
use crate::TxCommandQueueReceiver;
use crate::MAX_NODE_COUNT;
use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::TrySendError;
use log::{log, Level};

const RADIO_OUTPUT_QUEUE_SIZE: usize = 10;

/// Channel from the simulated radio to the network simulator
pub type RadioOutputQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RadioOutputMessage, RADIO_OUTPUT_QUEUE_SIZE>;
pub type RadioOutputQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RadioOutputMessage, RADIO_OUTPUT_QUEUE_SIZE>;
pub type RadioOutputQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RadioOutputMessage, RADIO_OUTPUT_QUEUE_SIZE>;

const RADIO_INPUT_QUEUE_SIZE: usize = 10;

/// Channel from the network simulator to the simulated radio
pub type RadioInputQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RadioInputMessage, RADIO_INPUT_QUEUE_SIZE>;
pub type RadioInputQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RadioInputMessage, RADIO_INPUT_QUEUE_SIZE>;
pub type RadioInputQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RadioInputMessage, RADIO_INPUT_QUEUE_SIZE>;

/// Messages sent from the simulated radio to the network simulator
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioOutputMessage {
    /// A packet put on the air
    SendPacket(RadioPacket, LinkAddress),
    /// The radio was switched on (`true`) or off (`false`)
    PowerState(bool),
}

/// Messages received by the simulated radio from the network simulator
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioInputMessage {
    /// A frame heard by this node, with the RSSI the simulator assigned
    ReceivePacket(ReceivedFrame),
}

/// Simulated radio device task
///
/// Races the simulator input against the node's commands. Received frames are
/// forwarded with `try_send`; a full RX queue drops the frame, as a real radio
/// with a full FIFO would.
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn radio_device_task(
    mut radio_device: RadioDevice,
    tx_receiver: TxCommandQueueReceiver,
    rx_sender: RxFrameQueueSender,
    own_node_id: u32,
) -> ! {
    log!(Level::Info, "[{}] Simulated radio device task started", own_node_id);
    loop {
        match select(radio_device.input_queue_receiver.receive(), tx_receiver.receive()).await {
            Either::First(RadioInputMessage::ReceivePacket(frame)) => {
                let Some(frame) = radio_device.accept_frame(frame, own_node_id) else {
                    continue;
                };
                if let Err(TrySendError::Full(_)) = rx_sender.try_send(frame) {
                    log!(Level::Warn, "[{}] RX queue full, dropping frame", own_node_id);
                }
            }
            Either::Second(command) => {
                if let Some(message) = radio_device.apply_command(command, own_node_id) {
                    radio_device.output_queue_sender.send(message).await;
                }
            }
        }
    }
}

/// Simulated radio device
pub struct RadioDevice {
    output_queue_sender: RadioOutputQueueSender,
    input_queue_receiver: RadioInputQueueReceiver,
    powered: bool,
}

#[cfg(feature = "std")]
impl core::fmt::Debug for RadioDevice {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RadioDevice").field("powered", &self.powered).finish()
    }
}

impl RadioDevice {
    /// Creates a powered-off simulated radio on the given simulator queues
    ///
    /// # Example
    /// ```rust,ignore
    /// use embassy_sync::channel::Channel;
    /// use proximity_beacon_lib::radio_devices::simulator::*;
    ///
    /// static OUTPUT_QUEUE: RadioOutputQueue = Channel::new();
    /// static INPUT_QUEUE: RadioInputQueue = Channel::new();
    ///
    /// let radio = RadioDevice::with(OUTPUT_QUEUE.sender(), INPUT_QUEUE.receiver());
    /// ```
    pub const fn with(output_queue_sender: RadioOutputQueueSender, input_queue_receiver: RadioInputQueueReceiver) -> Self {
        RadioDevice {
            output_queue_sender,
            input_queue_receiver,
            powered: false,
        }
    }

    pub fn is_powered(&self) -> bool {
        self.powered
    }

    /// Applies a node command
    ///
    /// # Returns
    /// The message to forward to the simulator, if any. Repeated power commands
    /// and transmissions while powered off produce nothing.
    fn apply_command(&mut self, command: RadioCommand, own_node_id: u32) -> Option<RadioOutputMessage> {
        match command {
            RadioCommand::PowerOn | RadioCommand::PowerOff => {
                let powered = matches!(command, RadioCommand::PowerOn);
                if self.powered == powered {
                    return None;
                }
                self.powered = powered;
                log!(Level::Trace, "[{}] Radio powered {}", own_node_id, if powered { "on" } else { "off" });
                Some(RadioOutputMessage::PowerState(powered))
            }
            RadioCommand::Transmit(packet, destination) => {
                if !self.powered {
                    log!(Level::Debug, "[{}] Radio off, dropping {} byte transmission", own_node_id, packet.length);
                    return None;
                }
                Some(RadioOutputMessage::SendPacket(packet, destination))
            }
        }
    }

    /// Filters a frame delivered by the simulator through the power state
    fn accept_frame(&self, frame: ReceivedFrame, own_node_id: u32) -> Option<ReceivedFrame> {
        if !self.powered {
            log!(Level::Trace, "[{}] Radio off, frame lost", own_node_id);
            return None;
        }
        Some(frame)
    }
}
