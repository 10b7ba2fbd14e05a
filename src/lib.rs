#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(all(feature = "radio-device-echo", feature = "radio-device-simulator"))]
compile_error!("Only one radio implementation feature can be enabled at a time");

#[cfg(all(not(test), not(any(feature = "radio-device-echo", feature = "radio-device-simulator"))))]
compile_error!("At least one radio implementation feature must be enabled");

#[cfg(all(feature = "std", feature = "embedded"))]
compile_error!("Features `std` and `embedded` are mutually exclusive");

pub mod beacon_scheduler;
pub mod link_classifier;
pub mod messages;
mod node;
pub mod payload_relay;
pub mod radio_devices;
pub mod sensor;
pub mod sensor_buffer;

#[cfg(any(feature = "radio-device-echo", feature = "radio-device-simulator"))]
use crate::radio_devices::{RadioDevice, radio_device_task};

use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::log;
use rand_core::RngCore;
use rand_core::SeedableRng;
use rand_wyrand::WyRand;

pub use beacon_scheduler::{DutyCyclePhase, DutyCycleScheduler, DutyCycleStep, SleepPolicy};
pub use link_classifier::{Classification, LinkClassifier, LinkState, LinkVerdict};
pub use messages::{BeaconPacket, DeviceType, FrameKind, PacketError, PayloadPacket, RadioPacket};
pub use node::{BeaconTick, DiscoveryNode, FrameOutcome, NodeEvent};
pub use payload_relay::PayloadRelay;
pub use sensor::{SensorDevice, SensorReading, SimulatedLightSensor};
pub use sensor_buffer::{BufferPolicy, SampleOutcome, SensorBuffer};

//Wire format constants, these affect compatibility between nodes
/// Number of sensor readings carried by a payload packet
pub const READING_LENGTH: usize = 10;
/// Sentinel stored in empty sensor buffer slots
pub const LIGHT_DEFAULT: i32 = -1;

const RADIO_PACKET_SIZE: usize = 64;
const BEACON_PACKET_SIZE: usize = 16;
const PAYLOAD_PACKET_HEADER_SIZE: usize = 12;
const PAYLOAD_PACKET_SIZE: usize = PAYLOAD_PACKET_HEADER_SIZE + 4 * READING_LENGTH;

const _: () = assert!(PAYLOAD_PACKET_SIZE <= RADIO_PACKET_SIZE, "payload packet does not fit into a radio packet");
const _: () = assert!(BEACON_PACKET_SIZE != PAYLOAD_PACKET_SIZE, "frame kinds are told apart by their length");

//Efficiency constants, these do not affect compatibility
const MAX_EVENTS_PER_FRAME: usize = 4;

#[cfg(feature = "radio-device-simulator")]
const MAX_NODE_COUNT: usize = 16;

#[cfg(not(feature = "radio-device-simulator"))]
const MAX_NODE_COUNT: usize = 1;

/// Delay between initialization and the first beacon burst
const STARTUP_DELAY_MS: u64 = 1;

/// Link-layer destination address
///
/// The protocol only ever transmits to the null address, which the link layer
/// treats as a local broadcast.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct LinkAddress(pub [u8; 8]);

impl LinkAddress {
    pub const NULL: LinkAddress = LinkAddress([0; 8]);
}

/// Configuration of the discovery protocol for one node
///
/// Durations are plain numbers (milliseconds or seconds as named) so the
/// configuration can be built in a `const` context. An interval of zero
/// disables the feature it controls.
#[derive(Clone, Copy)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct DiscoveryConfiguration {
    /// Role advertised in beacons; beacons from the same role are ignored
    pub device_type: DeviceType,
    /// Spacing of beacons inside a burst, in milliseconds
    pub wake_time_ms: u32,
    /// Length of one sleep slot, in milliseconds
    pub sleep_slot_ms: u32,
    /// Number of beacons sent per burst
    pub num_send: u16,
    /// Mean number of sleep slots per cycle, 0 disables sleeping
    pub sleep_cycle: u16,
    pub sleep_policy: SleepPolicy,
    /// RSSI in dBm at or above which a link counts as good
    pub rssi_threshold: i16,
    /// Sensor sampling period, in milliseconds
    pub sample_interval_ms: u32,
    pub sensor_channel: u8,
    pub buffer_policy: BufferPolicy,
    /// Send the sensor buffer to peers seen over a good link
    pub relay_readings: bool,
    /// Report payload packets received over a good link
    pub accept_readings: bool,
    /// Seconds without good contact before a peer is reported absent
    pub absent_interval_secs: u32,
    /// Seconds of continuous good contact before a proximity detection
    pub contact_time_secs: u32,
    /// Minimal seconds between two proximity detections
    pub detect_interval_secs: u32,
}

impl DiscoveryConfiguration {
    /// Default configuration for a role
    ///
    /// Senders relay their sensor buffer, receivers report what they get. A
    /// node relays on a good beacon of the other role only while
    /// `relay_readings` is set, so a default receiver never relays.
    pub const fn for_role(device_type: DeviceType) -> Self {
        let is_sender = matches!(device_type, DeviceType::Sender);
        Self {
            device_type,
            wake_time_ms: 100,
            sleep_slot_ms: 100,
            num_send: 2,
            sleep_cycle: 9,
            sleep_policy: SleepPolicy::Random,
            rssi_threshold: -66,
            sample_interval_ms: 1000,
            sensor_channel: 0,
            buffer_policy: BufferPolicy::BoundedFill,
            relay_readings: is_sender,
            accept_readings: !is_sender,
            absent_interval_secs: 30,
            contact_time_secs: 15,
            detect_interval_secs: 15,
        }
    }
}

#[cfg_attr(feature = "std", derive(Debug))]
pub enum InitializeError {
    TaskSpawnFailed,
}

#[cfg_attr(feature = "std", derive(Debug))]
pub enum ReceiveEventError {
    NotInited,
}

/// Commands from the protocol to the radio device
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioCommand {
    PowerOn,
    PowerOff,
    Transmit(RadioPacket, LinkAddress),
}

/// A frame delivered by the radio together with its signal strength
#[derive(Clone)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ReceivedFrame {
    pub packet: RadioPacket,
    /// RSSI of this frame in dBm
    pub rssi: i16,
}

const TX_COMMAND_QUEUE_SIZE: usize = 16;
type TxCommandQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RadioCommand, TX_COMMAND_QUEUE_SIZE>;
type TxCommandQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RadioCommand, TX_COMMAND_QUEUE_SIZE>;
type TxCommandQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RadioCommand, TX_COMMAND_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static TX_COMMAND_QUEUE: TxCommandQueue = Channel::new();

const RX_FRAME_QUEUE_SIZE: usize = 16;
type RxFrameQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, ReceivedFrame, RX_FRAME_QUEUE_SIZE>;
type RxFrameQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, ReceivedFrame, RX_FRAME_QUEUE_SIZE>;
type RxFrameQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, ReceivedFrame, RX_FRAME_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static RX_FRAME_QUEUE: RxFrameQueue = Channel::new();

const NODE_EVENT_QUEUE_SIZE: usize = 10;
type NodeEventQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, NodeEvent, NODE_EVENT_QUEUE_SIZE>;
type NodeEventQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, NodeEvent, NODE_EVENT_QUEUE_SIZE>;
type NodeEventQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, NodeEvent, NODE_EVENT_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static NODE_EVENT_QUEUE: NodeEventQueue = Channel::new();

enum DiscoveryManagerState {
    Uninitialized,
    Initialized { event_queue_receiver: NodeEventQueueReceiver },
}

/// Entry point of the library
///
/// Spawns the radio device task and the node task, then hands protocol events
/// (detections, absences, transfers, received readings) to the application.
pub struct DiscoveryManager {
    state: DiscoveryManagerState,
}

impl Default for DiscoveryManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryManager {
    pub const fn new() -> Self {
        DiscoveryManager {
            state: DiscoveryManagerState::Uninitialized,
        }
    }

    #[cfg(all(feature = "embedded", any(feature = "radio-device-echo", feature = "radio-device-simulator")))]
    pub fn initialize(
        &mut self,
        config: DiscoveryConfiguration,
        spawner: Spawner,
        radio_device: RadioDevice,
        sensor: &'static mut dyn SensorDevice,
        own_node_id: u32,
        rng_seed: u64,
    ) -> Result<(), InitializeError> {
        self.initialize_common(
            config,
            spawner,
            radio_device,
            sensor,
            &TX_COMMAND_QUEUE,
            &RX_FRAME_QUEUE,
            &NODE_EVENT_QUEUE,
            own_node_id,
            rng_seed,
        )
    }

    #[cfg(all(feature = "std", any(feature = "radio-device-echo", feature = "radio-device-simulator")))]
    pub fn initialize(
        &mut self,
        config: DiscoveryConfiguration,
        spawner: Spawner,
        radio_device: RadioDevice,
        sensor: &'static mut dyn SensorDevice,
        own_node_id: u32,
        rng_seed: u64,
    ) -> Result<(), InitializeError> {
        let tx_command_queue_temp: TxCommandQueue = Channel::new();
        let tx_command_queue_static: &'static TxCommandQueue = Box::leak(Box::new(tx_command_queue_temp));

        let rx_frame_queue_temp: RxFrameQueue = Channel::new();
        let rx_frame_queue_static: &'static RxFrameQueue = Box::leak(Box::new(rx_frame_queue_temp));

        let node_event_queue_temp: NodeEventQueue = Channel::new();
        let node_event_queue_static: &'static NodeEventQueue = Box::leak(Box::new(node_event_queue_temp));

        self.initialize_common(
            config,
            spawner,
            radio_device,
            sensor,
            tx_command_queue_static,
            rx_frame_queue_static,
            node_event_queue_static,
            own_node_id,
            rng_seed,
        )
    }

    #[cfg(any(feature = "radio-device-echo", feature = "radio-device-simulator"))]
    #[allow(clippy::too_many_arguments)]
    fn initialize_common(
        &mut self,
        config: DiscoveryConfiguration,
        spawner: Spawner,
        radio_device: RadioDevice,
        sensor: &'static mut dyn SensorDevice,
        tx_command_queue: &'static TxCommandQueue,
        rx_frame_queue: &'static RxFrameQueue,
        node_event_queue: &'static NodeEventQueue,
        own_node_id: u32,
        rng_seed: u64,
    ) -> Result<(), InitializeError> {
        let mut rng = WyRand::seed_from_u64(rng_seed);

        spawner
            .spawn(radio_device_task(radio_device, tx_command_queue.receiver(), rx_frame_queue.sender(), own_node_id))
            .map_err(|_| InitializeError::TaskSpawnFailed)?;
        log!(log::Level::Debug, "[{}] Radio device task spawned", own_node_id);

        let node = DiscoveryNode::new(&config, own_node_id);
        spawner
            .spawn(node::node_task(
                node,
                sensor,
                rx_frame_queue.receiver(),
                tx_command_queue.sender(),
                node_event_queue.sender(),
                config.sample_interval_ms,
                rng.next_u64(),
            ))
            .map_err(|_| InitializeError::TaskSpawnFailed)?;
        log!(log::Level::Debug, "[{}] Node task spawned", own_node_id);
        log!(
            log::Level::Info,
            "[{}] Neighbour discovery initialized, device type: {}, beacon size: {} bytes",
            own_node_id,
            config.device_type.wire_value(),
            BEACON_PACKET_SIZE
        );

        self.state = DiscoveryManagerState::Initialized {
            event_queue_receiver: node_event_queue.receiver(),
        };
        Ok(())
    }

    pub async fn receive_event(&self) -> Result<NodeEvent, ReceiveEventError> {
        match &self.state {
            DiscoveryManagerState::Uninitialized => Err(ReceiveEventError::NotInited),
            DiscoveryManagerState::Initialized { event_queue_receiver } => Ok(event_queue_receiver.receive().await),
        }
    }

    /// Returns the next pending event without waiting
    pub fn try_receive_event(&self) -> Result<Option<NodeEvent>, ReceiveEventError> {
        match &self.state {
            DiscoveryManagerState::Uninitialized => Err(ReceiveEventError::NotInited),
            DiscoveryManagerState::Initialized { event_queue_receiver } => Ok(event_queue_receiver.try_receive().ok()),
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn manager_receive_event_not_inited() {
        let mgr = DiscoveryManager::new();
        let res = block_on(async { mgr.receive_event().await });
        match res {
            Err(ReceiveEventError::NotInited) => {}
            other => panic!("Expected NotInited, got: {:?}", other),
        }
    }

    #[test]
    fn manager_try_receive_event_not_inited() {
        let mgr = DiscoveryManager::default();
        assert!(matches!(mgr.try_receive_event(), Err(ReceiveEventError::NotInited)));
    }

    #[test]
    fn role_defaults_split_relay_and_reporting() {
        let sender = DiscoveryConfiguration::for_role(DeviceType::Sender);
        assert!(sender.relay_readings);
        assert!(!sender.accept_readings);

        let receiver = DiscoveryConfiguration::for_role(DeviceType::Receiver);
        assert!(!receiver.relay_readings);
        assert!(receiver.accept_readings);
        assert_eq!(receiver.rssi_threshold, -66);
        assert_eq!(receiver.num_send, 2);
        assert_eq!(receiver.sleep_cycle, 9);
    }

    #[test]
    fn packet_sizes_match_wire_layout() {
        assert_eq!(BEACON_PACKET_SIZE, 16);
        assert_eq!(PAYLOAD_PACKET_SIZE, 52);
    }
}
