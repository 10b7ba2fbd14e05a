//! # Discovery Node - Protocol State and Event Loop
//!
//! `DiscoveryNode` owns every piece of mutable protocol state of a node: the
//! duty-cycle scheduler, the link state, the sensor buffer and the sequence
//! counters. It exposes one handler per event source:
//! - `on_beacon_timer`: scheduler wakeup, may produce a beacon
//! - `on_sample_timer`: sensor sampling period
//! - `on_frame`: inbound radio frame, classification and relay
//!
//! Handlers are synchronous and run to completion. `node_task` multiplexes the
//! three sources on one embassy task, so the handlers never interleave and the
//! state needs no locking.
//!
//! ## Receive Path
//!
//! Within one `on_frame` call the beacon is classified first and the relay, if
//! any, is built afterwards from the same state.

use embassy_futures::select::{select3, Either3};
use embassy_sync::channel::TrySendError;
use embassy_time::{Duration, Instant, Timer};
use heapless::Vec;
use log::{log, Level};
use rand_core::{RngCore, SeedableRng};
use rand_wyrand::WyRand;

use crate::beacon_scheduler::{DutyCycleScheduler, DutyCycleStep};
use crate::link_classifier::{LinkClassifier, LinkState, LinkVerdict};
use crate::payload_relay::PayloadRelay;
use crate::sensor::SensorDevice;
use crate::sensor_buffer::{SampleOutcome, SensorBuffer};
use crate::{
    BeaconPacket, DeviceType, DiscoveryConfiguration, FrameKind, LinkAddress, NodeEventQueueSender, PayloadPacket, RadioCommand,
    ReceivedFrame, RxFrameQueueReceiver, TxCommandQueueSender, MAX_EVENTS_PER_FRAME, MAX_NODE_COUNT, READING_LENGTH,
    STARTUP_DELAY_MS,
};

/// Protocol events reported to the application
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum NodeEvent {
    /// First valid peer contact of this node
    Detect { peer_id: u32, at_secs: u64 },
    /// No good-quality contact for the absent interval
    Absent { peer_id: u32, last_contact_secs: u64 },
    /// A payload was relayed in answer to the peer's beacon
    Transfer { peer_id: u32, sequence: u32 },
    /// A payload arrived over a good link
    ReadingsReceived {
        peer_id: u32,
        sequence: u32,
        readings: Vec<i32, READING_LENGTH>,
    },
    /// A payload arrived after the peer stayed in good contact for the contact time
    ProximityDetect {
        peer_id: u32,
        first_contact_secs: u64,
        readings: [i32; READING_LENGTH],
    },
}

/// Work produced by one scheduler wakeup
#[cfg_attr(feature = "std", derive(Debug))]
pub struct BeaconTick {
    pub step: DutyCycleStep,
    pub beacon: Option<BeaconPacket>,
    pub absent: Option<NodeEvent>,
}

/// Work produced by one inbound frame
#[derive(Default)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct FrameOutcome {
    pub events: Vec<NodeEvent, MAX_EVENTS_PER_FRAME>,
    pub relay: Option<PayloadPacket>,
}

pub struct DiscoveryNode {
    own_node_id: u32,
    device_type: DeviceType,
    sensor_channel: u8,
    relay_readings: bool,
    accept_readings: bool,
    scheduler: DutyCycleScheduler,
    classifier: LinkClassifier,
    link_state: LinkState,
    sensor_buffer: SensorBuffer,
    relay: PayloadRelay,
    beacon_sequence: u32,
    current_timestamp: u32,
}

fn timestamp_millis(now: Instant) -> u32 {
    now.as_millis() as u32
}

fn push_event(events: &mut Vec<NodeEvent, MAX_EVENTS_PER_FRAME>, event: NodeEvent, own_node_id: u32) {
    if events.push(event).is_err() {
        log!(Level::Warn, "[{}] Too many events for one frame, dropping event", own_node_id);
    }
}

impl DiscoveryNode {
    pub fn new(config: &DiscoveryConfiguration, own_node_id: u32) -> Self {
        Self {
            own_node_id,
            device_type: config.device_type,
            sensor_channel: config.sensor_channel,
            relay_readings: config.relay_readings,
            accept_readings: config.accept_readings,
            scheduler: DutyCycleScheduler::from_configuration(config),
            classifier: LinkClassifier::from_configuration(config),
            link_state: LinkState::default(),
            sensor_buffer: SensorBuffer::new(config.buffer_policy),
            relay: PayloadRelay::new(own_node_id),
            beacon_sequence: 0,
            current_timestamp: 0,
        }
    }

    pub fn own_node_id(&self) -> u32 {
        self.own_node_id
    }

    pub fn link_state(&self) -> &LinkState {
        &self.link_state
    }

    pub fn sensor_buffer(&self) -> &SensorBuffer {
        &self.sensor_buffer
    }

    pub fn scheduler(&self) -> &DutyCycleScheduler {
        &self.scheduler
    }

    /// Handles a scheduler wakeup at `now`
    pub fn on_beacon_timer<R: RngCore>(&mut self, now: Instant, rng: &mut R) -> BeaconTick {
        let step = self.scheduler.step(rng);

        let beacon = if step.transmit_beacon {
            self.beacon_sequence = self.beacon_sequence.wrapping_add(1);
            self.current_timestamp = timestamp_millis(now);
            Some(BeaconPacket::with(self.own_node_id, self.current_timestamp, self.beacon_sequence, self.device_type))
        } else {
            None
        };

        let absent = self.classifier.check_absence(&mut self.link_state, now).map(|last_contact| {
            let peer_id = self.link_state.last_peer_id.unwrap_or_default();
            log!(Level::Info, "[{}] {} ABSENT {}", self.own_node_id, last_contact.as_secs(), peer_id);
            NodeEvent::Absent {
                peer_id,
                last_contact_secs: last_contact.as_secs(),
            }
        });

        BeaconTick { step, beacon, absent }
    }

    /// Handles a sampling period
    pub fn on_sample_timer(&mut self, sensor: &mut dyn SensorDevice) -> SampleOutcome {
        let outcome = self.sensor_buffer.sample(sensor, self.sensor_channel);
        log!(Level::Trace, "[{}] Sample outcome: {:?}", self.own_node_id, SampleTrace(outcome));
        outcome
    }

    /// Handles an inbound frame received at `now`
    ///
    /// Frames of unknown length and undecodable frames are dropped silently.
    pub fn on_frame(&mut self, frame: &ReceivedFrame, now: Instant) -> FrameOutcome {
        match frame.packet.kind() {
            FrameKind::Beacon => self.on_beacon_frame(frame, now),
            FrameKind::Payload => self.on_payload_frame(frame),
            FrameKind::Unknown => {
                log!(Level::Trace, "[{}] Dropping frame of {} bytes", self.own_node_id, frame.packet.length);
                FrameOutcome::default()
            }
        }
    }

    fn on_beacon_frame(&mut self, frame: &ReceivedFrame, now: Instant) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();
        let beacon = match BeaconPacket::from_packet(&frame.packet) {
            Ok(beacon) => beacon,
            Err(_) => {
                log!(Level::Trace, "[{}] Dropping undecodable beacon", self.own_node_id);
                return outcome;
            }
        };

        let classification = self.classifier.classify(&mut self.link_state, &beacon, frame.rssi, now);
        if classification.verdict == LinkVerdict::SameRole {
            return outcome;
        }
        log!(Level::Debug, "[{}] RSSI: {} from {}", self.own_node_id, frame.rssi, beacon.source_id);

        if classification.newly_detected {
            log!(Level::Info, "[{}] {} DETECT {}", self.own_node_id, now.as_secs(), beacon.source_id);
            push_event(
                &mut outcome.events,
                NodeEvent::Detect {
                    peer_id: beacon.source_id,
                    at_secs: now.as_secs(),
                },
                self.own_node_id,
            );
        }

        if let Some(last_contact) = classification.absent_since {
            log!(Level::Info, "[{}] {} ABSENT {}", self.own_node_id, last_contact.as_secs(), beacon.source_id);
            push_event(
                &mut outcome.events,
                NodeEvent::Absent {
                    peer_id: beacon.source_id,
                    last_contact_secs: last_contact.as_secs(),
                },
                self.own_node_id,
            );
        }

        if classification.verdict != LinkVerdict::Good || !self.relay_readings {
            return outcome;
        }

        let payload = self.relay.relay(&mut self.sensor_buffer, self.current_timestamp);
        log!(Level::Info, "[{}] {} TRANSFER {}", self.own_node_id, now.as_secs(), beacon.source_id);
        push_event(
            &mut outcome.events,
            NodeEvent::Transfer {
                peer_id: beacon.source_id,
                sequence: payload.sequence,
            },
            self.own_node_id,
        );
        outcome.relay = Some(payload);
        outcome
    }

    fn on_payload_frame(&mut self, frame: &ReceivedFrame) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();
        if !self.accept_readings || !self.classifier.accepts_payload(&self.link_state) {
            return outcome;
        }
        let payload = match PayloadPacket::from_packet(&frame.packet) {
            Ok(payload) => payload,
            Err(_) => return outcome,
        };

        let readings: Vec<i32, READING_LENGTH> = payload.valid_readings().collect();
        for (i, reading) in readings.iter().enumerate() {
            log!(Level::Info, "[{}] [{}] Light: {}", self.own_node_id, i, reading);
        }
        push_event(
            &mut outcome.events,
            NodeEvent::ReadingsReceived {
                peer_id: payload.source_id,
                sequence: payload.sequence,
                readings,
            },
            self.own_node_id,
        );

        if let Some(first_contact) = self.classifier.check_proximity(&mut self.link_state) {
            log!(
                Level::Info,
                "[{}] {} DETECT {} (proximity)",
                self.own_node_id,
                first_contact.as_secs(),
                payload.source_id
            );
            push_event(
                &mut outcome.events,
                NodeEvent::ProximityDetect {
                    peer_id: payload.source_id,
                    first_contact_secs: first_contact.as_secs(),
                    readings: payload.readings,
                },
                self.own_node_id,
            );
        }
        outcome
    }
}

/// Log adapter, `SampleOutcome` only derives `Debug` with `std`
struct SampleTrace(SampleOutcome);

impl core::fmt::Debug for SampleTrace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            SampleOutcome::Stored(value) => write!(f, "stored {}", value),
            SampleOutcome::NotReady => write!(f, "not ready"),
            SampleOutcome::Full => write!(f, "buffer full"),
        }
    }
}

fn send_command(tx_command_queue_sender: &TxCommandQueueSender, command: RadioCommand, own_node_id: u32) {
    if let Err(TrySendError::Full(_)) = tx_command_queue_sender.try_send(command) {
        log!(Level::Warn, "[{}] TX command queue full, dropping command", own_node_id);
    }
}

fn send_event(node_event_queue_sender: &NodeEventQueueSender, event: NodeEvent, own_node_id: u32) {
    if let Err(TrySendError::Full(_)) = node_event_queue_sender.try_send(event) {
        log!(Level::Warn, "[{}] Event queue full, dropping event", own_node_id);
    }
}

/// Forwards a scheduler wakeup to the radio and the application
///
/// Order on the radio: power on, beacon, power off.
pub(crate) fn dispatch_beacon_tick(
    tick: BeaconTick,
    tx_command_queue_sender: &TxCommandQueueSender,
    node_event_queue_sender: &NodeEventQueueSender,
    own_node_id: u32,
) {
    if tick.step.power_on {
        send_command(tx_command_queue_sender, RadioCommand::PowerOn, own_node_id);
    }
    if let Some(beacon) = tick.beacon {
        send_command(tx_command_queue_sender, RadioCommand::Transmit(beacon.to_packet(), LinkAddress::NULL), own_node_id);
    }
    if tick.step.power_off {
        send_command(tx_command_queue_sender, RadioCommand::PowerOff, own_node_id);
    }
    if let Some(event) = tick.absent {
        send_event(node_event_queue_sender, event, own_node_id);
    }
}

/// Forwards the result of one inbound frame to the radio and the application
pub(crate) fn dispatch_frame_outcome(
    outcome: FrameOutcome,
    tx_command_queue_sender: &TxCommandQueueSender,
    node_event_queue_sender: &NodeEventQueueSender,
    own_node_id: u32,
) {
    if let Some(payload) = outcome.relay {
        send_command(tx_command_queue_sender, RadioCommand::Transmit(payload.to_packet(), LinkAddress::NULL), own_node_id);
    }
    for event in outcome.events {
        send_event(node_event_queue_sender, event, own_node_id);
    }
}

/// Node task
///
/// The only suspension point is the `select3` below: the task waits for an
/// inbound frame, the scheduler deadline or the sampling deadline, handles
/// whichever comes first to completion, and waits again. Deadlines advance by
/// their period from the previous deadline, not from the wakeup, so they do
/// not drift.
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub(crate) async fn node_task(
    mut node: DiscoveryNode,
    sensor: &'static mut dyn SensorDevice,
    rx_frame_queue_receiver: RxFrameQueueReceiver,
    tx_command_queue_sender: TxCommandQueueSender,
    node_event_queue_sender: NodeEventQueueSender,
    sample_interval_ms: u32,
    rng_seed: u64,
) -> ! {
    let mut rng = WyRand::seed_from_u64(rng_seed);
    let own_node_id = node.own_node_id();
    let sample_interval = Duration::from_millis(sample_interval_ms.max(1) as u64);

    let start = Instant::now();
    let mut next_beacon = start + Duration::from_millis(STARTUP_DELAY_MS);
    let mut next_sample = start;
    log!(Level::Info, "[{}] Node task started, clock {} ms", own_node_id, start.as_millis());

    loop {
        match select3(rx_frame_queue_receiver.receive(), Timer::at(next_beacon), Timer::at(next_sample)).await {
            Either3::First(frame) => {
                let outcome = node.on_frame(&frame, Instant::now());
                dispatch_frame_outcome(outcome, &tx_command_queue_sender, &node_event_queue_sender, own_node_id);
            }
            Either3::Second(()) => {
                let tick = node.on_beacon_timer(Instant::now(), &mut rng);
                next_beacon += tick.step.wait;
                dispatch_beacon_tick(tick, &tx_command_queue_sender, &node_event_queue_sender, own_node_id);
            }
            Either3::Third(()) => {
                node.on_sample_timer(sensor);
                next_sample += sample_interval;
            }
        }
    }
}
