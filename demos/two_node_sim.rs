use embassy_executor::Spawner;
use embassy_futures::select::{select, Either};
use embassy_sync::channel::Channel;
use env_logger::Builder;
use log::{log, LevelFilter};
use proximity_beacon_lib::radio_devices::simulator::{
    RadioDevice, RadioInputMessage, RadioInputQueue, RadioInputQueueSender, RadioOutputMessage, RadioOutputQueue,
    RadioOutputQueueReceiver,
};
use proximity_beacon_lib::{DeviceType, DiscoveryConfiguration, DiscoveryManager, ReceivedFrame, SensorDevice, SimulatedLightSensor};

const SENDER_NODE_ID: u32 = 1;
const RECEIVER_NODE_ID: u32 = 2;
/// Both nodes sit well inside the good-link threshold
const LINK_RSSI: i16 = -50;

/// Carries everything one node puts on the air to the other node
#[embassy_executor::task(pool_size = 2)]
async fn air(from_node_id: u32, output_receiver: RadioOutputQueueReceiver, peer_input_sender: RadioInputQueueSender) -> ! {
    loop {
        match output_receiver.receive().await {
            RadioOutputMessage::SendPacket(packet, _) => {
                log!(log::Level::Trace, "air: {} bytes from node {}", packet.length, from_node_id);
                let frame = ReceivedFrame { packet, rssi: LINK_RSSI };
                if peer_input_sender.try_send(RadioInputMessage::ReceivePacket(frame)).is_err() {
                    log!(log::Level::Warn, "air: input queue of peer of node {} full", from_node_id);
                }
            }
            RadioOutputMessage::PowerState(on) => {
                log!(log::Level::Trace, "air: node {} radio {}", from_node_id, if on { "on" } else { "off" });
            }
        }
    }
}

fn start_node(
    spawner: Spawner,
    device_type: DeviceType,
    node_id: u32,
    output_queue: &'static RadioOutputQueue,
    input_queue: &'static RadioInputQueue,
) -> &'static DiscoveryManager {
    let radio_device = RadioDevice::with(output_queue.sender(), input_queue.receiver());
    let sensor: &'static mut dyn SensorDevice = Box::leak(Box::new(SimulatedLightSensor::new(node_id as u64, 2, 400, 60)));

    let mut manager = DiscoveryManager::new();
    let mut config = DiscoveryConfiguration::for_role(device_type);
    config.sample_interval_ms = 500;
    if let Err(err) = manager.initialize(config, spawner, radio_device, sensor, node_id, 0x5eed_0000 + node_id as u64) {
        log!(log::Level::Error, "Error initializing node {}: {:?}", node_id, err);
    }
    Box::leak(Box::new(manager))
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    Builder::new().filter_level(LevelFilter::Info).parse_default_env().init();

    log!(log::Level::Info, "Starting two node simulation");
    let sender_output: &'static RadioOutputQueue = Box::leak(Box::new(Channel::new()));
    let sender_input: &'static RadioInputQueue = Box::leak(Box::new(Channel::new()));
    let receiver_output: &'static RadioOutputQueue = Box::leak(Box::new(Channel::new()));
    let receiver_input: &'static RadioInputQueue = Box::leak(Box::new(Channel::new()));

    let sender = start_node(spawner, DeviceType::Sender, SENDER_NODE_ID, sender_output, sender_input);
    let receiver = start_node(spawner, DeviceType::Receiver, RECEIVER_NODE_ID, receiver_output, receiver_input);

    if spawner.spawn(air(SENDER_NODE_ID, sender_output.receiver(), receiver_input.sender())).is_err()
        || spawner.spawn(air(RECEIVER_NODE_ID, receiver_output.receiver(), sender_input.sender())).is_err()
    {
        log!(log::Level::Error, "Error spawning air tasks");
        return;
    }

    loop {
        match select(sender.receive_event(), receiver.receive_event()).await {
            Either::First(Ok(event)) => log!(log::Level::Info, "node {}: {:?}", SENDER_NODE_ID, event),
            Either::Second(Ok(event)) => log!(log::Level::Info, "node {}: {:?}", RECEIVER_NODE_ID, event),
            Either::First(Err(err)) | Either::Second(Err(err)) => {
                log!(log::Level::Error, "Error receiving event: {:?}", err);
                return;
            }
        }
    }
}
