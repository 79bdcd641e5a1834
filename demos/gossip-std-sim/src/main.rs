use embassy_executor::Spawner;
use embassy_futures::select::select_array;
use env_logger::Builder;
use log::{LevelFilter, log};
use rand_core::{RngCore, SeedableRng};
use rand_wyrand::WyRand;
use rssi_gossip_lib::radio_devices::simulator::{RadioDevice, RadioInputMessage, RadioInputQueue, RadioInputQueueSender, RadioOutputMessage, RadioOutputQueue, RadioOutputQueueReceiver};
use rssi_gossip_lib::{GossipConfiguration, GossipManager, MESH_SERVICE_UUID, ReceivedPacket};

const NODE_COUNT: usize = 4;

// Mean RSSI in dBm of the link from the broadcasting node (row) to the listening node (column)
const LINK_RSSI: [[Option<i8>; NODE_COUNT]; NODE_COUNT] = [
    [None, Some(-52), Some(-71), None],
    [Some(-54), None, Some(-63), Some(-88)],
    [Some(-70), Some(-61), None, Some(-77)],
    [None, Some(-90), Some(-75), None],
];

const RSSI_NOISE_DBM: u64 = 4;

#[embassy_executor::task]
async fn network_simulator_task(
    outputs: [RadioOutputQueueReceiver; NODE_COUNT],
    inputs: [RadioInputQueueSender; NODE_COUNT],
    rng_seed: u64,
) -> ! {
    let mut rng = WyRand::seed_from_u64(rng_seed);
    loop {
        let (message, sender_index) = select_array(outputs.each_ref().map(|output| output.receive())).await;
        match message {
            RadioOutputMessage::Broadcast(packet) => {
                for (receiver_index, input) in inputs.iter().enumerate() {
                    let Some(mean_rssi) = LINK_RSSI[sender_index][receiver_index] else {
                        continue;
                    };
                    let noise = (rng.next_u64() % (2 * RSSI_NOISE_DBM + 1)) as i8 - RSSI_NOISE_DBM as i8;
                    let received_packet = ReceivedPacket {
                        packet: packet.clone(),
                        rssi: mean_rssi.saturating_add(noise),
                        service_uuid: Some(MESH_SERVICE_UUID),
                    };
                    if input.try_send(RadioInputMessage::ReceivePacket(received_packet)).is_err() {
                        log!(log::Level::Warn, "Input queue of node {} full, frame lost", receiver_index);
                    }
                }
            }
            RadioOutputMessage::ScanStarted { duration_ms } => {
                log!(log::Level::Trace, "Node {} scanning for {} ms", sender_index, duration_ms);
            }
            RadioOutputMessage::ScanStopped => {
                log!(log::Level::Trace, "Node {} stopped scanning", sender_index);
            }
        }
    }
}

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    Builder::new().filter_level(LevelFilter::Info).parse_default_env().init();

    let output_queues: [&'static RadioOutputQueue; NODE_COUNT] =
        core::array::from_fn(|_| &*Box::leak(Box::new(RadioOutputQueue::new())));
    let input_queues: [&'static RadioInputQueue; NODE_COUNT] =
        core::array::from_fn(|_| &*Box::leak(Box::new(RadioInputQueue::new())));

    let mut gossip_managers: [GossipManager; NODE_COUNT] = core::array::from_fn(|_| GossipManager::new());
    for (node_index, gossip_manager) in gossip_managers.iter_mut().enumerate() {
        let radio_device = RadioDevice::with(output_queues[node_index].sender(), input_queues[node_index].receiver());
        // Staggered idle intervals keep the nodes from broadcasting in lockstep
        let configuration = GossipConfiguration {
            scan_duration_ms: 3000,
            idle_interval_ms: 500 + 350 * node_index as u32,
            ..GossipConfiguration::default()
        };
        if let Err(error) = gossip_manager.initialize(configuration, spawner, radio_device, node_index as u32) {
            log!(log::Level::Error, "Failed to start node {}: {}", node_index, error);
            return;
        }
    }

    let outputs = output_queues.map(|queue| queue.receiver());
    let inputs = input_queues.map(|queue| queue.sender());
    if spawner.spawn(network_simulator_task(outputs, inputs, 0x5EED)).is_err() {
        log!(log::Level::Error, "Failed to spawn network simulator");
        return;
    }

    loop {
        let (report, node_index) = select_array(gossip_managers.each_ref().map(|manager| manager.receive_report())).await;
        match report {
            Ok(matrix) => log!(log::Level::Info, "Report of node {}:\n{}", node_index, matrix),
            Err(error) => log!(log::Level::Error, "Node {} has no report: {:?}", node_index, error),
        }
    }
}
