//! # Simulated Radio Device
//!
//! Radio device for multi-node testing without hardware. Each simulated radio
//! is connected to a network simulator through two queues:
//!
//! - **Output queue**: broadcasts and scan state changes of this node
//! - **Input queue**: frames the simulator decided this node can hear,
//!   already tagged with the RSSI of the simulated link
//!
//! The simulator owns the topology. The radio only models the receiver being
//! switched on and off: frames arriving outside a scan window are dropped, as
//! a real radio would never have heard them.

use crate::MAX_NODE_COUNT;
use crate::RadioPacket;
use crate::ReceivedPacket;
use crate::RxPacketQueueSender;
use crate::{DeviceId, RadioCommand, RadioCommandQueueReceiver};
use embassy_futures::select::{Either, select};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use log::{Level, log};

const RADIO_OUTPUT_QUEUE_SIZE: usize = 10;

pub type RadioOutputQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RadioOutputMessage, RADIO_OUTPUT_QUEUE_SIZE>;
pub type RadioOutputQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RadioOutputMessage, RADIO_OUTPUT_QUEUE_SIZE>;
pub type RadioOutputQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RadioOutputMessage, RADIO_OUTPUT_QUEUE_SIZE>;

const RADIO_INPUT_QUEUE_SIZE: usize = 10;

pub type RadioInputQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RadioInputMessage, RADIO_INPUT_QUEUE_SIZE>;
pub type RadioInputQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RadioInputMessage, RADIO_INPUT_QUEUE_SIZE>;
pub type RadioInputQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RadioInputMessage, RADIO_INPUT_QUEUE_SIZE>;

/// Messages sent from a simulated radio to the network simulator
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioOutputMessage {
    /// Frame to deliver to every node in range
    Broadcast(RadioPacket),
    /// Receiver switched on, 0 means until ScanStopped
    ScanStarted { duration_ms: u32 },
    ScanStopped,
}

/// Messages sent from the network simulator to a simulated radio
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioInputMessage {
    /// A frame heard from another node, with the simulated link RSSI
    ReceivePacket(ReceivedPacket),
}

/// Simulated radio device task - bridges the gossip cycle and the network simulator
///
/// # Arguments
/// * `radio_device` - RadioDevice instance with the simulator queue endpoints
/// * `command_receiver` - channel receiver for commands from the gossip cycle
/// * `rx_sender` - channel sender for frames heard during a scan
/// * `own_device_id` - this node's id, used for logging
///
/// # Task Pool
/// Pool size is MAX_NODE_COUNT so several simulated nodes can share one executor.
///
/// # Behavior
/// - Races the simulator input queue against the command queue
/// - Commands are forwarded to the simulator and toggle the receiver state
/// - Heard frames reach the RX queue only while scanning, otherwise they are dropped
/// - A full RX queue drops the frame with a warning
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn radio_device_task(
    mut radio_device: RadioDevice,
    command_receiver: RadioCommandQueueReceiver,
    rx_sender: RxPacketQueueSender,
    own_device_id: DeviceId,
) -> ! {
    log!(Level::Info, "[{}] Simulated radio device task started", own_device_id);
    loop {
        match select(radio_device.input_queue_receiver.receive(), command_receiver.receive()).await {
            Either::First(message) => radio_device.handle_input(message, &rx_sender, own_device_id),
            Either::Second(command) => radio_device.handle_command(command, own_device_id).await,
        }
    }
}

/// Simulated radio connected to a network simulator
#[cfg_attr(feature = "std", derive(Debug))]
pub struct RadioDevice {
    output_queue_sender: RadioOutputQueueSender,
    input_queue_receiver: RadioInputQueueReceiver,
    scanning: bool,
}

impl RadioDevice {
    /// Creates a simulated radio from the simulator's queue endpoints
    ///
    /// # Example
    /// ```rust,ignore
    /// use embassy_sync::channel::Channel;
    /// use rssi_gossip_lib::radio_devices::simulator::*;
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
            scanning: false,
        }
    }

    async fn handle_command(&mut self, command: RadioCommand, own_device_id: DeviceId) {
        let message = match command {
            RadioCommand::Broadcast(packet) => {
                log!(Level::Trace, "[{}] Broadcasting frame of {} bytes", own_device_id, packet.length);
                RadioOutputMessage::Broadcast(packet)
            }
            RadioCommand::StartScan { duration_ms } => {
                self.scanning = true;
                RadioOutputMessage::ScanStarted { duration_ms }
            }
            RadioCommand::StopScan => {
                self.scanning = false;
                RadioOutputMessage::ScanStopped
            }
        };
        self.output_queue_sender.send(message).await;
    }

    fn handle_input(&mut self, message: RadioInputMessage, rx_sender: &RxPacketQueueSender, own_device_id: DeviceId) {
        match message {
            RadioInputMessage::ReceivePacket(received_packet) => {
                if !self.scanning {
                    log!(Level::Trace, "[{}] Not scanning, frame dropped", own_device_id);
                    return;
                }
                log!(Level::Trace, "[{}] Received frame, rssi: {} dBm", own_device_id, received_packet.rssi);
                if rx_sender.try_send(received_packet).is_err() {
                    log!(Level::Warn, "[{}] RX queue full, dropping received frame", own_device_id);
                }
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::{MESH_SERVICE_UUID, RxPacketQueue};
    use futures::executor::block_on;

    fn leaked_device() -> (RadioDevice, &'static RadioOutputQueue, &'static RadioInputQueue) {
        let output_queue: &'static RadioOutputQueue = Box::leak(Box::new(RadioOutputQueue::new()));
        let input_queue: &'static RadioInputQueue = Box::leak(Box::new(RadioInputQueue::new()));
        (RadioDevice::with(output_queue.sender(), input_queue.receiver()), output_queue, input_queue)
    }

    fn heard_frame() -> RadioInputMessage {
        RadioInputMessage::ReceivePacket(ReceivedPacket {
            packet: RadioPacket::from_bytes(&[4, 1, 0xC0]).unwrap(),
            rssi: -70,
            service_uuid: Some(MESH_SERVICE_UUID),
        })
    }

    #[test]
    fn commands_are_forwarded_to_the_simulator() {
        let (mut device, output_queue, _) = leaked_device();

        block_on(async {
            device.handle_command(RadioCommand::Broadcast(RadioPacket::liveness_probe()), 1).await;
            device.handle_command(RadioCommand::StartScan { duration_ms: 250 }, 1).await;
            device.handle_command(RadioCommand::StopScan, 1).await;
        });

        assert_eq!(output_queue.try_receive().unwrap(), RadioOutputMessage::Broadcast(RadioPacket::liveness_probe()));
        assert_eq!(output_queue.try_receive().unwrap(), RadioOutputMessage::ScanStarted { duration_ms: 250 });
        assert_eq!(output_queue.try_receive().unwrap(), RadioOutputMessage::ScanStopped);
    }

    #[test]
    fn frames_are_delivered_only_while_scanning() {
        let (mut device, _, _) = leaked_device();
        let rx_queue: &'static RxPacketQueue = Box::leak(Box::new(RxPacketQueue::new()));

        device.handle_input(heard_frame(), &rx_queue.sender(), 1);
        assert!(rx_queue.try_receive().is_err());

        block_on(device.handle_command(RadioCommand::StartScan { duration_ms: 0 }, 1));
        device.handle_input(heard_frame(), &rx_queue.sender(), 1);
        assert_eq!(rx_queue.try_receive().unwrap().rssi, -70);

        block_on(device.handle_command(RadioCommand::StopScan, 1));
        device.handle_input(heard_frame(), &rx_queue.sender(), 1);
        assert!(rx_queue.try_receive().is_err());
    }
}
