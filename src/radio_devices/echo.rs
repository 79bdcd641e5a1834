//! # Echo Radio Device
//!
//! Loopback device for single-node testing. The last broadcast frame is
//! handed back to the receive queue as if it had been heard over the air with
//! a strong signal. Delivery happens when the next scan starts, because a
//! radio only hears what arrives while it is listening.
//!
//! With structured advertising the echoed frame is rejected by the
//! self-origination filter, which makes the echo device a quick smoke test of
//! that path. In liveness-probe mode the node hears its own probe.

use crate::MAX_NODE_COUNT;
use crate::RxPacketQueueSender;
use crate::{DeviceId, MESH_SERVICE_UUID, RadioCommand, RadioCommandQueueReceiver, RadioPacket, ReceivedPacket, RssiSample};
use log::{Level, log};

/// RSSI reported for echoed frames
const ECHO_RSSI: RssiSample = -40;

/// Echo radio device task - loops broadcasts back for testing
///
/// # Arguments
/// * `radio_device` - RadioDevice instance holding the pending echo
/// * `command_receiver` - channel receiver for commands from the gossip cycle
/// * `rx_sender` - channel sender for echoed frames
/// * `own_device_id` - this node's id, used for logging
///
/// # Task Pool
/// Uses a pool of MAX_NODE_COUNT, though typically only one instance is used
/// for single-node testing.
///
/// # Behavior
/// - Broadcast: remembers the frame, replacing an earlier undelivered one
/// - StartScan: delivers the remembered frame with ECHO_RSSI and the mesh UUID
/// - StopScan: no effect
/// - Drops the echo if the RX queue is full (logs a warning)
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn radio_device_task(
    mut radio_device: RadioDevice,
    command_receiver: RadioCommandQueueReceiver,
    rx_sender: RxPacketQueueSender,
    own_device_id: DeviceId,
) -> ! {
    log!(Level::Info, "[{}] Echo radio device task started", own_device_id);
    loop {
        let command = command_receiver.receive().await;
        radio_device.handle_command(command, &rx_sender, own_device_id);
    }
}

/// Loopback radio
///
/// # Example
/// ```rust,ignore
/// let radio_device = RadioDevice::new();
/// // Ready to use immediately, no configuration needed
/// ```
#[cfg_attr(feature = "std", derive(Debug))]
pub struct RadioDevice {
    pending_echo: Option<RadioPacket>,
}

impl Default for RadioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioDevice {
    pub const fn new() -> Self {
        RadioDevice { pending_echo: None }
    }

    fn handle_command(&mut self, command: RadioCommand, rx_sender: &RxPacketQueueSender, own_device_id: DeviceId) {
        match command {
            RadioCommand::Broadcast(packet) => {
                log::trace!("[{}] Holding frame of {} bytes for echo", own_device_id, packet.length);
                self.pending_echo = Some(packet);
            }
            RadioCommand::StartScan { duration_ms } => {
                log::trace!("[{}] Scan started, duration: {} ms", own_device_id, duration_ms);
                let Some(packet) = self.pending_echo.take() else {
                    return;
                };
                let received_packet = ReceivedPacket {
                    packet,
                    rssi: ECHO_RSSI,
                    service_uuid: Some(MESH_SERVICE_UUID),
                };
                if rx_sender.try_send(received_packet).is_err() {
                    log!(Level::Warn, "[{}] RX queue full, dropping echoed frame", own_device_id);
                }
            }
            RadioCommand::StopScan => {
                log::trace!("[{}] Scan stopped", own_device_id);
            }
        }
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::RxPacketQueue;

    #[test]
    fn broadcast_is_echoed_when_scan_starts() {
        let rx_queue: &'static RxPacketQueue = Box::leak(Box::new(RxPacketQueue::new()));
        let mut device = RadioDevice::new();

        device.handle_command(RadioCommand::Broadcast(RadioPacket::liveness_probe()), &rx_queue.sender(), 0);
        assert!(rx_queue.try_receive().is_err());

        device.handle_command(RadioCommand::StartScan { duration_ms: 100 }, &rx_queue.sender(), 0);

        let received = rx_queue.try_receive().unwrap();
        assert_eq!(received.packet, RadioPacket::liveness_probe());
        assert_eq!(received.rssi, ECHO_RSSI);
        assert_eq!(received.service_uuid, Some(MESH_SERVICE_UUID));
    }

    #[test]
    fn echo_is_delivered_once() {
        let rx_queue: &'static RxPacketQueue = Box::leak(Box::new(RxPacketQueue::new()));
        let mut device = RadioDevice::new();

        device.handle_command(RadioCommand::Broadcast(RadioPacket::liveness_probe()), &rx_queue.sender(), 0);
        device.handle_command(RadioCommand::StartScan { duration_ms: 0 }, &rx_queue.sender(), 0);
        device.handle_command(RadioCommand::StopScan, &rx_queue.sender(), 0);
        device.handle_command(RadioCommand::StartScan { duration_ms: 0 }, &rx_queue.sender(), 0);

        assert!(rx_queue.try_receive().is_ok());
        assert!(rx_queue.try_receive().is_err());
    }

    #[test]
    fn scan_without_broadcast_produces_no_frames() {
        let rx_queue: &'static RxPacketQueue = Box::leak(Box::new(RxPacketQueue::new()));
        let mut device = RadioDevice::new();

        device.handle_command(RadioCommand::StartScan { duration_ms: 0 }, &rx_queue.sender(), 0);
        device.handle_command(RadioCommand::StopScan, &rx_queue.sender(), 0);

        assert!(rx_queue.try_receive().is_err());
    }
}
