#![cfg_attr(not(feature = "std"), no_std)]

//! # RSSI Gossip Library
//!
//! Neighbor discovery for a small mesh of broadcast radio nodes. Every node
//! repeatedly advertises its own id together with the RSSI it measured toward
//! its neighbors, listens for the same advertisements from peers, and merges
//! them into a local connectivity matrix. There is no coordinator.
//!
//! ## Architecture
//!
//! ```text
//!  application ──receive_report()──┐
//!                                  │ report queue
//!  ┌───────────────────────────────┴──┐
//!  │ gossip_cycle_task (GossipNode)   │  prepare → advertise → scan → report → idle
//!  └───────┬─────────────────▲────────┘
//!          │ radio commands  │ received packets
//!  ┌───────▼─────────────────┴────────┐
//!  │ radio_device_task (echo/sim)     │
//!  └──────────────────────────────────┘
//! ```
//!
//! The radio backend is selected with a cargo feature (`radio-device-echo` or
//! `radio-device-simulator`), the target with `std` or `embedded`.

#[cfg(all(feature = "radio-device-echo", feature = "radio-device-simulator"))]
compile_error!("Only one radio implementation feature can be enabled at a time");

#[cfg(all(not(test), not(any(feature = "radio-device-echo", feature = "radio-device-simulator"))))]
compile_error!("At least one radio implementation feature must be enabled");

#[cfg(all(feature = "std", feature = "embedded"))]
compile_error!("Features \"std\" and \"embedded\" are mutually exclusive");

pub mod connectivity_matrix;
mod gossip_cycle;
mod gossip_node;
pub mod messages;
pub mod radio_devices;
pub mod report;

#[cfg(any(feature = "radio-device-echo", feature = "radio-device-simulator"))]
use crate::radio_devices::{RadioDevice, radio_device_task};

#[cfg(any(feature = "radio-device-echo", feature = "radio-device-simulator"))]
use crate::gossip_cycle::gossip_cycle_task;
#[cfg(any(feature = "radio-device-echo", feature = "radio-device-simulator"))]
use embassy_executor::Spawner;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
#[cfg(feature = "embedded")]
use embassy_sync::channel::Channel;
use log::log;

pub use connectivity_matrix::{ConnectivityMatrix, NeighborReport, Observation};
pub use gossip_node::{GossipNode, ReceiveError, ReceiveOutcome};
pub use messages::{DecodeError, InboundPayload, PacketError, RadioPacket};
pub use report::log_connectivity_report;

/// Small provisioned node identifier in `0..MAX_DEVICES`
pub type DeviceId = u8;

/// Received signal strength in dBm
pub type RssiSample = i8;

//Protocol constants, changing them breaks compatibility between nodes
pub const MAX_DEVICES: usize = 10;
pub const ADVERTISEMENT_SIZE: usize = 1 + 2 * MAX_DEVICES;
pub const LIVENESS_PROBE_MARKER: &[u8; 30] = b"Hello, this is a test message!";
pub const MESH_SERVICE_UUID: u128 = 0x0000ABCD_0000_1000_8000_00805F9B34FB;

//Link layer budget (BLE legacy advertising data)
pub const RADIO_PACKET_SIZE: usize = 31;

const _: () = assert!(ADVERTISEMENT_SIZE <= RADIO_PACKET_SIZE, "advertisement does not fit a single radio packet");
const _: () = assert!(LIVENESS_PROBE_MARKER.len() <= RADIO_PACKET_SIZE, "liveness probe does not fit a single radio packet");
const _: () = assert!(MAX_DEVICES <= u8::MAX as usize, "device ids must fit in one byte");

#[cfg(feature = "radio-device-simulator")]
const MAX_NODE_COUNT: usize = 16;

#[cfg(not(feature = "radio-device-simulator"))]
const MAX_NODE_COUNT: usize = 1;

/// Payload broadcast in the advertise step
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum AdvertiseMode {
    /// Own id plus the local neighbor report
    Structured,
    /// Fixed ASCII marker, for link testing only
    LivenessProbe,
}

/// Configuration of the gossip cycle
///
/// One structure covers the behaviours the node can run with: sticky
/// accumulation vs per-round refresh, bounded vs continuous scanning, and
/// structured vs liveness-probe advertising.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct GossipConfiguration {
    /// Clear the whole matrix at the start of every round
    pub reset_per_round: bool,
    /// Length of the scan window in milliseconds, 0 scans until `GossipManager::stop_scan`
    pub scan_duration_ms: u32,
    pub advertise_mode: AdvertiseMode,
    /// Delay in milliseconds between the report and the next round
    pub idle_interval_ms: u32,
}

impl Default for GossipConfiguration {
    fn default() -> Self {
        GossipConfiguration {
            reset_per_round: true,
            scan_duration_ms: 5000,
            advertise_mode: AdvertiseMode::Structured,
            idle_interval_ms: 1000,
        }
    }
}

/// Requests from the gossip cycle to the radio layer
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum RadioCommand {
    /// Fire-and-forget broadcast of a frame tagged with MESH_SERVICE_UUID
    Broadcast(RadioPacket),
    /// Start listening; 0 means until StopScan
    StartScan { duration_ms: u32 },
    StopScan,
}

/// A frame delivered by the radio layer
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ReceivedPacket {
    pub packet: RadioPacket,
    /// Physical RSSI the radio measured for this reception
    pub rssi: RssiSample,
    /// Service UUID advertised by the frame, if any
    pub service_uuid: Option<u128>,
}

const RADIO_COMMAND_QUEUE_SIZE: usize = 4;
type RadioCommandQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, RadioCommand, RADIO_COMMAND_QUEUE_SIZE>;
type RadioCommandQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, RadioCommand, RADIO_COMMAND_QUEUE_SIZE>;
type RadioCommandQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, RadioCommand, RADIO_COMMAND_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static RADIO_COMMAND_QUEUE: RadioCommandQueue = Channel::new();

const RX_PACKET_QUEUE_SIZE: usize = 16;
type RxPacketQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, ReceivedPacket, RX_PACKET_QUEUE_SIZE>;
type RxPacketQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, ReceivedPacket, RX_PACKET_QUEUE_SIZE>;
type RxPacketQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, ReceivedPacket, RX_PACKET_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static RX_PACKET_QUEUE: RxPacketQueue = Channel::new();

const REPORT_QUEUE_SIZE: usize = 2;
type ReportQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, ConnectivityMatrix, REPORT_QUEUE_SIZE>;
type ReportQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, ConnectivityMatrix, REPORT_QUEUE_SIZE>;
type ReportQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, ConnectivityMatrix, REPORT_QUEUE_SIZE>;

#[cfg(feature = "embedded")]
static REPORT_QUEUE: ReportQueue = Channel::new();

type ScanStopSignal = embassy_sync::signal::Signal<CriticalSectionRawMutex, ()>;

#[cfg(feature = "embedded")]
static SCAN_STOP_SIGNAL: ScanStopSignal = embassy_sync::signal::Signal::new();

/// Errors of [`GossipManager::initialize`]
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum GossipInitError {
    /// The provisioned id is not below MAX_DEVICES
    DeviceIdOutOfRange,
    /// The executor has no room left for the radio or gossip task
    TaskSpawnFailed,
}

#[cfg(feature = "std")]
impl core::fmt::Display for GossipInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            GossipInitError::DeviceIdOutOfRange => write!(f, "device id must be below {}", MAX_DEVICES),
            GossipInitError::TaskSpawnFailed => write!(f, "failed to spawn task"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for GossipInitError {}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ReceiveReportError {
    NotInited,
}

#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum StopScanError {
    NotInited,
}

/// Range-checks a provisioned identity
///
/// # Example
/// ```rust
/// use rssi_gossip_lib::{checked_device_id, GossipInitError};
///
/// assert_eq!(checked_device_id(3), Ok(3));
/// assert_eq!(checked_device_id(10), Err(GossipInitError::DeviceIdOutOfRange));
/// ```
pub fn checked_device_id(raw_device_id: u32) -> Result<DeviceId, GossipInitError> {
    if (raw_device_id as usize) < MAX_DEVICES {
        Ok(raw_device_id as DeviceId)
    } else {
        Err(GossipInitError::DeviceIdOutOfRange)
    }
}

enum GossipManagerState {
    Uninitialized,
    Initialized {
        report_queue_receiver: ReportQueueReceiver,
        scan_stop_signal: &'static ScanStopSignal,
    },
}

/// Entry point for applications
///
/// Spawns the radio device task and the gossip cycle task and hands out the
/// connectivity reports produced at the end of every round.
pub struct GossipManager {
    state: GossipManagerState,
}

impl Default for GossipManager {
    fn default() -> Self {
        Self::new()
    }
}

impl GossipManager {
    pub const fn new() -> Self {
        GossipManager {
            state: GossipManagerState::Uninitialized,
        }
    }

    /// Range-checks the identity and spawns the radio device and gossip cycle tasks
    ///
    /// # Arguments
    /// * `configuration` - reset policy, scan window, advertise mode and idle interval
    /// * `spawner` - executor spawner used for both tasks
    /// * `radio_device` - backend selected by the `radio-device-*` feature
    /// * `own_device_id` - provisioned identity, must be below MAX_DEVICES
    ///
    /// # Errors
    /// * `GossipInitError::DeviceIdOutOfRange` - nothing is spawned
    /// * `GossipInitError::TaskSpawnFailed` - the task pool is exhausted
    ///
    /// # Queues
    /// Under `embedded` the queues are statics, so a device can be initialized
    /// once. Under `std` every call leaks a fresh set, which lets the simulator
    /// run several nodes in one process.
    #[cfg(all(feature = "embedded", any(feature = "radio-device-echo", feature = "radio-device-simulator")))]
    pub fn initialize(
        &mut self,
        configuration: GossipConfiguration,
        spawner: Spawner,
        radio_device: RadioDevice,
        own_device_id: u32,
    ) -> Result<(), GossipInitError> {
        self.initialize_common(
            configuration,
            spawner,
            radio_device,
            own_device_id,
            &RADIO_COMMAND_QUEUE,
            &RX_PACKET_QUEUE,
            &REPORT_QUEUE,
            &SCAN_STOP_SIGNAL,
        )
    }

    /// Range-checks the identity and spawns the radio device and gossip cycle tasks
    ///
    /// # Arguments
    /// * `configuration` - reset policy, scan window, advertise mode and idle interval
    /// * `spawner` - executor spawner used for both tasks
    /// * `radio_device` - backend selected by the `radio-device-*` feature
    /// * `own_device_id` - provisioned identity, must be below MAX_DEVICES
    ///
    /// # Errors
    /// * `GossipInitError::DeviceIdOutOfRange` - nothing is spawned
    /// * `GossipInitError::TaskSpawnFailed` - the task pool is exhausted
    ///
    /// # Queues
    /// Under `embedded` the queues are statics, so a device can be initialized
    /// once. Under `std` every call leaks a fresh set, which lets the simulator
    /// run several nodes in one process.
    #[cfg(all(feature = "std", any(feature = "radio-device-echo", feature = "radio-device-simulator")))]
    pub fn initialize(
        &mut self,
        configuration: GossipConfiguration,
        spawner: Spawner,
        radio_device: RadioDevice,
        own_device_id: u32,
    ) -> Result<(), GossipInitError> {
        let radio_command_queue_static: &'static RadioCommandQueue = Box::leak(Box::new(RadioCommandQueue::new()));
        let rx_packet_queue_static: &'static RxPacketQueue = Box::leak(Box::new(RxPacketQueue::new()));
        let report_queue_static: &'static ReportQueue = Box::leak(Box::new(ReportQueue::new()));
        let scan_stop_signal_static: &'static ScanStopSignal = Box::leak(Box::new(ScanStopSignal::new()));

        self.initialize_common(
            configuration,
            spawner,
            radio_device,
            own_device_id,
            radio_command_queue_static,
            rx_packet_queue_static,
            report_queue_static,
            scan_stop_signal_static,
        )
    }

    #[cfg(any(feature = "radio-device-echo", feature = "radio-device-simulator"))]
    #[allow(clippy::too_many_arguments)]
    fn initialize_common(
        &mut self,
        configuration: GossipConfiguration,
        spawner: Spawner,
        radio_device: RadioDevice,
        own_device_id: u32,
        radio_command_queue: &'static RadioCommandQueue,
        rx_packet_queue: &'static RxPacketQueue,
        report_queue: &'static ReportQueue,
        scan_stop_signal: &'static ScanStopSignal,
    ) -> Result<(), GossipInitError> {
        let own_device_id = checked_device_id(own_device_id).inspect_err(|_| {
            log!(log::Level::Error, "Provisioned device id {} is out of range", own_device_id);
        })?;

        spawner
            .spawn(radio_device_task(
                radio_device,
                radio_command_queue.receiver(),
                rx_packet_queue.sender(),
                own_device_id,
            ))
            .map_err(|_| GossipInitError::TaskSpawnFailed)?;
        log!(log::Level::Debug, "[{}] Radio device task spawned", own_device_id);

        spawner
            .spawn(gossip_cycle_task(
                GossipNode::with(own_device_id, configuration),
                radio_command_queue.sender(),
                rx_packet_queue.receiver(),
                report_queue.sender(),
                scan_stop_signal,
            ))
            .map_err(|_| GossipInitError::TaskSpawnFailed)?;
        log!(log::Level::Debug, "[{}] Gossip cycle task spawned", own_device_id);

        log!(log::Level::Info, "=====================================");
        log!(log::Level::Info, "       RSSI gossip mesh node");
        log!(log::Level::Info, "       Device ID: {}", own_device_id);
        log!(log::Level::Info, "=====================================");

        self.state = GossipManagerState::Initialized {
            report_queue_receiver: report_queue.receiver(),
            scan_stop_signal,
        };
        Ok(())
    }

    /// Waits for the connectivity matrix produced by the next finished round
    pub async fn receive_report(&self) -> Result<ConnectivityMatrix, ReceiveReportError> {
        let report_queue_receiver = match &self.state {
            GossipManagerState::Uninitialized => {
                return Err(ReceiveReportError::NotInited);
            }
            GossipManagerState::Initialized { report_queue_receiver, .. } => report_queue_receiver,
        };
        Ok(report_queue_receiver.receive().await)
    }

    /// Ends the current scan window early
    ///
    /// Required to leave a continuous scan (`scan_duration_ms == 0`). A stop
    /// requested while no scan is active ends the next scan immediately.
    pub fn stop_scan(&self) -> Result<(), StopScanError> {
        match &self.state {
            GossipManagerState::Uninitialized => Err(StopScanError::NotInited),
            GossipManagerState::Initialized { scan_stop_signal, .. } => {
                scan_stop_signal.signal(());
                Ok(())
            }
        }
    }
}
