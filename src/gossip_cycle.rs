//! # Gossip Cycle
//!
//! The repeating broadcast/listen round of a node:
//!
//! 1. **Prepare**: pick the row to advertise, optionally reset the matrix
//! 2. **Advertise**: broadcast the advertisement (or the liveness probe)
//! 3. **Scan**: merge received frames until the window closes or a stop is signalled
//! 4. **Report**: log the matrix and hand a copy to the application
//! 5. **Idle**: wait before the next round
//!
//! The task owns the [`GossipNode`] exclusively. Received frames are only
//! consumed inside the scan window. Frames still queued when a scan starts
//! were delivered outside any window (before the radio handled the previous
//! StopScan, or by a backend that does not gate on scan state) and are
//! discarded, so data of one round never leaks into the next.

use embassy_futures::select::{Either, Either3, select, select3};
use embassy_time::{Duration, Instant, Timer};
use log::{Level, log};

use crate::gossip_node::{GossipNode, ReceiveError, ReceiveOutcome};
use crate::messages::DecodeError;
use crate::report::log_connectivity_report;
use crate::{MAX_NODE_COUNT, RadioCommand, RadioCommandQueueSender, ReceivedPacket, ReportQueueSender, RxPacketQueueReceiver, ScanStopSignal};

/// Gossip cycle task - runs rounds forever
///
/// # Arguments
/// * `node` - protocol state of this node, moved into the task
/// * `command_sender` - channel sender for commands to the radio device task
/// * `rx_receiver` - channel receiver for frames delivered by the radio device task
/// * `report_sender` - channel sender for the matrix copy produced by every round
/// * `scan_stop_signal` - ends the current (or next) scan window early
///
/// # Task Pool
/// Uses a pool of MAX_NODE_COUNT so the simulator can run several nodes in
/// one executor.
///
/// # Behavior
/// - Runs one round (see `run_round`)
/// - Waits `idle_interval_ms` from the node configuration
/// - Repeats; nothing inside a round can end the loop
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub(crate) async fn gossip_cycle_task(
    mut node: GossipNode,
    command_sender: RadioCommandQueueSender,
    rx_receiver: RxPacketQueueReceiver,
    report_sender: ReportQueueSender,
    scan_stop_signal: &'static ScanStopSignal,
) -> ! {
    log!(Level::Info, "[{}] Gossip cycle task started", node.own_device_id());
    loop {
        run_round(&mut node, &command_sender, &rx_receiver, &report_sender, scan_stop_signal).await;
        Timer::after(Duration::from_millis(node.configuration().idle_interval_ms as u64)).await;
    }
}

/// Counters of one scan window
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub(crate) struct ScanStatistics {
    pub merged: usize,
    pub liveness_probes: usize,
    pub skipped: usize,
}

/// Runs one round up to and including the report step
pub(crate) async fn run_round(
    node: &mut GossipNode,
    command_sender: &RadioCommandQueueSender,
    rx_receiver: &RxPacketQueueReceiver,
    report_sender: &ReportQueueSender,
    scan_stop_signal: &ScanStopSignal,
) -> ScanStatistics {
    let own_device_id = node.own_device_id();

    node.prepare_round();

    if command_sender.try_send(RadioCommand::Broadcast(node.advertisement_packet())).is_err() {
        log!(Level::Warn, "[{}] Radio command queue full, advertisement dropped", own_device_id);
    }

    let stale = discard_stale_frames(rx_receiver);
    if stale > 0 {
        log!(Level::Trace, "[{}] Discarded {} frames received outside the scan window", own_device_id, stale);
    }

    let duration_ms = node.configuration().scan_duration_ms;
    command_sender.send(RadioCommand::StartScan { duration_ms }).await;
    let statistics = scan(node, rx_receiver, scan_stop_signal, duration_ms).await;
    command_sender.send(RadioCommand::StopScan).await;

    log!(
        Level::Debug,
        "[{}] Scan finished, merged: {}, liveness probes: {}, skipped: {}",
        own_device_id,
        statistics.merged,
        statistics.liveness_probes,
        statistics.skipped
    );

    log_connectivity_report(node.matrix());
    if report_sender.try_send(*node.matrix()).is_err() {
        log!(Level::Warn, "[{}] Report queue full, report dropped", own_device_id);
    }

    statistics
}

fn discard_stale_frames(rx_receiver: &RxPacketQueueReceiver) -> usize {
    let mut discarded = 0;
    while rx_receiver.try_receive().is_ok() {
        discarded += 1;
    }
    discarded
}

async fn scan(node: &mut GossipNode, rx_receiver: &RxPacketQueueReceiver, scan_stop_signal: &ScanStopSignal, duration_ms: u32) -> ScanStatistics {
    let mut statistics = ScanStatistics::default();
    let deadline = match duration_ms {
        0 => None,
        _ => Some(Instant::now() + Duration::from_millis(duration_ms as u64)),
    };

    loop {
        let received = match deadline {
            Some(deadline) => {
                if Instant::now() >= deadline {
                    break;
                }
                match select3(rx_receiver.receive(), Timer::at(deadline), scan_stop_signal.wait()).await {
                    Either3::First(received) => received,
                    Either3::Second(_) => break,
                    Either3::Third(_) => {
                        log!(Level::Debug, "[{}] Scan stopped early", node.own_device_id());
                        break;
                    }
                }
            }
            None => match select(rx_receiver.receive(), scan_stop_signal.wait()).await {
                Either::First(received) => received,
                Either::Second(_) => {
                    log!(Level::Debug, "[{}] Continuous scan stopped", node.own_device_id());
                    break;
                }
            },
        };
        handle_received_packet(node, &received, &mut statistics);
    }

    statistics
}

fn handle_received_packet(node: &mut GossipNode, received: &ReceivedPacket, statistics: &mut ScanStatistics) {
    match node.process_received_packet(received) {
        Ok(ReceiveOutcome::Merged { .. }) => statistics.merged += 1,
        Ok(ReceiveOutcome::LivenessProbe) => statistics.liveness_probes += 1,
        Err(ReceiveError::ForeignService) => {
            log!(Level::Trace, "[{}] Skipping frame of another service", node.own_device_id());
            statistics.skipped += 1;
        }
        Err(ReceiveError::Decode(error)) => {
            let reason = match error {
                DecodeError::EmptyPayload => "empty payload",
                DecodeError::SelfOriginated => "self-originated",
            };
            log!(Level::Debug, "[{}] Skipping malformed frame: {}", node.own_device_id(), reason);
            statistics.skipped += 1;
        }
    }
}
