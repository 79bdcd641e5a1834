//! # Gossip Node
//!
//! Per-node protocol state: the connectivity matrix, the configuration and the
//! row selected for the next advertisement. The node is driven by the gossip
//! cycle task but has no async code itself, so every protocol rule can be
//! exercised directly in tests.

use log::{Level, log};

use crate::connectivity_matrix::{ConnectivityMatrix, NeighborReport};
use crate::messages::{DecodeError, InboundPayload, RadioPacket, decode_payload};
use crate::{AdvertiseMode, DeviceId, GossipConfiguration, MESH_SERVICE_UUID, ReceivedPacket};

/// Reasons a received frame is not merged into the matrix
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ReceiveError {
    /// The frame does not advertise MESH_SERVICE_UUID
    ForeignService,
    Decode(DecodeError),
}

impl From<DecodeError> for ReceiveError {
    fn from(error: DecodeError) -> Self {
        ReceiveError::Decode(error)
    }
}

#[cfg(feature = "std")]
impl core::fmt::Display for ReceiveError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReceiveError::ForeignService => write!(f, "frame does not carry the mesh service uuid"),
            ReceiveError::Decode(error) => write!(f, "malformed payload: {}", error),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ReceiveError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ReceiveError::ForeignService => None,
            ReceiveError::Decode(error) => Some(error),
        }
    }
}

/// Result of a merged frame
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum ReceiveOutcome {
    /// Structured advertisement from `source`, with `relayed` pairs written
    Merged { source: DeviceId, relayed: usize },
    LivenessProbe,
}

/// Protocol state of one node
///
/// Owns the connectivity matrix exclusively. The gossip cycle task drives it
/// through one round at a time:
/// 1. `prepare_round` selects the row to advertise and applies the reset policy
/// 2. `advertisement_packet` builds the frame for the advertise step
/// 3. `process_received_packet` merges every frame heard during the scan
/// 4. `matrix` is copied out for the report
///
/// # Example
/// ```rust
/// use rssi_gossip_lib::{GossipConfiguration, GossipNode};
///
/// let mut node = GossipNode::with(2, GossipConfiguration::default());
/// node.prepare_round();
/// assert_eq!(node.advertisement_packet().payload()[0], 2);
/// assert!(node.matrix().is_empty());
/// ```
pub struct GossipNode {
    own_device_id: DeviceId,
    configuration: GossipConfiguration,
    matrix: ConnectivityMatrix,
    advertised_row: NeighborReport,
}

impl GossipNode {
    /// Creates a node with an empty matrix
    ///
    /// # Arguments
    /// * `own_device_id` - provisioned id, expected to be range-checked (see `checked_device_id`)
    /// * `configuration` - reset policy, scan window and advertise mode
    pub fn with(own_device_id: DeviceId, configuration: GossipConfiguration) -> Self {
        GossipNode {
            own_device_id,
            configuration,
            matrix: ConnectivityMatrix::new(own_device_id),
            advertised_row: NeighborReport::new(),
        }
    }

    pub fn own_device_id(&self) -> DeviceId {
        self.own_device_id
    }

    pub fn configuration(&self) -> &GossipConfiguration {
        &self.configuration
    }

    pub fn matrix(&self) -> &ConnectivityMatrix {
        &self.matrix
    }

    /// Starts a round
    ///
    /// The local row is captured before the optional reset, so a refreshing
    /// node still advertises what it heard during the previous round.
    pub fn prepare_round(&mut self) {
        self.advertised_row = self.matrix.self_row();
        if self.configuration.reset_per_round {
            self.matrix.reset();
        }
        log!(
            Level::Trace,
            "[{}] Round prepared, advertising {} neighbors",
            self.own_device_id,
            self.advertised_row.len()
        );
    }

    /// Frame to broadcast in the current round
    pub fn advertisement_packet(&self) -> RadioPacket {
        match self.configuration.advertise_mode {
            AdvertiseMode::Structured => RadioPacket::advertisement_with(self.own_device_id, &self.advertised_row),
            AdvertiseMode::LivenessProbe => RadioPacket::liveness_probe(),
        }
    }

    /// Merges one received frame into the matrix
    ///
    /// The physical RSSI becomes the local observation of the sender. Every
    /// pair in the body is stored as a relayed observation, except pairs
    /// naming this node, which would overwrite the local row.
    ///
    /// # Errors
    /// * `ReceiveError::ForeignService` - frame of another service, skipped
    /// * `ReceiveError::Decode` - empty or self-originated payload, skipped
    pub fn process_received_packet(&mut self, received: &ReceivedPacket) -> Result<ReceiveOutcome, ReceiveError> {
        if received.service_uuid != Some(MESH_SERVICE_UUID) {
            return Err(ReceiveError::ForeignService);
        }

        match decode_payload(received.packet.payload(), self.own_device_id)? {
            InboundPayload::LivenessProbe(text) => {
                log!(Level::Info, "[{}] Liveness probe received: \"{}\", rssi: {} dBm", self.own_device_id, text, received.rssi);
                Ok(ReceiveOutcome::LivenessProbe)
            }
            InboundPayload::Advertisement(advertisement) => {
                let source = advertisement.source();
                if advertisement.has_trailing_byte() {
                    log!(Level::Trace, "[{}] Ignoring trailing byte in advertisement from {}", self.own_device_id, source);
                }

                self.matrix.record_local_observation(source, received.rssi);

                let mut relayed = 0;
                for observation in advertisement.observations() {
                    // Not relayed: the local row holds first-hand measurements only
                    // and a peer's claim about this node must not replace them
                    if observation.device_id == self.own_device_id {
                        continue;
                    }
                    self.matrix.record_relayed_observation(source, observation.device_id, observation.rssi);
                    relayed += 1;
                }

                log!(
                    Level::Debug,
                    "[{}] Advertisement from {} merged, rssi: {} dBm, relayed pairs: {}",
                    self.own_device_id,
                    source,
                    received.rssi,
                    relayed
                );
                Ok(ReceiveOutcome::Merged { source, relayed })
            }
        }
    }
}
