//! # Radio Packet Module
//!
//! Low-level frame container for the radio queues.
//!
//! ## Architecture
//!
//! RadioPacket represents one broadcast frame as handed to or received from
//! the radio layer:
//! - Raw data buffer of fixed size (RADIO_PACKET_SIZE)
//! - Actual data length
//!
//! The buffer is sized for the BLE legacy advertising data budget, so both
//! frame kinds fit:
//! - Structured advertisement: ADVERTISEMENT_SIZE bytes
//! - Liveness probe: the ASCII marker
//!
//! ## Design Considerations
//!
//! - **Public Fields**: `data` and `length` are public so radio backends can
//!   fill the buffer in place
//! - **Fixed Size**: no allocation, predictable queue memory

use super::advertisement::encode_advertisement;
use crate::connectivity_matrix::NeighborReport;
use crate::{DeviceId, LIVENESS_PROBE_MARKER, RADIO_PACKET_SIZE};

/// Error returned when raw bytes cannot be carried by a [`RadioPacket`]
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum PacketError {
    /// More bytes than RADIO_PACKET_SIZE
    PayloadTooLarge,
}

#[cfg(feature = "std")]
impl core::fmt::Display for PacketError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PacketError::PayloadTooLarge => write!(f, "payload exceeds {} bytes", RADIO_PACKET_SIZE),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for PacketError {}

/// Broadcast frame of at most RADIO_PACKET_SIZE bytes
///
/// # Example
/// ```rust
/// use rssi_gossip_lib::{NeighborReport, RadioPacket};
///
/// let mut report = NeighborReport::new();
/// report.set(5, -67);
/// let packet = RadioPacket::advertisement_with(2, &report);
/// assert_eq!(packet.sender_device_id(), Some(2));
/// assert_eq!(packet.payload().len(), 21);
/// ```
#[derive(Clone, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct RadioPacket {
    /// Raw frame buffer of fixed size
    pub data: [u8; RADIO_PACKET_SIZE],

    /// Actual number of valid bytes in the data buffer
    pub length: usize,
}

impl RadioPacket {
    /// Copies `bytes` into a new packet
    ///
    /// # Errors
    /// `PacketError::PayloadTooLarge` if `bytes` does not fit the buffer.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PacketError> {
        if bytes.len() > RADIO_PACKET_SIZE {
            return Err(PacketError::PayloadTooLarge);
        }
        let mut data = [0u8; RADIO_PACKET_SIZE];
        data[..bytes.len()].copy_from_slice(bytes);
        Ok(RadioPacket { data, length: bytes.len() })
    }

    /// Builds the structured advertisement for `own_device_id`
    pub fn advertisement_with(own_device_id: DeviceId, report: &NeighborReport) -> Self {
        let encoded = encode_advertisement(own_device_id, report);
        let mut data = [0u8; RADIO_PACKET_SIZE];
        data[..encoded.len()].copy_from_slice(&encoded);
        RadioPacket {
            data,
            length: encoded.len(),
        }
    }

    /// Builds the liveness probe frame (marker only, no matrix data)
    pub fn liveness_probe() -> Self {
        let mut data = [0u8; RADIO_PACKET_SIZE];
        data[..LIVENESS_PROBE_MARKER.len()].copy_from_slice(LIVENESS_PROBE_MARKER);
        RadioPacket {
            data,
            length: LIVENESS_PROBE_MARKER.len(),
        }
    }

    /// Valid bytes of the frame
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.length.min(RADIO_PACKET_SIZE)]
    }

    /// Header byte of the frame, `None` for an empty frame
    ///
    /// Only meaningful for structured advertisements; a liveness probe starts
    /// with the first marker character.
    pub fn sender_device_id(&self) -> Option<DeviceId> {
        self.payload().first().copied()
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::ADVERTISEMENT_SIZE;

    #[test]
    fn from_bytes_copies_payload() {
        let packet = RadioPacket::from_bytes(&[3, 1, 0xC0]).unwrap();
        assert_eq!(packet.length, 3);
        assert_eq!(packet.payload(), &[3, 1, 0xC0]);
        assert_eq!(packet.sender_device_id(), Some(3));
    }

    #[test]
    fn from_bytes_rejects_oversized_payload() {
        let bytes = [0u8; RADIO_PACKET_SIZE + 1];
        assert_eq!(RadioPacket::from_bytes(&bytes), Err(PacketError::PayloadTooLarge));
        assert!(RadioPacket::from_bytes(&bytes[..RADIO_PACKET_SIZE]).is_ok());
    }

    #[test]
    fn empty_packet_has_no_sender() {
        let packet = RadioPacket::from_bytes(&[]).unwrap();
        assert_eq!(packet.sender_device_id(), None);
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn advertisement_has_fixed_length_even_when_empty() {
        let packet = RadioPacket::advertisement_with(4, &NeighborReport::new());
        assert_eq!(packet.length, ADVERTISEMENT_SIZE);
        assert_eq!(packet.payload()[0], 4);
        assert!(packet.payload()[1..].iter().all(|&b| b == 0));
    }

    #[test]
    fn liveness_probe_carries_marker() {
        let packet = RadioPacket::liveness_probe();
        assert_eq!(packet.payload(), LIVENESS_PROBE_MARKER);
    }
}
