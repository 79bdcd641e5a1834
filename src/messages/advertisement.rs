//! # Advertisement Codec
//!
//! Pure, side-effect free conversion between a [`NeighborReport`] and the
//! broadcast payload.
//!
//! ## Wire Format
//!
//! ```text
//! byte 0:          sender device id (0..MAX_DEVICES-1)
//! bytes 1+2i, 2+2i: (i, rssi as signed byte) for slot i in 0..MAX_DEVICES
//! ```
//!
//! Total length is fixed at ADVERTISEMENT_SIZE (1 + 2 * MAX_DEVICES) bytes no
//! matter how many neighbors are known, which keeps every advertisement inside
//! a single link-layer frame. Slots of unobserved devices stay `(0, 0)`.
//!
//! ## Sentinel Ambiguity
//!
//! Because empty slots are zero-filled, a real observation of device 0 at
//! 0 dBm is encoded as `(0, 0)` and cannot be told apart from an empty slot.
//! The decoder treats every `(0, 0)` pair as empty. Any other pair, including
//! `(i, 0)` for `i != 0`, is a real observation.
//!
//! ## Liveness Probes
//!
//! A frame may instead carry the fixed ASCII marker used for liveness probing.
//! The marker is checked before structured parsing and such frames are never
//! parsed as matrix data.

use crate::connectivity_matrix::{NeighborReport, Observation};
use crate::{ADVERTISEMENT_SIZE, DeviceId, LIVENESS_PROBE_MARKER};

/// Reasons an inbound payload is discarded
///
/// Both are local and recoverable: the packet is skipped and the gossip
/// round continues.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum DecodeError {
    /// Zero-length payload
    EmptyPayload,

    /// Header byte equals the receiving node's own id (echoed advertisement)
    SelfOriginated,
}

#[cfg(feature = "std")]
impl core::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DecodeError::EmptyPayload => write!(f, "payload is empty"),
            DecodeError::SelfOriginated => write!(f, "payload was sent by this node"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for DecodeError {}

/// Successfully decoded inbound payload
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum InboundPayload<'a> {
    /// Liveness probe, carries no matrix data, only its text
    LivenessProbe(&'a str),

    /// Structured neighbor report from a peer
    Advertisement(Advertisement<'a>),
}

/// A structured advertisement borrowed from the inbound buffer
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct Advertisement<'a> {
    source: DeviceId,
    body: &'a [u8],
}

impl<'a> Advertisement<'a> {
    /// Device id announced in the header byte
    pub fn source(&self) -> DeviceId {
        self.source
    }

    /// Iterates the `(device, rssi)` pairs carried in the body
    pub fn observations(&self) -> ObservationIterator<'a> {
        ObservationIterator::with(self.body)
    }

    /// True if the body ends with an unpaired byte, which is ignored
    pub fn has_trailing_byte(&self) -> bool {
        self.body.len() % 2 == 1
    }
}

/// Iterator over the byte pairs of an advertisement body
///
/// Each entry is 2 bytes: device id + RSSI as a signed byte. Stops when fewer
/// than 2 bytes remain and skips `(0, 0)` empty slots.
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ObservationIterator<'a> {
    body: &'a [u8],
    position: usize,
}

impl<'a> ObservationIterator<'a> {
    pub(crate) fn with(body: &'a [u8]) -> Self {
        Self { body, position: 0 }
    }
}

impl<'a> Iterator for ObservationIterator<'a> {
    type Item = Observation;

    fn next(&mut self) -> Option<Self::Item> {
        while self.position + 2 <= self.body.len() {
            let device_id = self.body[self.position];
            let rssi_byte = self.body[self.position + 1];
            self.position += 2;

            if device_id == 0 && rssi_byte == 0 {
                continue;
            }

            return Some(Observation {
                device_id,
                rssi: rssi_byte as i8,
            });
        }
        None
    }
}

/// Encodes the local neighbor report into the fixed-size wire payload
///
/// # Arguments
/// * `own_device_id` - written to the header byte
/// * `report` - local observations; device `i` goes to slot `i`
pub fn encode_advertisement(own_device_id: DeviceId, report: &NeighborReport) -> [u8; ADVERTISEMENT_SIZE] {
    let mut payload = [0u8; ADVERTISEMENT_SIZE];
    payload[0] = own_device_id;

    for observation in report.iter() {
        let slot = 1 + 2 * observation.device_id as usize;
        // NeighborReport only holds ids below MAX_DEVICES, so the slot always fits
        if slot + 1 < ADVERTISEMENT_SIZE {
            payload[slot] = observation.device_id;
            payload[slot + 1] = observation.rssi as u8;
        }
    }

    payload
}

/// Decodes an inbound payload
///
/// # Arguments
/// * `payload` - raw bytes delivered by the radio layer
/// * `own_device_id` - the receiving node, used to reject echoed frames
///
/// # Errors
/// * `DecodeError::EmptyPayload` - zero-length payload
/// * `DecodeError::SelfOriginated` - header byte equals `own_device_id`
///
/// # Example
/// ```rust
/// use rssi_gossip_lib::messages::{decode_payload, encode_advertisement, DecodeError, InboundPayload};
/// use rssi_gossip_lib::NeighborReport;
///
/// let mut report = NeighborReport::new();
/// report.set(5, -67);
/// let payload = encode_advertisement(2, &report);
///
/// match decode_payload(&payload, 7) {
///     Ok(InboundPayload::Advertisement(advertisement)) => assert_eq!(advertisement.source(), 2),
///     _ => unreachable!(),
/// }
/// assert_eq!(decode_payload(&payload, 2), Err(DecodeError::SelfOriginated));
/// ```
pub fn decode_payload(payload: &[u8], own_device_id: DeviceId) -> Result<InboundPayload<'_>, DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }

    if is_liveness_probe(payload) {
        return Ok(InboundPayload::LivenessProbe(liveness_probe_text(payload)));
    }

    let source = payload[0];
    if source == own_device_id {
        return Err(DecodeError::SelfOriginated);
    }

    Ok(InboundPayload::Advertisement(Advertisement {
        source,
        body: &payload[1..],
    }))
}

/// Printable text of a liveness probe frame
///
/// Stops at the first invalid UTF-8 byte and drops zero padding.
fn liveness_probe_text(payload: &[u8]) -> &str {
    let text = match core::str::from_utf8(payload) {
        Ok(text) => text,
        Err(error) => core::str::from_utf8(&payload[..error.valid_up_to()]).unwrap_or_default(),
    };
    text.trim_end_matches('\0')
}

/// Compares the fixed-length marker prefix
pub fn is_liveness_probe(payload: &[u8]) -> bool {
    payload.len() >= LIVENESS_PROBE_MARKER.len() && &payload[..LIVENESS_PROBE_MARKER.len()] == LIVENESS_PROBE_MARKER
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;
    use crate::MAX_DEVICES;

    fn advertisement(payload: &[u8], own: DeviceId) -> Advertisement<'_> {
        match decode_payload(payload, own) {
            Ok(InboundPayload::Advertisement(advertisement)) => advertisement,
            other => panic!("Expected advertisement, got: {:?}", other),
        }
    }

    fn sorted(mut items: Vec<Observation>) -> Vec<Observation> {
        items.sort_by_key(|o| o.device_id);
        items
    }

    #[test]
    fn scenario_self_two_reports_five() {
        let mut report = NeighborReport::new();
        report.set(5, -67);

        let payload = encode_advertisement(2, &report);
        assert_eq!(payload.len(), 21);
        assert_eq!(payload[0], 2);
        assert_eq!(payload[11], 5);
        assert_eq!(payload[12], (-67i8) as u8);

        let decoded = advertisement(&payload, 7);
        assert_eq!(decoded.source(), 2);
        let items: Vec<Observation> = decoded.observations().collect();
        assert_eq!(items, vec![Observation { device_id: 5, rssi: -67 }]);

        assert_eq!(decode_payload(&payload, 2), Err(DecodeError::SelfOriginated));
    }

    #[test]
    fn round_trip_full_and_sparse_reports() {
        let mut full = NeighborReport::new();
        for id in 0..MAX_DEVICES as DeviceId {
            full.set(id, -30 - id as i8 * 7);
        }
        let mut sparse = NeighborReport::new();
        sparse.set(1, -99);
        sparse.set(9, 4);
        sparse.set(3, 0);

        for report in [full, sparse, NeighborReport::new()] {
            let payload = encode_advertisement(6, &report);
            let decoded: Vec<Observation> = advertisement(&payload, 1).observations().collect();
            assert_eq!(sorted(decoded), report.iter().collect::<Vec<_>>());
        }
    }

    #[test]
    fn self_originated_rejected_regardless_of_body() {
        assert_eq!(decode_payload(&[4], 4), Err(DecodeError::SelfOriginated));
        assert_eq!(decode_payload(&[4, 1, 2, 3], 4), Err(DecodeError::SelfOriginated));
        assert_eq!(decode_payload(&[4, 0xFF, 0xFF], 4), Err(DecodeError::SelfOriginated));
    }

    #[test]
    fn empty_payload_rejected() {
        assert_eq!(decode_payload(&[], 0), Err(DecodeError::EmptyPayload));
        assert_eq!(decode_payload(&[], 9), Err(DecodeError::EmptyPayload));
    }

    #[test]
    fn trailing_byte_is_ignored() {
        let even = [3u8, 1, 0xC4, 7, 0xB0];
        let odd = [3u8, 1, 0xC4, 7, 0xB0, 9];

        let even_adv = advertisement(&even, 0);
        let odd_adv = advertisement(&odd, 0);

        assert!(!even_adv.has_trailing_byte());
        assert!(odd_adv.has_trailing_byte());
        assert_eq!(
            even_adv.observations().collect::<Vec<_>>(),
            odd_adv.observations().collect::<Vec<_>>()
        );
    }

    #[test]
    fn header_only_payload_has_no_observations() {
        let decoded = advertisement(&[8], 0);
        assert_eq!(decoded.source(), 8);
        assert_eq!(decoded.observations().count(), 0);
    }

    #[test]
    fn rssi_byte_is_sign_extended() {
        let decoded = advertisement(&[1, 4, 0x80, 5, 0x7F, 6, 0xFF], 0);
        let items: Vec<Observation> = decoded.observations().collect();
        assert_eq!(
            items,
            vec![
                Observation { device_id: 4, rssi: -128 },
                Observation { device_id: 5, rssi: 127 },
                Observation { device_id: 6, rssi: -1 },
            ]
        );
    }

    #[test]
    fn foreign_ids_are_passed_through_for_the_store_to_drop() {
        let decoded = advertisement(&[1, 200, 0xC0], 0);
        let items: Vec<Observation> = decoded.observations().collect();
        assert_eq!(items, vec![Observation { device_id: 200, rssi: -64 }]);
    }

    #[test]
    fn liveness_probe_is_not_parsed_structurally() {
        let mut payload = [0u8; 31];
        payload[..LIVENESS_PROBE_MARKER.len()].copy_from_slice(LIVENESS_PROBE_MARKER);
        assert_eq!(
            decode_payload(&payload, 0),
            Ok(InboundPayload::LivenessProbe("Hello, this is a test message!"))
        );
        // 'H' collides with no valid device id, but the marker wins even for own id 'H'
        assert_eq!(
            decode_payload(LIVENESS_PROBE_MARKER, b'H'),
            Ok(InboundPayload::LivenessProbe("Hello, this is a test message!"))
        );
    }

    #[test]
    fn liveness_probe_text_stops_at_invalid_utf8() {
        let mut payload = LIVENESS_PROBE_MARKER.to_vec();
        payload.push(b'!');
        assert_eq!(decode_payload(&payload, 0), Ok(InboundPayload::LivenessProbe("Hello, this is a test message!!")));

        payload.truncate(LIVENESS_PROBE_MARKER.len());
        payload.extend_from_slice(&[0xFF, b'x']);
        assert_eq!(
            decode_payload(&payload, 0),
            Ok(InboundPayload::LivenessProbe("Hello, this is a test message!"))
        );
    }

    #[test]
    fn marker_prefix_alone_falls_back_to_structured_parsing() {
        let truncated = &LIVENESS_PROBE_MARKER[..10];
        assert!(!is_liveness_probe(truncated));
        let decoded = advertisement(truncated, 0);
        assert_eq!(decoded.source(), b'H');
    }
}
