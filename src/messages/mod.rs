//! # Messages Module
//!
//! This module provides the wire-level pieces of the gossip protocol.
//!
//! ## Architecture
//!
//! - **RadioPacket**: fixed-size frame container carried by the radio queues
//! - **Advertisement codec**: encodes the local neighbor report into the
//!   fixed-size payload and decodes inbound payloads into observations
//!
//! ## Frame Kinds
//!
//! - Structured advertisement: sender id followed by `(device, rssi)` pairs
//! - Liveness probe: fixed ASCII marker used for link testing only

pub mod advertisement;
pub mod radio_packet;

pub use advertisement::{Advertisement, DecodeError, InboundPayload, ObservationIterator, decode_payload, encode_advertisement, is_liveness_probe};
pub use radio_packet::{PacketError, RadioPacket};
