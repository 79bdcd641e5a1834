//! Radio device implementations
//!
//! A radio device turns [`RadioCommand`](crate::RadioCommand)s into radio
//! activity and delivers received frames as
//! [`ReceivedPacket`](crate::ReceivedPacket)s:
//!
//! - `echo`: loops every broadcast back to the receiver, single node only
//! - `simulator`: exchanges frames with an external network simulator
//! - `link_quality_calculations`: RSSI to link quality mapping used by reports

pub mod link_quality_calculations;

#[cfg(feature = "radio-device-echo")]
pub mod echo;

#[cfg(feature = "radio-device-simulator")]
pub mod simulator;

// Re-export the active radio device implementation
#[cfg(feature = "radio-device-echo")]
pub use echo::{RadioDevice, radio_device_task};

#[cfg(feature = "radio-device-simulator")]
pub use simulator::{RadioDevice, radio_device_task};

// Re-export link quality utilities
pub use link_quality_calculations::{LinkCategory, normalize, rssi_to_link_quality};
