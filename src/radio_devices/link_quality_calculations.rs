//! Radio link quality utilities
//!
//! This module maps a received signal strength (RSSI, dBm) onto a 0-63
//! link quality scale and buckets it into coarse categories. Reporting uses it
//! to annotate matrix entries; the matrix itself always stores raw dBm.

use crate::RssiSample;

/// RSSI at or below which a BLE link is considered unusable (in dBm)
const RSSI_MIN: i16 = -100;

/// RSSI at or above which a BLE link is considered perfect (in dBm)
const RSSI_MAX: i16 = -40;

/// Link quality below this value is reported as poor
pub const POOR_LIMIT: u8 = 20;

/// Link quality at or above this value is reported as excellent
pub const EXCELLENT_LIMIT: u8 = 40;

/// Normalizes a value to a 0-63 scale based on defined min/max bounds
///
/// Values below `min` map to 0, values above `max` map to 63.
///
/// # Example
/// ```rust
/// use rssi_gossip_lib::radio_devices::normalize;
///
/// let quality = normalize(-70, -100, -40);
/// assert!(quality > 0 && quality < 63);
/// assert_eq!(normalize(-120, -100, -40), 0);
/// assert_eq!(normalize(-20, -100, -40), 63);
/// ```
pub fn normalize(value: i16, min: i16, max: i16) -> u8 {
    if max <= min {
        return 0;
    }
    let clamped_value = value.max(min).min(max);
    let shifted_value = clamped_value - min;

    // Multiply first to keep precision with integer math
    let scaled_value = (shifted_value as u32 * 63) / (max - min) as u32;

    scaled_value as u8
}

/// Link quality (0-63) of a received signal
pub fn rssi_to_link_quality(rssi: RssiSample) -> u8 {
    normalize(rssi as i16, RSSI_MIN, RSSI_MAX)
}

/// Coarse link category used in reports
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub enum LinkCategory {
    Poor,
    Fair,
    Excellent,
}

impl LinkCategory {
    pub fn from_link_quality(link_quality: u8) -> Self {
        if link_quality < POOR_LIMIT {
            LinkCategory::Poor
        } else if link_quality < EXCELLENT_LIMIT {
            LinkCategory::Fair
        } else {
            LinkCategory::Excellent
        }
    }

    pub fn from_rssi(rssi: RssiSample) -> Self {
        Self::from_link_quality(rssi_to_link_quality(rssi))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LinkCategory::Poor => "poor",
            LinkCategory::Fair => "fair",
            LinkCategory::Excellent => "excellent",
        }
    }
}

impl core::fmt::Display for LinkCategory {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
