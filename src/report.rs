//! Human-readable rendering of the connectivity matrix.

use log::{Level, log};

use crate::connectivity_matrix::ConnectivityMatrix;
use crate::radio_devices::LinkCategory;
use crate::{DeviceId, RssiSample};

const NO_DEVICES_LINE: &str = "No available devices.";

enum ReportLine {
    /// Observing device and the number of devices it heard
    Summary { device_id: DeviceId, neighbor_count: usize },
    Link { observer: DeviceId, observed: DeviceId, rssi: RssiSample },
}

impl core::fmt::Display for ReportLine {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ReportLine::Summary { device_id, neighbor_count } => {
                write!(f, "Device {} is connected to {} devices.", device_id, neighbor_count)
            }
            ReportLine::Link { observer, observed, rssi } => write!(
                f,
                "  Device {} -> Device {}: {} dBm ({})",
                observer,
                observed,
                rssi,
                LinkCategory::from_rssi(*rssi)
            ),
        }
    }
}

fn report_lines(matrix: &ConnectivityMatrix) -> impl Iterator<Item = ReportLine> + '_ {
    let mut current_row = None;
    matrix.observations().flat_map(move |(row, column, rssi)| {
        // Observations arrive row-major, a summary opens every new row
        let summary = if current_row != Some(row) {
            current_row = Some(row);
            Some(ReportLine::Summary {
                device_id: row,
                neighbor_count: matrix.count_neighbors_of(row),
            })
        } else {
            None
        };
        summary.into_iter().chain(core::iter::once(ReportLine::Link {
            observer: row,
            observed: column,
            rssi,
        }))
    })
}

/// Logs the matrix, one summary line per observing device followed by its links
pub fn log_connectivity_report(matrix: &ConnectivityMatrix) {
    let own_device_id = matrix.own_device_id();
    if matrix.is_empty() {
        log!(Level::Info, "[{}] {}", own_device_id, NO_DEVICES_LINE);
        return;
    }
    for line in report_lines(matrix) {
        log!(Level::Info, "[{}] {}", own_device_id, line);
    }
}

impl core::fmt::Display for ConnectivityMatrix {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_empty() {
            return writeln!(f, "{}", NO_DEVICES_LINE);
        }
        for line in report_lines(self) {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    #[test]
    fn empty_matrix_reports_no_devices() {
        let matrix = ConnectivityMatrix::new(2);
        assert_eq!(matrix.to_string(), "No available devices.\n");
    }

    #[test]
    fn report_lists_rows_in_order_with_categories() {
        let mut matrix = ConnectivityMatrix::new(2);
        matrix.record_local_observation(5, -67);
        matrix.record_local_observation(1, -45);
        matrix.record_relayed_observation(5, 7, -95);

        let expected = "Device 2 is connected to 2 devices.\n\
                        \x20 Device 2 -> Device 1: -45 dBm (excellent)\n\
                        \x20 Device 2 -> Device 5: -67 dBm (fair)\n\
                        Device 7 is connected to 1 devices.\n\
                        \x20 Device 7 -> Device 5: -95 dBm (poor)\n";
        assert_eq!(matrix.to_string(), expected);
    }

    #[test]
    fn one_summary_per_observing_row() {
        let mut matrix = ConnectivityMatrix::new(9);
        matrix.record_local_observation(0, -50);
        matrix.record_local_observation(4, -60);
        matrix.record_local_observation(8, -70);
        matrix.record_relayed_observation(3, 0, -80);
        matrix.record_relayed_observation(6, 0, -85);

        let rendered = matrix.to_string();
        let summaries: Vec<&str> = rendered.lines().filter(|line| line.starts_with("Device")).collect();
        assert_eq!(
            summaries,
            vec!["Device 0 is connected to 2 devices.", "Device 9 is connected to 3 devices."]
        );
        assert_eq!(rendered.lines().count(), 2 + matrix.observations().count());
    }

    #[test]
    fn zero_dbm_observation_is_reported() {
        let mut matrix = ConnectivityMatrix::new(0);
        matrix.record_local_observation(3, 0);
        assert!(matrix.to_string().contains("Device 0 -> Device 3: 0 dBm (excellent)"));
    }
}
