//! # Connectivity Matrix - Local View of the Mesh
//!
//! This module holds the per-node table of observed and relayed RSSI values
//! between device pairs. It is pure bookkeeping: no wire format, no I/O.
//!
//! ## Layout
//!
//! The matrix is indexed by device id (ids are small, provisioned integers in
//! `0..MAX_DEVICES`), so no id-to-index mapping table is needed:
//! - `cells[r][c]` = RSSI that device `r` observed when it last heard device `c`
//! - Row `own_device_id` holds local measurements
//! - Every other row holds second-hand reports relayed by peers
//!
//! ## Absent Observations
//!
//! Cells are `Option<RssiSample>`. `None` means "never heard", so a genuine
//! 0 dBm reading stays distinguishable from absence. The zero sentinel only
//! exists on the wire (see the advertisement codec).
//!
//! ## Malformed Input
//!
//! Device ids arrive from uncontrolled peers. Out-of-range ids are dropped
//! silently (trace log only) instead of surfacing an error, so one bad packet
//! cannot disturb entries for other peers.

use crate::{DeviceId, MAX_DEVICES, RssiSample};

/// A single `(device, rssi)` pair
///
/// Used both for the entries of a [`NeighborReport`] and for the pairs
/// decoded from an inbound advertisement.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct Observation {
    pub device_id: DeviceId,
    pub rssi: RssiSample,
}

/// Sparse set of observations keyed by device id
///
/// Logically one row of the connectivity matrix. The local device's row is
/// the body of every structured advertisement.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct NeighborReport {
    rssi: [Option<RssiSample>; MAX_DEVICES],
}

impl Default for NeighborReport {
    fn default() -> Self {
        Self::new()
    }
}

impl NeighborReport {
    /// Creates an empty report
    pub const fn new() -> Self {
        NeighborReport { rssi: [None; MAX_DEVICES] }
    }

    /// Sets the observation for `device_id`
    ///
    /// # Returns
    /// * `true` - the observation was stored
    /// * `false` - `device_id` is out of range, nothing changed
    pub fn set(&mut self, device_id: DeviceId, rssi: RssiSample) -> bool {
        match self.rssi.get_mut(device_id as usize) {
            Some(cell) => {
                *cell = Some(rssi);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, device_id: DeviceId) -> Option<RssiSample> {
        self.rssi.get(device_id as usize).copied().flatten()
    }

    /// Number of observed devices
    pub fn len(&self) -> usize {
        self.rssi.iter().filter(|cell| cell.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.rssi.iter().all(|cell| cell.is_none())
    }

    /// Iterates the observed devices in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = Observation> + '_ {
        self.rssi.iter().enumerate().filter_map(|(device_id, cell)| {
            cell.map(|rssi| Observation {
                device_id: device_id as DeviceId,
                rssi,
            })
        })
    }
}

/// Connectivity matrix (MAX_DEVICES x MAX_DEVICES)
///
/// Owned by exactly one gossip node. Reports leave the gossip task as copies,
/// so the matrix itself is never shared and needs no lock.
#[derive(Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Debug))]
pub struct ConnectivityMatrix {
    own_device_id: DeviceId,
    cells: [[Option<RssiSample>; MAX_DEVICES]; MAX_DEVICES],
}

impl ConnectivityMatrix {
    /// Creates an empty matrix for the given local device
    ///
    /// `own_device_id` is expected to be range-checked by the caller
    /// (see `checked_device_id`); an out-of-range id yields a matrix whose
    /// local row can never be written.
    pub const fn new(own_device_id: DeviceId) -> Self {
        ConnectivityMatrix {
            own_device_id,
            cells: [[None; MAX_DEVICES]; MAX_DEVICES],
        }
    }

    pub fn own_device_id(&self) -> DeviceId {
        self.own_device_id
    }

    /// Clears every cell
    pub fn reset(&mut self) {
        for row in self.cells.iter_mut() {
            row.fill(None);
        }
    }

    /// Records what this node measured when it heard `peer`
    ///
    /// Writes `matrix[self][peer]`. An out-of-range `peer` is dropped.
    pub fn record_local_observation(&mut self, peer: DeviceId, rssi: RssiSample) {
        let own_device_id = self.own_device_id;
        self.write(own_device_id, peer, rssi);
    }

    /// Records a report from `source` stating it heard `peer` at `rssi`
    ///
    /// Writes `matrix[peer][source]`, which gives every node a two-hop view of
    /// the mesh. Out-of-range `source` or `peer` is dropped.
    pub fn record_relayed_observation(&mut self, source: DeviceId, peer: DeviceId, rssi: RssiSample) {
        self.write(peer, source, rssi);
    }

    fn write(&mut self, row: DeviceId, column: DeviceId, rssi: RssiSample) {
        if (row as usize) >= MAX_DEVICES || (column as usize) >= MAX_DEVICES {
            log::trace!(
                "[{}] Dropping observation with out of range device id: row {}, column {}",
                self.own_device_id,
                row,
                column
            );
            return;
        }
        self.cells[row as usize][column as usize] = Some(rssi);
    }

    pub fn get(&self, row: DeviceId, column: DeviceId) -> Option<RssiSample> {
        self.cells.get(row as usize).and_then(|cells| cells.get(column as usize)).copied().flatten()
    }

    /// Counts observed cells in row `id`, 0 for an out-of-range id
    pub fn count_neighbors_of(&self, id: DeviceId) -> usize {
        match self.cells.get(id as usize) {
            Some(row) => row.iter().filter(|cell| cell.is_some()).count(),
            None => 0,
        }
    }

    /// Returns the local device's row
    pub fn self_row(&self) -> NeighborReport {
        match self.cells.get(self.own_device_id as usize) {
            Some(row) => NeighborReport { rssi: *row },
            None => NeighborReport::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|row| row.iter().all(|cell| cell.is_none()))
    }

    /// Iterates every observed cell as `(row, column, rssi)` in row-major order
    pub fn observations(&self) -> impl Iterator<Item = (DeviceId, DeviceId, RssiSample)> + '_ {
        self.cells.iter().enumerate().flat_map(|(row, cells)| {
            cells
                .iter()
                .enumerate()
                .filter_map(move |(column, cell)| cell.map(|rssi| (row as DeviceId, column as DeviceId, rssi)))
        })
    }
}

#[cfg(all(test, feature = "std"))]
mod tests {
    use super::*;

    const OWN_ID: DeviceId = 2;

    #[test]
    fn new_matrix_is_empty() {
        let matrix = ConnectivityMatrix::new(OWN_ID);
        assert!(matrix.is_empty());
        for id in 0..MAX_DEVICES as DeviceId {
            assert_eq!(matrix.count_neighbors_of(id), 0);
        }
        assert!(matrix.self_row().is_empty());
    }

    #[test]
    fn local_observation_lands_in_own_row() {
        let mut matrix = ConnectivityMatrix::new(OWN_ID);
        matrix.record_local_observation(5, -67);

        assert_eq!(matrix.get(OWN_ID, 5), Some(-67));
        assert_eq!(matrix.count_neighbors_of(OWN_ID), 1);

        let row = matrix.self_row();
        let items: Vec<Observation> = row.iter().collect();
        assert_eq!(items, vec![Observation { device_id: 5, rssi: -67 }]);
    }

    #[test]
    fn out_of_range_local_observation_is_dropped() {
        let mut matrix = ConnectivityMatrix::new(OWN_ID);
        matrix.record_local_observation(4, -70);
        let before = matrix;

        matrix.record_local_observation(MAX_DEVICES as DeviceId, -50);
        matrix.record_local_observation(255, -50);

        assert_eq!(matrix, before);
    }

    #[test]
    fn relayed_observation_writes_peer_row_source_column() {
        let mut matrix = ConnectivityMatrix::new(OWN_ID);
        // Device 7 reports it heard device 3 at -80
        matrix.record_relayed_observation(7, 3, -80);

        assert_eq!(matrix.get(3, 7), Some(-80));
        assert_eq!(matrix.get(7, 3), None);
        assert_eq!(matrix.count_neighbors_of(3), 1);
        assert!(matrix.self_row().is_empty());
    }

    #[test]
    fn out_of_range_relayed_observation_is_dropped() {
        let mut matrix = ConnectivityMatrix::new(OWN_ID);
        matrix.record_relayed_observation(200, 3, -80);
        matrix.record_relayed_observation(3, 200, -80);
        assert!(matrix.is_empty());
    }

    #[test]
    fn zero_dbm_is_an_observation() {
        let mut matrix = ConnectivityMatrix::new(OWN_ID);
        matrix.record_local_observation(0, 0);
        assert_eq!(matrix.get(OWN_ID, 0), Some(0));
        assert_eq!(matrix.count_neighbors_of(OWN_ID), 1);
    }

    #[test]
    fn reset_is_idempotent() {
        let mut matrix = ConnectivityMatrix::new(OWN_ID);
        matrix.record_local_observation(1, -40);
        matrix.record_relayed_observation(1, 9, -90);

        matrix.reset();
        let once = matrix;
        matrix.reset();

        assert_eq!(matrix, once);
        assert!(matrix.is_empty());
        assert_eq!(matrix.own_device_id(), OWN_ID);
    }

    #[test]
    fn observations_iterate_row_major() {
        let mut matrix = ConnectivityMatrix::new(OWN_ID);
        matrix.record_relayed_observation(4, 6, -60);
        matrix.record_local_observation(8, -55);
        matrix.record_local_observation(1, -45);

        let items: Vec<(DeviceId, DeviceId, RssiSample)> = matrix.observations().collect();
        assert_eq!(items, vec![(OWN_ID, 1, -45), (OWN_ID, 8, -55), (6, 4, -60)]);
    }

    #[test]
    fn neighbor_report_rejects_out_of_range_ids() {
        let mut report = NeighborReport::new();
        assert!(report.set(9, -30));
        assert!(!report.set(10, -30));
        assert_eq!(report.len(), 1);
        assert_eq!(report.get(9), Some(-30));
        assert_eq!(report.get(10), None);
    }
}
