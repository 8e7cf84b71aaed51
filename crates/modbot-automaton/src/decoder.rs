//! Connectivity-matrix decoding.
//!
//! The hardware reports one row per unit and one column per port. A cell is
//! `0` when the port is free, `1` when it holds the control unit, and
//! otherwise packs the mated plug as `(unit << 3) | port`.
//!
//! The decoder keeps an occupancy record between samples and turns each new
//! sample into the connect/disconnect actions that happened since the last
//! one, in row-major order.

use std::collections::BTreeSet;

use modbot_core::{Action, Orientation, PortId, UnitId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AutomatonError, AutomatonResult};

/// Cell value meaning "connected to the control unit".
pub const CONTROL_SENTINEL: u8 = 1;

/// Largest target unit the 5 high bits can carry.
pub const MAX_TARGET_UNIT: u8 = 0b1_1111;

/// Largest target port the 3 low bits can carry.
pub const MAX_TARGET_PORT: u8 = 0b111;

const PORT_BITS: u8 = 3;

/// Pack a target unit and port into a cell value.
pub fn pack_target(unit: u8, port: u8) -> Option<u8> {
    if unit > MAX_TARGET_UNIT || port > MAX_TARGET_PORT {
        return None;
    }
    Some((unit << PORT_BITS) | port)
}

/// Split a cell value into its target unit and port.
pub fn unpack_target(value: u8) -> (UnitId, PortId) {
    (UnitId(value >> PORT_BITS), PortId(value & MAX_TARGET_PORT))
}

/// One sample of the sensor matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<u8>>", into = "Vec<Vec<u8>>")]
pub struct ConnectivityMatrix {
    rows: Vec<Vec<u8>>,
}

impl ConnectivityMatrix {
    /// Build a matrix, rejecting ragged rows.
    pub fn new(rows: Vec<Vec<u8>>) -> AutomatonResult<Self> {
        if rows.len() > usize::from(u8::MAX) {
            return Err(AutomatonError::MalformedMatrix {
                message: format!("{} rows exceeds the unit id range", rows.len()),
            });
        }
        if let Some(first) = rows.first() {
            let cols = first.len();
            if cols > usize::from(u8::MAX) {
                return Err(AutomatonError::MalformedMatrix {
                    message: format!("{} columns exceeds the port id range", cols),
                });
            }
            if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
                return Err(AutomatonError::MalformedMatrix {
                    message: format!("row {} has {} cells, expected {}", i, row.len(), cols),
                });
            }
        }
        Ok(Self { rows })
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn col_count(&self) -> usize {
        self.rows.first().map(Vec::len).unwrap_or(0)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.rows.get(row).and_then(|r| r.get(col)).copied()
    }

    pub fn rows(&self) -> &[Vec<u8>] {
        &self.rows
    }
}

impl TryFrom<Vec<Vec<u8>>> for ConnectivityMatrix {
    type Error = AutomatonError;

    fn try_from(rows: Vec<Vec<u8>>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl From<ConnectivityMatrix> for Vec<Vec<u8>> {
    fn from(matrix: ConnectivityMatrix) -> Self {
        matrix.rows
    }
}

/// A matrix cell: zero-based unit row and port column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub unit_index: usize,
    pub port_index: usize,
}

impl Cell {
    fn unit(&self) -> UnitId {
        UnitId((self.unit_index + 1) as u8)
    }

    fn port(&self) -> PortId {
        PortId((self.port_index + 1) as u8)
    }
}

/// Turns successive matrix samples into action sequences.
#[derive(Debug, Clone, Default)]
pub struct MatrixDecoder {
    occupancy: BTreeSet<Cell>,
}

impl MatrixDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Diff `matrix` against the occupancy record and update it.
    ///
    /// A cell that changes from one non-zero value to another emits nothing;
    /// the hardware always passes through `0` on a physical swap.
    pub fn decode(&mut self, matrix: &ConnectivityMatrix) -> Vec<Action> {
        let mut actions = Vec::new();

        for (unit_index, row) in matrix.rows().iter().enumerate() {
            for (port_index, &value) in row.iter().enumerate() {
                let cell = Cell {
                    unit_index,
                    port_index,
                };
                let occupied = self.occupancy.contains(&cell);

                if value != 0 && !occupied {
                    self.occupancy.insert(cell);
                    actions.push(connect_action(cell, value));
                } else if value == 0 && occupied {
                    self.occupancy.remove(&cell);
                    actions.push(Action::Disconnect {
                        unit: cell.unit(),
                        port: cell.port(),
                    });
                }
            }
        }

        debug!(
            actions = actions.len(),
            occupied = self.occupancy.len(),
            "matrix_decoded"
        );
        actions
    }

    /// Cells currently believed connected.
    pub fn occupancy(&self) -> &BTreeSet<Cell> {
        &self.occupancy
    }

    pub fn is_occupied(&self, unit_index: usize, port_index: usize) -> bool {
        self.occupancy.contains(&Cell {
            unit_index,
            port_index,
        })
    }

    /// Forget every occupied cell.
    pub fn reset(&mut self) {
        self.occupancy.clear();
    }
}

fn connect_action(cell: Cell, value: u8) -> Action {
    // The sensor does not report orientation.
    if value == CONTROL_SENTINEL {
        return Action::ConnectControl {
            unit: cell.unit(),
            port: cell.port(),
            orientation: Orientation::O1,
        };
    }
    let (target, target_port) = unpack_target(value);
    Action::Connect {
        unit: cell.unit(),
        port: cell.port(),
        target,
        target_port,
        orientation: Orientation::O1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(rows: &[&[u8]]) -> ConnectivityMatrix {
        ConnectivityMatrix::new(rows.iter().map(|r| r.to_vec()).collect()).unwrap()
    }

    #[test]
    fn test_pack_unpack_inverse() {
        for unit in 0..=MAX_TARGET_UNIT {
            for port in 0..=MAX_TARGET_PORT {
                let value = pack_target(unit, port).unwrap();
                assert_eq!(unpack_target(value), (UnitId(unit), PortId(port)));
            }
        }
        assert_eq!(pack_target(32, 0), None);
        assert_eq!(pack_target(0, 8), None);
    }

    #[test]
    fn test_scenario_first_sample() {
        let mut decoder = MatrixDecoder::new();
        let actions = decoder.decode(&matrix(&[&[1, 0, 0], &[0, 12, 0], &[0, 0, 28]]));

        assert_eq!(
            actions,
            vec![
                Action::ConnectControl {
                    unit: UnitId(1),
                    port: PortId(1),
                    orientation: Orientation::O1,
                },
                Action::Connect {
                    unit: UnitId(2),
                    port: PortId(2),
                    target: UnitId(1),
                    target_port: PortId(4),
                    orientation: Orientation::O1,
                },
                Action::Connect {
                    unit: UnitId(3),
                    port: PortId(3),
                    target: UnitId(3),
                    target_port: PortId(4),
                    orientation: Orientation::O1,
                },
            ]
        );
        assert_eq!(decoder.occupancy().len(), 3);
    }

    #[test]
    fn test_repeated_sample_is_silent() {
        let mut decoder = MatrixDecoder::new();
        let sample = matrix(&[&[1, 0, 0], &[0, 12, 0], &[0, 0, 28]]);
        decoder.decode(&sample);
        assert!(decoder.decode(&sample).is_empty());
    }

    #[test]
    fn test_cleared_row_disconnects() {
        let mut decoder = MatrixDecoder::new();
        decoder.decode(&matrix(&[&[1, 0, 0], &[0, 12, 0], &[0, 0, 28]]));

        let actions = decoder.decode(&matrix(&[&[1, 0, 0], &[0, 0, 0], &[0, 0, 28]]));
        assert_eq!(
            actions,
            vec![Action::Disconnect {
                unit: UnitId(2),
                port: PortId(2)
            }]
        );
        assert!(!decoder.is_occupied(1, 1));
        assert!(decoder.is_occupied(0, 0));
    }

    #[test]
    fn test_value_change_without_zero_is_ignored() {
        let mut decoder = MatrixDecoder::new();
        decoder.decode(&matrix(&[&[12]]));
        assert!(decoder.decode(&matrix(&[&[20]])).is_empty());
    }

    #[test]
    fn test_reset_reemits_connections() {
        let mut decoder = MatrixDecoder::new();
        let sample = matrix(&[&[0, 20]]);
        decoder.decode(&sample);
        decoder.reset();
        assert_eq!(decoder.decode(&sample).len(), 1);
    }

    #[test]
    fn test_ragged_matrix_rejected() {
        let err = ConnectivityMatrix::new(vec![vec![0, 0, 0], vec![0, 0]]).unwrap_err();
        assert!(matches!(err, AutomatonError::MalformedMatrix { .. }));
    }

    #[test]
    fn test_matrix_deserialize_validates() {
        let ok: ConnectivityMatrix = serde_json::from_str("[[1,0],[0,12]]").unwrap();
        assert_eq!(ok.row_count(), 2);
        assert_eq!(ok.get(1, 1), Some(12));
        assert!(serde_json::from_str::<ConnectivityMatrix>("[[1,0],[0]]").is_err());
    }
}
