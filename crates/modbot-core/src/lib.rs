//! Core domain types shared across the modbot workspace.
//!
//! A modular robot is a set of identical units. Each unit exposes female
//! ports (sockets) and male ports (plugs). A connection is always recorded
//! from the female side:
//!
//! ```text
//! PortKey(unit, female port)  ->  Connection(target unit, male port, orientation)
//! ```
//!
//! A [`Topology`] is the full set of such pairs at one point in time, and an
//! [`Action`] is a single connect/disconnect request that maps one topology
//! to the next.

use std::fmt;

use serde::{Deserialize, Serialize};

mod action;
mod topology;
mod vocabulary;

pub use action::{Action, ActionParseError, Violation};
pub use topology::{Link, Topology, TopologyError};
pub use vocabulary::{vocabulary, vocabulary_size};

// =============================================================================
// Identifiers
// =============================================================================

/// Identifier of a robot unit.
///
/// Regular units are numbered from 1; `0` is reserved for the control unit,
/// which matches the `M0` token used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(pub u8);

impl UnitId {
    /// The control unit.
    pub const CONTROL: UnitId = UnitId(0);

    /// Whether this is the control unit.
    pub fn is_control(self) -> bool {
        self == Self::CONTROL
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.0)
    }
}

/// Identifier of a port on a unit.
///
/// Female ports come first (`P1..=Pf`), male ports follow. `P0` is the single
/// socket of the control unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortId(pub u8);

impl PortId {
    /// The control unit's socket.
    pub const CONTROL: PortId = PortId(0);
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Rotational mounting of a mated port pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Orientation(pub u8);

impl Orientation {
    pub const O1: Orientation = Orientation(1);
    pub const O2: Orientation = Orientation(2);
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0)
    }
}

// =============================================================================
// Port Layout
// =============================================================================

/// Port and orientation arity of a unit.
///
/// The default matches the hardware: three female ports, three male ports and
/// two orientations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortLayout {
    /// Number of female ports (`P1..=Pf`).
    pub female: u8,
    /// Number of male ports, numbered after the female ones.
    pub male: u8,
    /// Number of orientations (`O1..=On`).
    pub orientations: u8,
}

impl Default for PortLayout {
    fn default() -> Self {
        Self {
            female: 3,
            male: 3,
            orientations: 2,
        }
    }
}

impl PortLayout {
    /// Female ports in ascending order.
    pub fn female_ports(&self) -> impl Iterator<Item = PortId> + Clone {
        (1..=self.female).map(PortId)
    }

    /// Male ports in ascending order.
    ///
    /// Ports numbered past `P255` do not exist and are skipped.
    pub fn male_ports(&self) -> impl Iterator<Item = PortId> + Clone {
        let first = u16::from(self.female) + 1;
        (first..first + u16::from(self.male)).filter_map(|p| u8::try_from(p).ok().map(PortId))
    }

    /// All orientations in ascending order.
    pub fn orientations(&self) -> impl Iterator<Item = Orientation> + Clone {
        (1..=self.orientations).map(Orientation)
    }

    /// Check if a port is one of this layout's female ports.
    pub fn is_female(&self, port: PortId) -> bool {
        (1..=self.female).contains(&port.0)
    }

    /// Check if a port is one of this layout's male ports.
    pub fn is_male(&self, port: PortId) -> bool {
        port.0 > self.female && u16::from(port.0) <= self.port_count()
    }

    /// Check if an orientation exists in this layout.
    pub fn has_orientation(&self, orientation: Orientation) -> bool {
        (1..=self.orientations).contains(&orientation.0)
    }

    /// Total number of ports on a unit.
    pub fn port_count(&self) -> u16 {
        u16::from(self.female) + u16::from(self.male)
    }

    /// Number of distinct (male, female, orientation) choices for one edge.
    pub fn edge_choices(&self) -> usize {
        self.female as usize * self.male as usize * self.orientations as usize
    }
}

// =============================================================================
// Connection Endpoints
// =============================================================================

/// The female socket that owns a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortKey {
    pub unit: UnitId,
    pub port: PortId,
}

impl PortKey {
    pub fn new(unit: UnitId, port: PortId) -> Self {
        Self { unit, port }
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.unit, self.port)
    }
}

/// What a female socket is plugged into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Connection {
    /// Unit owning the male port.
    pub unit: UnitId,
    /// Male port on the target unit (`P0` for the control unit).
    pub port: PortId,
    pub orientation: Orientation,
}

impl Connection {
    pub fn new(unit: UnitId, port: PortId, orientation: Orientation) -> Self {
        Self {
            unit,
            port,
            orientation,
        }
    }

    /// A connection to the control unit's socket.
    pub fn control(orientation: Orientation) -> Self {
        Self::new(UnitId::CONTROL, PortId::CONTROL, orientation)
    }

    /// Whether this connection targets the control unit.
    pub fn is_control(&self) -> bool {
        self.unit.is_control()
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.unit, self.port, self.orientation)
    }
}
