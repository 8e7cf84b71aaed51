//! Connection topologies.
//!
//! A [`Topology`] is an immutable value: applying an [`Action`] returns a new
//! topology and leaves the input untouched. Equality and hashing are
//! structural so independently built topologies with the same links collapse
//! to one state.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use petgraph::graph::{NodeIndex, UnGraph};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::action::{Action, Violation};
use crate::{Connection, PortKey, PortLayout, UnitId};

/// Errors raised while constructing or validating a topology.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    /// The same female socket appears twice.
    #[error("port {key} holds more than one connection")]
    DuplicatePortKey { key: PortKey },

    /// A link violates the port model.
    #[error("invalid link {link}: {violation}")]
    InvalidLink { link: Link, violation: Violation },

    /// A robot needs at least one unit.
    #[error("unit count must be at least 1")]
    NoUnits,
}

/// One `(PortKey, Connection)` pair of a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Link {
    pub from: PortKey,
    pub to: Connection,
}

impl Link {
    pub fn new(from: PortKey, to: Connection) -> Self {
        Self { from, to }
    }

    /// Check this link against a robot of `units` units with `layout` ports.
    pub fn validate(&self, units: u8, layout: &PortLayout) -> Result<(), Violation> {
        check_unit(self.from.unit, units)?;
        if !layout.is_female(self.from.port) {
            return Err(Violation::NotFemale {
                port: self.from.port,
            });
        }
        if !layout.has_orientation(self.to.orientation) {
            return Err(Violation::UnknownOrientation {
                orientation: self.to.orientation,
            });
        }
        if self.to.is_control() {
            if self.to.port != crate::PortId::CONTROL {
                return Err(Violation::ControlPort { port: self.to.port });
            }
            return Ok(());
        }
        check_unit(self.to.unit, units)?;
        if self.to.unit == self.from.unit {
            return Err(Violation::SelfConnection {
                unit: self.from.unit,
            });
        }
        if !layout.is_male(self.to.port) {
            return Err(Violation::NotMale { port: self.to.port });
        }
        Ok(())
    }
}

pub(crate) fn check_unit(unit: UnitId, units: u8) -> Result<(), Violation> {
    if unit.0 == 0 || unit.0 > units {
        Err(Violation::UnitOutOfRange { unit, units })
    } else {
        Ok(())
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// A full connectivity snapshot of the robot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "Vec<Link>", into = "Vec<Link>")]
pub struct Topology {
    links: BTreeMap<PortKey, Connection>,
}

impl Topology {
    /// The fully disconnected topology.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a topology from links, rejecting a female port used twice.
    pub fn from_links(links: impl IntoIterator<Item = Link>) -> Result<Self, TopologyError> {
        let mut map = BTreeMap::new();
        for link in links {
            if map.insert(link.from, link.to).is_some() {
                return Err(TopologyError::DuplicatePortKey { key: link.from });
            }
        }
        Ok(Self { links: map })
    }

    /// Return a copy with `link` inserted, overwriting any connection on the same key.
    pub fn with_link(&self, link: Link) -> Self {
        let mut links = self.links.clone();
        links.insert(link.from, link.to);
        Self { links }
    }

    /// Return a copy without the connection on `key`.
    pub fn without(&self, key: &PortKey) -> Self {
        let mut links = self.links.clone();
        links.remove(key);
        Self { links }
    }

    /// Apply an action, producing the resulting topology.
    pub fn apply(&self, action: &Action) -> Self {
        match *action {
            Action::Connect {
                unit,
                port,
                target,
                target_port,
                orientation,
            } => self.with_link(Link::new(
                PortKey::new(unit, port),
                Connection::new(target, target_port, orientation),
            )),
            Action::Disconnect { unit, port } => self.without(&PortKey::new(unit, port)),
            Action::ConnectControl {
                unit,
                port,
                orientation,
            } => self.with_link(Link::new(
                PortKey::new(unit, port),
                Connection::control(orientation),
            )),
            Action::DisconnectControl { unit, port } => {
                let key = PortKey::new(unit, port);
                match self.links.get(&key) {
                    Some(conn) if conn.is_control() => self.without(&key),
                    _ => self.clone(),
                }
            }
        }
    }

    /// Number of connections.
    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    /// Connection held by a female socket.
    pub fn get(&self, key: &PortKey) -> Option<&Connection> {
        self.links.get(key)
    }

    /// Check if a female socket is occupied.
    pub fn is_occupied(&self, key: &PortKey) -> bool {
        self.links.contains_key(key)
    }

    /// Links in key order.
    pub fn links(&self) -> impl Iterator<Item = Link> + '_ {
        self.links.iter().map(|(from, to)| Link::new(*from, *to))
    }

    /// Every unit mentioned on either side of a link, control unit included.
    pub fn units(&self) -> BTreeSet<UnitId> {
        self.links
            .iter()
            .flat_map(|(from, to)| [from.unit, to.unit])
            .collect()
    }

    /// Validate every link against the port model.
    pub fn validate(&self, units: u8, layout: &PortLayout) -> Result<(), TopologyError> {
        for link in self.links() {
            link.validate(units, layout)
                .map_err(|violation| TopologyError::InvalidLink { link, violation })?;
        }
        Ok(())
    }

    /// Symmetric unit adjacency derived from the female-side links.
    ///
    /// Each link becomes one undirected edge weighted by the link itself, so
    /// both ends of a connection can be looked up without storing it twice.
    pub fn adjacency(&self) -> UnGraph<UnitId, Link> {
        let mut graph = UnGraph::new_undirected();
        let mut nodes: BTreeMap<UnitId, NodeIndex> = BTreeMap::new();
        for unit in self.units() {
            nodes.insert(unit, graph.add_node(unit));
        }
        for link in self.links() {
            graph.add_edge(nodes[&link.from.unit], nodes[&link.to.unit], link);
        }
        graph
    }

    /// Units directly connected to `unit`, in either direction.
    pub fn neighbors(&self, unit: UnitId) -> BTreeSet<UnitId> {
        self.links()
            .filter_map(|link| {
                if link.from.unit == unit {
                    Some(link.to.unit)
                } else if link.to.unit == unit {
                    Some(link.from.unit)
                } else {
                    None
                }
            })
            .collect()
    }
}

impl From<Topology> for Vec<Link> {
    fn from(topology: Topology) -> Self {
        topology.links().collect()
    }
}

impl TryFrom<Vec<Link>> for Topology {
    type Error = TopologyError;

    fn try_from(links: Vec<Link>) -> Result<Self, Self::Error> {
        Self::from_links(links)
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{{}}");
        }
        write!(f, "{{")?;
        for (i, link) in self.links().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", link)?;
        }
        write!(f, "}}")
    }
}
