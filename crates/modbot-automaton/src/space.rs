//! State-space enumeration.
//!
//! The reachable configurations of the robot are simple chains of units: a
//! unit's female socket holds the next unit's male plug, with no branching
//! and no cycles. Every ordered chain of 1..=N distinct units is enumerated,
//! and each adjacent pair in a chain picks one (male port, female port,
//! orientation) combination. The cross product over a chain's edges yields
//! one topology per combination. Single control-unit connections are added
//! alongside, and the empty topology is always state 0.

use std::collections::HashMap;

use modbot_core::{Connection, Link, PortKey, PortLayout, Topology, UnitId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AutomatonConfig;
use crate::error::{AutomatonError, AutomatonResult};

/// Dense index of a topology inside a [`StateSpace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(pub u32);

impl StateId {
    /// The fully disconnected topology.
    pub const EMPTY: StateId = StateId(0);

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Upper bound on the number of states [`StateSpace::build`] produces.
///
/// `1 + N·F·O + Σ_{L=2..N} P(N, L) · (F·M·O)^(L-1)`, saturating.
pub fn estimate_states(units: u8, layout: &PortLayout) -> u128 {
    let n = u128::from(units);
    let choices = layout.edge_choices() as u128;
    let control = n * u128::from(layout.female) * u128::from(layout.orientations);

    let mut total: u128 = 1 + control;
    for len in 2..=n {
        let chains: u128 = (n - len + 1..=n).fold(1u128, |acc, k| acc.saturating_mul(k));
        let per_chain = choices.saturating_pow((len - 1) as u32);
        total = total.saturating_add(chains.saturating_mul(per_chain));
    }
    total
}

/// The complete, duplicate-free set of enumerated topologies.
#[derive(Debug, Clone)]
pub struct StateSpace {
    units: u8,
    layout: PortLayout,
    states: Vec<Topology>,
    index: HashMap<Topology, StateId>,
}

impl StateSpace {
    /// Enumerate every chain and control state for the configured robot.
    pub fn build(config: &AutomatonConfig) -> AutomatonResult<Self> {
        config.validate()?;
        let estimated_states = estimate_states(config.units, &config.layout);

        if config.units > config.max_units {
            return Err(AutomatonError::UnitLimitExceeded {
                units: config.units,
                max_units: config.max_units,
                estimated_states,
            });
        }
        let max_states = config.max_states.min(u64::from(u32::MAX));
        if estimated_states > u128::from(max_states) {
            return Err(AutomatonError::StateLimitExceeded {
                estimated_states,
                max_states,
            });
        }

        info!(
            units = config.units,
            estimated_states = estimated_states as u64,
            "state_space_build_start"
        );

        let mut space = Self::with_capacity(config.units, config.layout, estimated_states as usize);
        space.insert(Topology::empty());

        let ids: Vec<UnitId> = (1..=config.units).map(UnitId).collect();
        for len in 1..=ids.len() {
            let before = space.len();
            for chain in permutations(&ids, len) {
                space.add_chain(&chain)?;
            }
            debug!(len, added = space.len() - before, "chain_length_enumerated");
        }

        for &unit in &ids {
            for port in config.layout.female_ports() {
                for orientation in config.layout.orientations() {
                    space.insert(Topology::empty().with_link(Link::new(
                        PortKey::new(unit, port),
                        Connection::control(orientation),
                    )));
                }
            }
        }

        info!(states = space.len(), "state_space_build_complete");
        Ok(space)
    }

    /// Rebuild a space from a stored state list.
    ///
    /// State 0 must be the empty topology, states must be distinct, and every
    /// link must be valid for `units` and `layout`.
    pub fn from_states(
        units: u8,
        layout: PortLayout,
        states: Vec<Topology>,
    ) -> AutomatonResult<Self> {
        if states.first().map(Topology::is_empty) != Some(true) {
            return Err(AutomatonError::InvalidTable {
                message: "state 0 must be the empty topology".to_string(),
            });
        }

        let mut space = Self::with_capacity(units, layout, states.len());
        for (i, state) in states.into_iter().enumerate() {
            state.validate(units, &layout)?;
            let (_, added) = space.insert(state);
            if !added {
                return Err(AutomatonError::InvalidTable {
                    message: format!("state {} duplicates an earlier state", i),
                });
            }
        }
        Ok(space)
    }

    fn with_capacity(units: u8, layout: PortLayout, capacity: usize) -> Self {
        Self {
            units,
            layout,
            states: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Insert a topology, returning its id and whether it was new.
    fn insert(&mut self, topology: Topology) -> (StateId, bool) {
        if let Some(&id) = self.index.get(&topology) {
            return (id, false);
        }
        let id = StateId(self.states.len() as u32);
        self.index.insert(topology.clone(), id);
        self.states.push(topology);
        (id, true)
    }

    /// Add every edge-choice combination of one chain.
    fn add_chain(&mut self, chain: &[UnitId]) -> AutomatonResult<()> {
        let edges: Vec<Vec<Link>> = chain
            .windows(2)
            .map(|pair| edge_options(pair[0], pair[1], &self.layout))
            .collect();

        // A lone unit has no edges; its topology is the empty state.
        if edges.is_empty() {
            return Ok(());
        }

        let mut cursor = vec![0usize; edges.len()];
        loop {
            let links = cursor.iter().zip(&edges).map(|(&i, options)| options[i]);
            self.insert(Topology::from_links(links)?);

            let mut pos = edges.len();
            loop {
                if pos == 0 {
                    return Ok(());
                }
                pos -= 1;
                cursor[pos] += 1;
                if cursor[pos] < edges[pos].len() {
                    break;
                }
                cursor[pos] = 0;
            }
        }
    }

    /// Number of states.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always false: the empty topology is present.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn units(&self) -> u8 {
        self.units
    }

    pub fn layout(&self) -> &PortLayout {
        &self.layout
    }

    /// Topology for a state id.
    pub fn get(&self, id: StateId) -> Option<&Topology> {
        self.states.get(id.index())
    }

    /// State id of a topology, if enumerated.
    pub fn id_of(&self, topology: &Topology) -> Option<StateId> {
        self.index.get(topology).copied()
    }

    pub fn contains(&self, topology: &Topology) -> bool {
        self.index.contains_key(topology)
    }

    /// States in id order.
    pub fn states(&self) -> &[Topology] {
        &self.states
    }

    /// `(id, topology)` pairs in id order.
    pub fn iter(&self) -> impl Iterator<Item = (StateId, &Topology)> {
        self.states
            .iter()
            .enumerate()
            .map(|(i, t)| (StateId(i as u32), t))
    }
}

/// Every way `upstream`'s female socket can hold `downstream`'s male plug.
fn edge_options(upstream: UnitId, downstream: UnitId, layout: &PortLayout) -> Vec<Link> {
    let mut options = Vec::with_capacity(layout.edge_choices());
    for male in layout.male_ports() {
        for female in layout.female_ports() {
            for orientation in layout.orientations() {
                options.push(Link::new(
                    PortKey::new(upstream, female),
                    Connection::new(downstream, male, orientation),
                ));
            }
        }
    }
    options
}

/// Ordered selections of `len` distinct units, in lexicographic order.
fn permutations(units: &[UnitId], len: usize) -> Vec<Vec<UnitId>> {
    fn extend(
        units: &[UnitId],
        len: usize,
        used: &mut [bool],
        current: &mut Vec<UnitId>,
        out: &mut Vec<Vec<UnitId>>,
    ) {
        if current.len() == len {
            out.push(current.clone());
            return;
        }
        for i in 0..units.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            current.push(units[i]);
            extend(units, len, used, current, out);
            current.pop();
            used[i] = false;
        }
    }

    let mut out = Vec::new();
    let mut used = vec![false; units.len()];
    extend(units, len, &mut used, &mut Vec::with_capacity(len), &mut out);
    out
}
