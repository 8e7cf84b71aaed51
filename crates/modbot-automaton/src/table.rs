//! Precomputed transition table over the enumerated state space.
//!
//! For every state and every vocabulary action the resulting topology is
//! computed; the transition is recorded only when that result is itself an
//! enumerated state. The table is immutable once built and is shared
//! read-only by the runtime.

use std::collections::HashMap;

use modbot_core::{vocabulary, Action, PortLayout, Topology, Violation};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AutomatonConfig;
use crate::error::AutomatonResult;
use crate::space::{StateId, StateSpace};

/// Result of looking up `(state, action)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    /// The action leads to this state.
    Hit(StateId),
    /// The action is well-formed but its result was never enumerated.
    Unknown,
    /// The action breaks the port model and can never be valid.
    Forbidden(Violation),
}

/// Summary counts for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    pub units: u8,
    pub states: usize,
    pub actions: usize,
    pub transitions: usize,
    /// Largest number of outgoing transitions from a single state.
    pub max_out_degree: usize,
    /// States with no outgoing transitions.
    pub dead_ends: usize,
}

/// The automaton's transition function, `(state, action) -> state`.
#[derive(Debug, Clone)]
pub struct TransitionTable {
    space: StateSpace,
    actions: Vec<Action>,
    transitions: HashMap<(StateId, Action), StateId>,
}

impl TransitionTable {
    /// Enumerate the state space and compute every transition.
    pub fn build(config: &AutomatonConfig) -> AutomatonResult<Self> {
        let space = StateSpace::build(config)?;
        let actions = vocabulary(config.units, &config.layout)?;

        info!(
            states = space.len(),
            actions = actions.len(),
            parallel = config.parallel,
            "transition_table_build_start"
        );

        let transitions: HashMap<(StateId, Action), StateId> = if config.parallel {
            space
                .states()
                .par_iter()
                .enumerate()
                .flat_map_iter(|(i, state)| transitions_from(&space, &actions, i, state))
                .collect()
        } else {
            space
                .states()
                .iter()
                .enumerate()
                .flat_map(|(i, state)| transitions_from(&space, &actions, i, state))
                .collect()
        };

        info!(transitions = transitions.len(), "transition_table_build_complete");

        Ok(Self {
            space,
            actions,
            transitions,
        })
    }

    /// Assemble a table from already-validated parts.
    pub(crate) fn from_parts(
        space: StateSpace,
        transitions: HashMap<(StateId, Action), StateId>,
    ) -> AutomatonResult<Self> {
        let actions = vocabulary(space.units(), space.layout())?;
        Ok(Self {
            space,
            actions,
            transitions,
        })
    }

    /// Look up the transition for `action` from `state`.
    pub fn lookup(&self, state: StateId, action: &Action) -> Lookup {
        if let Some(&next) = self.transitions.get(&(state, *action)) {
            return Lookup::Hit(next);
        }
        match action.validate(self.space.units(), self.space.layout()) {
            Ok(()) => Lookup::Unknown,
            Err(violation) => Lookup::Forbidden(violation),
        }
    }

    /// The state reached from `state` by `action`, if recorded.
    pub fn next_state(&self, state: StateId, action: &Action) -> Option<StateId> {
        self.transitions.get(&(state, *action)).copied()
    }

    /// Id of the empty topology.
    pub fn initial_state(&self) -> StateId {
        StateId::EMPTY
    }

    pub fn state(&self, id: StateId) -> Option<&Topology> {
        self.space.get(id)
    }

    pub fn state_id(&self, topology: &Topology) -> Option<StateId> {
        self.space.id_of(topology)
    }

    pub fn space(&self) -> &StateSpace {
        &self.space
    }

    /// The action vocabulary the table was built over.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn units(&self) -> u8 {
        self.space.units()
    }

    pub fn layout(&self) -> &PortLayout {
        self.space.layout()
    }

    pub fn state_count(&self) -> usize {
        self.space.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// All `(from, action, to)` triples, sorted for stable output.
    pub fn transitions(&self) -> Vec<(StateId, Action, StateId)> {
        let mut triples: Vec<_> = self
            .transitions
            .iter()
            .map(|(&(from, action), &to)| (from, action, to))
            .collect();
        triples.sort();
        triples
    }

    /// Actions with a recorded transition out of `state`, with their targets.
    pub fn outgoing(&self, state: StateId) -> Vec<(Action, StateId)> {
        self.actions
            .iter()
            .filter_map(|a| self.next_state(state, a).map(|to| (*a, to)))
            .collect()
    }

    pub fn stats(&self) -> TableStats {
        let mut degree = vec![0usize; self.space.len()];
        for &(from, _) in self.transitions.keys() {
            degree[from.index()] += 1;
        }
        let stats = TableStats {
            units: self.units(),
            states: self.space.len(),
            actions: self.actions.len(),
            transitions: self.transitions.len(),
            max_out_degree: degree.iter().copied().max().unwrap_or(0),
            dead_ends: degree.iter().filter(|&&d| d == 0).count(),
        };
        debug!(?stats, "transition_table_stats");
        stats
    }
}

fn transitions_from<'a>(
    space: &'a StateSpace,
    actions: &'a [Action],
    index: usize,
    state: &'a Topology,
) -> impl Iterator<Item = ((StateId, Action), StateId)> + 'a {
    let from = StateId(index as u32);
    actions.iter().filter_map(move |action| {
        space
            .id_of(&state.apply(action))
            .map(|to| ((from, *action), to))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use modbot_core::{Orientation, PortId, UnitId};

    fn table(units: u8) -> TransitionTable {
        TransitionTable::build(&AutomatonConfig {
            parallel: false,
            ..AutomatonConfig::with_units(units)
        })
        .unwrap()
    }

    fn connect(a: u8, pa: u8, b: u8, pb: u8) -> Action {
        Action::Connect {
            unit: UnitId(a),
            port: PortId(pa),
            target: UnitId(b),
            target_port: PortId(pb),
            orientation: Orientation::O1,
        }
    }

    #[test]
    fn test_every_transition_targets_a_state() {
        let table = table(2);
        for (from, action, to) in table.transitions() {
            let expected = table.state(from).unwrap().apply(&action);
            assert_eq!(table.state(to), Some(&expected));
        }
    }

    #[test]
    fn test_connect_then_disconnect() {
        let table = table(2);
        let start = table.initial_state();

        let Lookup::Hit(connected) = table.lookup(start, &connect(1, 1, 2, 4)) else {
            panic!("connect from empty should be known");
        };
        let back = table.lookup(
            connected,
            &Action::Disconnect {
                unit: UnitId(1),
                port: PortId(1),
            },
        );
        assert_eq!(back, Lookup::Hit(start));
    }

    #[test]
    fn test_disconnect_on_empty_is_self_loop() {
        let table = table(2);
        let start = table.initial_state();
        let action = Action::Disconnect {
            unit: UnitId(2),
            port: PortId(3),
        };
        assert_eq!(table.lookup(start, &action), Lookup::Hit(start));
    }

    #[test]
    fn test_unknown_vs_forbidden() {
        let table = table(3);
        let start = table.initial_state();
        let control = match table.lookup(
            start,
            &Action::ConnectControl {
                unit: UnitId(1),
                port: PortId(1),
                orientation: Orientation::O1,
            },
        ) {
            Lookup::Hit(id) => id,
            other => panic!("expected hit, got {:?}", other),
        };

        // Chains with the control unit attached are not enumerated.
        assert_eq!(table.lookup(control, &connect(2, 2, 1, 4)), Lookup::Unknown);

        assert_eq!(
            table.lookup(start, &connect(3, 3, 3, 4)),
            Lookup::Forbidden(Violation::SelfConnection { unit: UnitId(3) })
        );
        assert!(matches!(
            table.lookup(start, &connect(1, 1, 9, 4)),
            Lookup::Forbidden(Violation::UnitOutOfRange { .. })
        ));
    }

    #[test]
    fn test_lookup_is_deterministic() {
        let table = table(2);
        for (from, action, _) in table.transitions().into_iter().take(50) {
            assert_eq!(table.lookup(from, &action), table.lookup(from, &action));
        }
    }

    #[test]
    fn test_parallel_build_matches_sequential() {
        let sequential = table(2);
        let parallel = TransitionTable::build(&AutomatonConfig {
            parallel: true,
            ..AutomatonConfig::with_units(2)
        })
        .unwrap();
        assert_eq!(sequential.transitions(), parallel.transitions());
        assert_eq!(sequential.space().states(), parallel.space().states());
    }

    #[test]
    fn test_stats() {
        let table = table(2);
        let stats = table.stats();
        assert_eq!(stats.units, 2);
        assert_eq!(stats.states, table.state_count());
        assert_eq!(stats.transitions, table.transition_count());
        assert_eq!(stats.dead_ends, 0);
        assert!(!table.outgoing(table.initial_state()).is_empty());
    }
}
