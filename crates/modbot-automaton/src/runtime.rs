//! Automaton runtime.
//!
//! The `AutomatonRuntime` owns the current state and moves it through the
//! shared [`TransitionTable`]. A missing transition is reported as a
//! [`StepOutcome`] and leaves the state untouched; only a missing current
//! state is an error.

use std::sync::Arc;

use modbot_core::{Action, ActionParseError, Topology, Violation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AutomatonError, AutomatonResult};
use crate::space::StateId;
use crate::table::{Lookup, TransitionTable};

/// Result of performing one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// The runtime moved from `from` to `to`.
    Transitioned {
        action: Action,
        from: StateId,
        to: StateId,
    },
    /// The action is well-formed but leads outside the enumerated states.
    Unknown { action: Action, state: StateId },
    /// The action can never be valid for this robot.
    Forbidden {
        action: Action,
        state: StateId,
        violation: Violation,
    },
    /// The action text did not parse; nothing was performed.
    Malformed {
        text: String,
        error: ActionParseError,
    },
}

impl StepOutcome {
    /// Whether the current state changed (self-loops count as transitions).
    pub fn is_transition(&self) -> bool {
        matches!(self, StepOutcome::Transitioned { .. })
    }

    /// The action involved, if the input parsed.
    pub fn action(&self) -> Option<&Action> {
        match self {
            StepOutcome::Transitioned { action, .. }
            | StepOutcome::Unknown { action, .. }
            | StepOutcome::Forbidden { action, .. } => Some(action),
            StepOutcome::Malformed { .. } => None,
        }
    }
}

/// Running counters over every performed action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStats {
    pub transitioned: u64,
    pub unknown: u64,
    pub forbidden: u64,
    pub malformed: u64,
}

impl RuntimeStats {
    fn record(&mut self, outcome: &StepOutcome) {
        match outcome {
            StepOutcome::Transitioned { .. } => self.transitioned += 1,
            StepOutcome::Unknown { .. } => self.unknown += 1,
            StepOutcome::Forbidden { .. } => self.forbidden += 1,
            StepOutcome::Malformed { .. } => self.malformed += 1,
        }
    }

    /// Total actions attempted.
    pub fn total(&self) -> u64 {
        self.transitioned + self.unknown + self.forbidden + self.malformed
    }
}

/// Holds the current topology and applies actions through the table.
pub struct AutomatonRuntime {
    table: Arc<TransitionTable>,
    current: Option<StateId>,
    stats: RuntimeStats,
}

impl AutomatonRuntime {
    /// Create a runtime starting in the empty topology.
    pub fn new(table: Arc<TransitionTable>) -> Self {
        let initial = table.initial_state();
        Self {
            table,
            current: Some(initial),
            stats: RuntimeStats::default(),
        }
    }

    /// Create a runtime with no current state.
    ///
    /// [`set_current`](Self::set_current) or [`reset`](Self::reset) must be
    /// called before any action is performed.
    pub fn detached(table: Arc<TransitionTable>) -> Self {
        Self {
            table,
            current: None,
            stats: RuntimeStats::default(),
        }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Current state id, if initialized.
    pub fn current_state(&self) -> Option<StateId> {
        self.current
    }

    /// Current topology, if initialized.
    pub fn current_topology(&self) -> Option<&Topology> {
        self.current.and_then(|id| self.table.state(id))
    }

    /// Topology for any state id of the table.
    pub fn topology(&self, id: StateId) -> Option<&Topology> {
        self.table.state(id)
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// Return to the empty topology.
    pub fn reset(&mut self) {
        self.current = Some(self.table.initial_state());
        debug!("runtime_reset");
    }

    /// Jump to `topology`, which must be a state of the table.
    pub fn set_current(&mut self, topology: &Topology) -> AutomatonResult<StateId> {
        let id = self
            .table
            .state_id(topology)
            .ok_or_else(|| AutomatonError::UnknownState {
                state: topology.to_string(),
            })?;
        self.current = Some(id);
        debug!(state = id.0, "runtime_state_set");
        Ok(id)
    }

    /// Perform a single action.
    pub fn perform_action(&mut self, action: &Action) -> AutomatonResult<StepOutcome> {
        let from = self.current.ok_or(AutomatonError::NoCurrentState)?;

        let outcome = match self.table.lookup(from, action) {
            Lookup::Hit(to) => {
                self.current = Some(to);
                info!(
                    action = %action,
                    from = %self.describe(from),
                    to = %self.describe(to),
                    "transition"
                );
                StepOutcome::Transitioned {
                    action: *action,
                    from,
                    to,
                }
            }
            Lookup::Unknown => {
                warn!(
                    action = %action,
                    state = %self.describe(from),
                    "no_transition_unknown"
                );
                StepOutcome::Unknown {
                    action: *action,
                    state: from,
                }
            }
            Lookup::Forbidden(violation) => {
                warn!(
                    action = %action,
                    state = %self.describe(from),
                    %violation,
                    "no_transition_forbidden"
                );
                StepOutcome::Forbidden {
                    action: *action,
                    state: from,
                    violation,
                }
            }
        };

        self.stats.record(&outcome);
        Ok(outcome)
    }

    /// Parse and perform a wire-encoded action.
    ///
    /// Unparsable text yields [`StepOutcome::Malformed`] without touching the
    /// current state.
    pub fn perform_text(&mut self, text: &str) -> AutomatonResult<StepOutcome> {
        if self.current.is_none() {
            return Err(AutomatonError::NoCurrentState);
        }
        match text.parse::<Action>() {
            Ok(action) => self.perform_action(&action),
            Err(error) => {
                warn!(text = text.trim(), %error, "malformed_action");
                let outcome = StepOutcome::Malformed {
                    text: text.trim().to_string(),
                    error,
                };
                self.stats.record(&outcome);
                Ok(outcome)
            }
        }
    }

    /// Perform actions in order; stops only on a fatal error.
    pub fn perform_all(&mut self, actions: &[Action]) -> AutomatonResult<Vec<StepOutcome>> {
        actions.iter().map(|a| self.perform_action(a)).collect()
    }

    fn describe(&self, id: StateId) -> String {
        self.table
            .state(id)
            .map(|t| t.to_string())
            .unwrap_or_else(|| format!("#{}", id.0))
    }
}

impl std::fmt::Debug for AutomatonRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutomatonRuntime")
            .field("state_count", &self.table.state_count())
            .field("transition_count", &self.table.transition_count())
            .field("current", &self.current)
            .field("stats", &self.stats)
            .finish()
    }
}
