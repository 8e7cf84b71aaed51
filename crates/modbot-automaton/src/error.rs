//! Error types for the automaton system.

use modbot_core::{ActionParseError, TopologyError};
use thiserror::Error;

/// Result type alias for automaton operations.
pub type AutomatonResult<T> = Result<T, AutomatonError>;

/// Errors that can occur during automaton operations.
///
/// A missing transition is not an error; see [`crate::StepOutcome`].
#[derive(Debug, Error)]
pub enum AutomatonError {
    /// An action was performed before the runtime had a current state.
    #[error("no current state: the runtime must be initialized before performing actions")]
    NoCurrentState,

    /// The requested unit count exceeds the configured limit.
    #[error("{units} units exceeds the limit of {max_units} (estimated {estimated_states} states)")]
    UnitLimitExceeded {
        units: u8,
        max_units: u8,
        estimated_states: u128,
    },

    /// The estimated state space exceeds the configured limit.
    #[error("estimated {estimated_states} states exceeds the limit of {max_states}")]
    StateLimitExceeded {
        estimated_states: u128,
        max_states: u64,
    },

    /// The port layout cannot be used (e.g. too many ports for the sensor encoding).
    #[error("invalid port layout: {message}")]
    InvalidLayout { message: String },

    /// A topology is not a member of the transition table.
    #[error("state {state} is not in the transition table")]
    UnknownState { state: String },

    /// The connectivity matrix is not usable.
    #[error("malformed connectivity matrix: {message}")]
    MalformedMatrix { message: String },

    /// The matrix source ended in the middle of a sample.
    #[error("short read: expected {expected} rows, got {received}")]
    ShortRead { expected: usize, received: usize },

    /// A persisted table is inconsistent.
    #[error("invalid transition table: {message}")]
    InvalidTable { message: String },

    /// Action text could not be parsed.
    #[error("action parse error: {0}")]
    ActionParse(#[from] ActionParseError),

    /// Topology construction or validation error.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// State serialization/deserialization error.
    #[error("state serialization error: {0}")]
    StateSerialization(#[from] serde_json::Error),

    /// I/O error (file and device operations).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
