//! Connectivity automaton for a modular reconfigurable robot.
//!
//! The robot's physical configuration is a [`Topology`](modbot_core::Topology).
//! Every reachable configuration is enumerated ahead of time, and every
//! connect/disconnect action is precomputed into a [`TransitionTable`]. At run
//! time a sensor matrix is sampled, decoded into actions, and each action moves
//! the [`AutomatonRuntime`] by table lookup.
//!
//! ## Core Concepts
//!
//! - **StateSpace**: The duplicate-free list of enumerated topologies
//! - **TransitionTable**: `(state, action) -> state`, immutable once built
//! - **AutomatonRuntime**: The current state plus outcome counters
//! - **MatrixDecoder**: Diffs sensor samples against an occupancy record
//! - **ControlLoop**: Source → decoder → runtime → sink
//!
//! ## The Pipeline
//!
//! ```text
//! MatrixSource ──> MatrixDecoder ──> AutomatonRuntime ──> TopologySink
//!  (rows of u8)     (Vec<Action>)     (table lookup)      (render/log)
//! ```
//!
//! A missing transition is an ordinary [`StepOutcome`], split into
//! `Unknown` (well-formed, never enumerated) and `Forbidden` (breaks the port
//! model). Only acting without a current state is an error.

pub mod config;
pub mod control;
pub mod decoder;
mod error;
pub mod persistence;
pub mod runtime;
pub mod sink;
pub mod source;
pub mod space;
pub mod table;

pub use config::AutomatonConfig;
pub use control::{ControlLoop, LoopSummary, SampleReport};
pub use decoder::{pack_target, unpack_target, Cell, ConnectivityMatrix, MatrixDecoder};
pub use error::{AutomatonError, AutomatonResult};
pub use runtime::{AutomatonRuntime, RuntimeStats, StepOutcome};
pub use sink::{render_dot, render_text, LogSink, RenderFormat, TopologySink, WriterSink};
pub use source::{LineMatrixSource, MatrixSource, ReplaySource};
pub use space::{estimate_states, StateId, StateSpace};
pub use table::{Lookup, TableStats, TransitionTable};

// Persistence
pub use persistence::{
    PersistedRuntime, PersistedTable, PersistedTransition, TableMetadata, TableStore, STORE_DIR,
};
