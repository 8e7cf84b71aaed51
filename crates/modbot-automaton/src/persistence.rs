//! Persistence for transition tables and runtime state.
//!
//! ## File Structure
//!
//! ```text
//! .modbot/
//! ├── table.json     # Enumerated states and every recorded transition
//! └── runtime.json   # Last known topology of a running session
//! ```
//!
//! A loaded table is checked before use: every transition is recomputed from
//! its source topology and must land on the recorded target. The decoder's
//! occupancy record is never persisted; a resumed session rebuilds it from
//! the first sample.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use modbot_core::{Action, PortLayout, Topology};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::AutomatonConfig;
use crate::error::{AutomatonError, AutomatonResult};
use crate::runtime::AutomatonRuntime;
use crate::space::{StateId, StateSpace};
use crate::table::TransitionTable;

/// Default name of the store folder.
pub const STORE_DIR: &str = ".modbot";

const TABLE_FILE: &str = "table.json";
const RUNTIME_FILE: &str = "runtime.json";

/// Current table format version.
pub const TABLE_FORMAT_VERSION: u32 = 1;

/// Metadata about a persisted table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Version of the persistence format.
    pub version: u32,

    /// Timestamp when the table was saved.
    pub saved_at: SystemTime,

    pub units: u8,
    pub layout: PortLayout,
    pub state_count: usize,
    pub action_count: usize,
    pub transition_count: usize,
}

/// One `(from, action, to)` entry; the action is wire-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTransition {
    pub from: u32,
    pub action: String,
    pub to: u32,
}

/// A table as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedTable {
    pub metadata: TableMetadata,

    /// States in id order; state 0 is the empty topology.
    pub states: Vec<Topology>,

    pub transitions: Vec<PersistedTransition>,
}

impl PersistedTable {
    pub fn from_table(table: &TransitionTable) -> Self {
        let transitions = table
            .transitions()
            .into_iter()
            .map(|(from, action, to)| PersistedTransition {
                from: from.0,
                action: action.to_string(),
                to: to.0,
            })
            .collect::<Vec<_>>();

        Self {
            metadata: TableMetadata {
                version: TABLE_FORMAT_VERSION,
                saved_at: SystemTime::now(),
                units: table.units(),
                layout: *table.layout(),
                state_count: table.state_count(),
                action_count: table.actions().len(),
                transition_count: transitions.len(),
            },
            states: table.space().states().to_vec(),
            transitions,
        }
    }

    /// Validate and rebuild the in-memory table.
    pub fn into_table(self) -> AutomatonResult<TransitionTable> {
        let PersistedTable {
            metadata,
            states,
            transitions,
        } = self;

        if metadata.version != TABLE_FORMAT_VERSION {
            return Err(invalid(format!(
                "unsupported format version {} (expected {})",
                metadata.version, TABLE_FORMAT_VERSION
            )));
        }
        if metadata.state_count != states.len() {
            return Err(invalid(format!(
                "metadata lists {} states, file has {}",
                metadata.state_count,
                states.len()
            )));
        }
        if metadata.transition_count != transitions.len() {
            return Err(invalid(format!(
                "metadata lists {} transitions, file has {}",
                metadata.transition_count,
                transitions.len()
            )));
        }

        AutomatonConfig {
            units: metadata.units,
            layout: metadata.layout,
            ..Default::default()
        }
        .validate()?;

        let space = StateSpace::from_states(metadata.units, metadata.layout, states)?;

        let mut map = HashMap::with_capacity(transitions.len());
        for (i, entry) in transitions.into_iter().enumerate() {
            let action: Action = entry.action.parse()?;
            let (from, to) = (StateId(entry.from), StateId(entry.to));

            let (Some(source), Some(target)) = (space.get(from), space.get(to)) else {
                return Err(invalid(format!(
                    "transition {} references a state outside 0..{}",
                    i,
                    space.len()
                )));
            };
            if action.validate(space.units(), space.layout()).is_err() {
                return Err(invalid(format!("transition {} uses forbidden action {}", i, action)));
            }
            if &source.apply(&action) != target {
                return Err(invalid(format!(
                    "transition {} ({} --{}--> {}) does not match its target",
                    i, from.0, action, to.0
                )));
            }
            if map.insert((from, action), to).is_some() {
                return Err(invalid(format!("transition {} repeats ({}, {})", i, from.0, action)));
            }
        }

        TransitionTable::from_parts(space, map)
    }
}

/// Last known topology of a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedRuntime {
    pub saved_at: SystemTime,
    pub units: u8,

    /// `None` when the runtime was detached.
    pub current: Option<Topology>,
}

fn invalid(message: String) -> AutomatonError {
    AutomatonError::InvalidTable { message }
}

/// Store manages table and runtime persistence within one folder.
#[derive(Debug, Clone)]
pub struct TableStore {
    dir: PathBuf,
}

impl TableStore {
    /// Store under `<root>/.modbot`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::at(root.as_ref().join(STORE_DIR))
    }

    /// Store directly in `dir`.
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn table_path(&self) -> PathBuf {
        self.dir.join(TABLE_FILE)
    }

    pub fn runtime_path(&self) -> PathBuf {
        self.dir.join(RUNTIME_FILE)
    }

    pub fn exists(&self) -> bool {
        self.dir.exists()
    }

    /// Create the store directory.
    pub fn init(&self) -> AutomatonResult<()> {
        if !self.dir.exists() {
            std::fs::create_dir_all(&self.dir)?;
            debug!(path = %self.dir.display(), "store_dir_created");
        }
        Ok(())
    }

    // =========================================================================
    // Table
    // =========================================================================

    /// Save a table, replacing any previous one.
    pub fn save_table(&self, table: &TransitionTable) -> AutomatonResult<PathBuf> {
        self.init()?;

        let persisted = PersistedTable::from_table(table);
        let path = self.table_path();
        let json = serde_json::to_string(&persisted)?;
        std::fs::write(&path, json)?;

        info!(
            path = %path.display(),
            units = persisted.metadata.units,
            states = persisted.metadata.state_count,
            transitions = persisted.metadata.transition_count,
            "table_saved"
        );
        Ok(path)
    }

    /// Load and validate the saved table. `Ok(None)` when none was saved.
    pub fn load_table(&self) -> AutomatonResult<Option<TransitionTable>> {
        let Some(persisted) = self.load_persisted_table()? else {
            return Ok(None);
        };
        let table = persisted.into_table()?;

        info!(
            path = %self.table_path().display(),
            units = table.units(),
            states = table.state_count(),
            transitions = table.transition_count(),
            "table_loaded"
        );
        Ok(Some(table))
    }

    /// Read the raw file without validating transitions.
    pub fn load_persisted_table(&self) -> AutomatonResult<Option<PersistedTable>> {
        let path = self.table_path();
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Metadata of the saved table, if any.
    pub fn table_metadata(&self) -> AutomatonResult<Option<TableMetadata>> {
        Ok(self.load_persisted_table()?.map(|t| t.metadata))
    }

    pub fn has_table(&self) -> bool {
        self.table_path().exists()
    }

    // =========================================================================
    // Runtime
    // =========================================================================

    /// Save the runtime's current topology.
    pub fn save_runtime(&self, runtime: &AutomatonRuntime) -> AutomatonResult<PathBuf> {
        self.init()?;

        let persisted = PersistedRuntime {
            saved_at: SystemTime::now(),
            units: runtime.table().units(),
            current: runtime.current_topology().cloned(),
        };
        let path = self.runtime_path();
        let json = serde_json::to_string_pretty(&persisted)?;
        std::fs::write(&path, json)?;

        debug!(path = %path.display(), "runtime_saved");
        Ok(path)
    }

    /// Load the saved runtime state. `Ok(None)` when none was saved.
    pub fn load_runtime(&self) -> AutomatonResult<Option<PersistedRuntime>> {
        let path = self.runtime_path();
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(&path)?;
        let persisted: PersistedRuntime = serde_json::from_str(&json)?;

        debug!(path = %path.display(), "runtime_loaded");
        Ok(Some(persisted))
    }

    /// A runtime over `table`, resumed at the saved topology when there is
    /// one for the same unit count. Otherwise the runtime starts empty.
    pub fn resume_runtime(&self, table: Arc<TransitionTable>) -> AutomatonResult<AutomatonRuntime> {
        let mut runtime = AutomatonRuntime::new(table);
        match self.load_runtime()? {
            Some(PersistedRuntime {
                units,
                current: Some(topology),
                ..
            }) if units == runtime.table().units() => {
                runtime.set_current(&topology)?;
                info!(topology = %topology, "runtime_resumed");
            }
            Some(saved) if saved.units != runtime.table().units() => {
                info!(
                    saved_units = saved.units,
                    units = runtime.table().units(),
                    "runtime_state_ignored"
                );
            }
            _ => {}
        }
        Ok(runtime)
    }

    pub fn has_runtime(&self) -> bool {
        self.runtime_path().exists()
    }

    /// Delete the store directory.
    pub fn clean(&self) -> AutomatonResult<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
            info!(path = %self.dir.display(), "store_cleaned");
        }
        Ok(())
    }
}
