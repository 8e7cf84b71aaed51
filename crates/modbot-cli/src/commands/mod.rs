//! CLI command implementations.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use modbot_automaton::{RenderFormat, TableStore, TransitionTable};
use tracing::info;

use crate::config::Config;

pub mod apply;
pub mod build;
pub mod config;
pub mod decode;
pub mod run;
pub mod stats;

/// Parse a `--format` value.
pub fn parse_format(raw: &str) -> Result<RenderFormat> {
    raw.parse().map_err(anyhow::Error::msg)
}

/// Open a file, or stdin for `-`.
pub fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufReader::new(std::io::stdin())));
    }
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// The stored table when it matches the configured unit count, otherwise a
/// freshly built one (not stored).
pub fn load_table(config: &Config) -> Result<Arc<TransitionTable>> {
    let store = TableStore::at(&config.store_dir);

    if let Some(metadata) = store.table_metadata()? {
        if metadata.units == config.units {
            let table = store
                .load_table()
                .with_context(|| format!("Failed to load {}", store.table_path().display()))?
                .context("Stored table disappeared while loading")?;
            return Ok(Arc::new(table));
        }
        info!(
            stored_units = metadata.units,
            units = config.units,
            "stored_table_unit_mismatch"
        );
    }

    eprintln!(
        "⚙️  No stored table for {} units; building in memory (`modbot build` stores one)",
        config.units
    );
    let table = TransitionTable::build(&config.automaton_config())?;
    Ok(Arc::new(table))
}
