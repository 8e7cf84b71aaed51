//! Stats command implementation.

use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use modbot_automaton::{TableStats, TableStore};

use crate::config::Config;

/// Show stats for the stored table.
pub fn execute(config: &Config, json: bool) -> Result<()> {
    let store = TableStore::at(&config.store_dir);
    let table = store
        .load_table()
        .with_context(|| format!("Failed to load {}", store.table_path().display()))?;

    let Some(table) = table else {
        anyhow::bail!(
            "No table stored in {}. Run `modbot build` first.",
            store.dir().display()
        );
    };
    let stats = table.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("📊 Transition table: {}", store.table_path().display());
    if let Some(metadata) = store.table_metadata()? {
        if let Ok(age) = metadata.saved_at.duration_since(UNIX_EPOCH) {
            println!("   Saved at: {} (unix seconds)", age.as_secs());
        }
    }
    print_stats(&stats);
    Ok(())
}

pub fn print_stats(stats: &TableStats) {
    println!("   Units:          {}", stats.units);
    println!("   States:         {}", stats.states);
    println!("   Actions:        {}", stats.actions);
    println!("   Transitions:    {}", stats.transitions);
    println!("   Max out-degree: {}", stats.max_out_degree);
    println!("   Dead ends:      {}", stats.dead_ends);
}
