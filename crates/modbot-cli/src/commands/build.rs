//! Build command implementation.

use anyhow::{Context, Result};
use modbot_automaton::{estimate_states, TableStore, TransitionTable};

use crate::commands::stats::print_stats;
use crate::config::Config;

/// Build the transition table and optionally store it.
pub fn execute(config: &Config, save: bool) -> Result<()> {
    let automaton_config = config.automaton_config();
    let estimated = estimate_states(automaton_config.units, &automaton_config.layout);

    println!(
        "🔧 Building transition table for {} units (~{} states)...",
        config.units, estimated
    );
    let table = TransitionTable::build(&automaton_config).context("Failed to build table")?;
    println!(
        "✅ Table built: {} states, {} transitions",
        table.state_count(),
        table.transition_count()
    );

    print_stats(&table.stats());

    if save {
        let store = TableStore::at(&config.store_dir);
        let path = store.save_table(&table)?;
        println!("💾 Saved to: {}", path.display());
    }

    Ok(())
}
