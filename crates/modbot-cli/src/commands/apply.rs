//! Apply command implementation.
//!
//! Replays wire-encoded actions through the runtime, one outcome per line.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use modbot_automaton::{
    render_dot, render_text, AutomatonRuntime, RenderFormat, StepOutcome, TableStore,
};

use crate::commands::{load_table, open_input};
use crate::config::Config;

/// Read action lines from `file`, skipping blanks and `#` comments.
fn read_actions(file: &Path) -> Result<Vec<String>> {
    let reader = open_input(file)?;
    let mut actions = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed to read {}", file.display()))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        actions.push(line.to_string());
    }
    Ok(actions)
}

/// Apply actions from a file and/or the command line.
pub fn execute(
    config: &Config,
    file: Option<PathBuf>,
    extra: Vec<String>,
    resume: bool,
    save: bool,
    format: RenderFormat,
) -> Result<()> {
    let mut lines = match &file {
        Some(file) => read_actions(file)?,
        None => Vec::new(),
    };
    lines.extend(extra);

    if lines.is_empty() {
        anyhow::bail!("No actions given. Pass a file or use --action <ACTION>.");
    }

    let table = load_table(config)?;
    let store = TableStore::at(&config.store_dir);
    let mut runtime = if resume {
        store.resume_runtime(Arc::clone(&table))?
    } else {
        AutomatonRuntime::new(table)
    };

    for line in &lines {
        match runtime.perform_text(line)? {
            StepOutcome::Transitioned { from, to, .. } => {
                if from == to {
                    println!("✅ {} (no change)", line);
                } else {
                    println!("✅ {}", line);
                }
            }
            StepOutcome::Unknown { .. } => {
                println!("⚠️  {} -> no transition (unknown)", line);
            }
            StepOutcome::Forbidden { violation, .. } => {
                println!("⛔ {} -> forbidden: {}", line, violation);
            }
            StepOutcome::Malformed { error, .. } => {
                println!("❓ {} -> skipped: {}", line, error);
            }
        }
    }

    let stats = runtime.stats();
    println!();
    println!(
        "📈 {} applied, {} unknown, {} forbidden, {} malformed",
        stats.transitioned, stats.unknown, stats.forbidden, stats.malformed
    );

    if let Some(topology) = runtime.current_topology() {
        println!();
        match format {
            RenderFormat::Text => print!("{}", render_text(topology)),
            RenderFormat::Dot => print!("{}", render_dot(topology)),
        }
    }

    if save {
        let path = store.save_runtime(&runtime)?;
        println!("💾 Saved runtime state to: {}", path.display());
    }

    Ok(())
}
