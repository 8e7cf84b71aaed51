//! Run command implementation.
//!
//! Drives the control loop from a matrix line source. Ctrl+C stops the loop
//! before the next action; a blocked read finishes first.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use modbot_automaton::{
    AutomatonRuntime, ControlLoop, LineMatrixSource, RenderFormat, TableStore, WriterSink,
};

use crate::commands::{load_table, open_input};
use crate::config::Config;

/// Run until the source ends or the user interrupts.
pub fn execute(
    config: &Config,
    input: &Path,
    resume: bool,
    save: bool,
    format: RenderFormat,
) -> Result<()> {
    let source = LineMatrixSource::new(open_input(input)?, config.rows())
        .context("Invalid rows per sample")?;

    let table = load_table(config)?;
    let store = TableStore::at(&config.store_dir);
    let runtime = if resume {
        store.resume_runtime(Arc::clone(&table))?
    } else {
        AutomatonRuntime::new(table)
    };

    let sink = WriterSink::new(std::io::stdout(), format);

    // Set up Ctrl+C handler to stop between actions
    let cancelled = Arc::new(AtomicBool::new(false));
    let c = cancelled.clone();
    ctrlc::set_handler(move || {
        c.store(true, Ordering::SeqCst);
    })
    .ok();

    eprintln!(
        "▶️  Reading {} rows per sample from {} (settle {} ms)",
        config.rows(),
        input.display(),
        config.settle_ms
    );

    let mut control = ControlLoop::new(runtime, source, sink)
        .with_settle_delay(config.automaton_config().settle_delay())
        .with_cancel_flag(cancelled);

    let result = control.run();
    let runtime = control.into_runtime();

    // Keep the last good state even when the source failed
    if save {
        let path = store.save_runtime(&runtime)?;
        eprintln!("💾 Saved runtime state to: {}", path.display());
    }

    let summary =
        result.with_context(|| format!("Control loop failed reading {}", input.display()))?;
    if summary.cancelled {
        eprintln!("⏸  Interrupted");
    }
    eprintln!(
        "📈 {} samples, {} applied, {} unknown, {} forbidden",
        summary.samples,
        summary.stats.transitioned,
        summary.stats.unknown,
        summary.stats.forbidden
    );
    Ok(())
}
