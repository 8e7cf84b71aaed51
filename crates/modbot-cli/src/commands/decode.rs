//! Decode command implementation.

use std::path::Path;

use anyhow::{Context, Result};
use modbot_automaton::{LineMatrixSource, MatrixDecoder, MatrixSource};
use serde::Serialize;

use crate::commands::open_input;
use crate::config::Config;

#[derive(Debug, Serialize)]
struct DecodedSample {
    sample: usize,
    actions: Vec<String>,
}

/// Decode every sample in `file` against one occupancy record.
pub fn execute(config: &Config, file: &Path, json: bool) -> Result<()> {
    let mut source = LineMatrixSource::new(open_input(file)?, config.rows())
        .context("Invalid rows per sample")?;
    let mut decoder = MatrixDecoder::new();
    let mut decoded = Vec::new();

    loop {
        let sample = decoded.len();
        let matrix = source
            .next_matrix()
            .with_context(|| format!("Failed to read sample {} of {}", sample, file.display()))?;
        let Some(matrix) = matrix else {
            break;
        };
        let actions = decoder.decode(&matrix);
        decoded.push(DecodedSample {
            sample,
            actions: actions.iter().map(ToString::to_string).collect(),
        });
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&decoded)?);
        return Ok(());
    }

    for sample in &decoded {
        println!("sample {}:", sample.sample);
        if sample.actions.is_empty() {
            println!("   (no change)");
        }
        for action in &sample.actions {
            println!("   {}", action);
        }
    }
    println!(
        "🔍 {} samples, {} ports occupied",
        decoded.len(),
        decoder.occupancy().len()
    );
    Ok(())
}
