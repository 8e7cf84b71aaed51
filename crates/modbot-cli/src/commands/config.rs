//! Config command implementation.
//!
//! Manages CLI configuration.

use std::path::PathBuf;

use anyhow::Result;

use crate::config::Config;

const KEYS: &str = "units, max-units, max-states, rows, settle-ms, store-dir, parallel";

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("modbot CLI Configuration");
    println!("{:-<40}", "");

    println!("Units:            {}", config.units);
    println!("Max Units:        {}", config.max_units);
    println!("Max States:       {}", config.max_states);
    println!(
        "Rows per Sample:  {}{}",
        config.rows(),
        if config.rows.is_none() { " (units)" } else { "" }
    );
    println!("Settle Delay:     {} ms", config.settle_ms);
    println!("Store Directory:  {}", config.store_dir.display());
    println!("Parallel Build:   {}", config.parallel);

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }

    Ok(())
}

/// Set a configuration value.
pub fn set(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "units" => config.units = value.parse()?,
        "max-units" => config.max_units = value.parse()?,
        "max-states" => config.max_states = value.parse()?,
        "rows" => config.rows = Some(value.parse()?),
        "settle-ms" | "settle" => config.settle_ms = value.parse()?,
        "store-dir" => config.store_dir = PathBuf::from(value),
        "parallel" => config.parallel = value.parse()?,
        _ => {
            anyhow::bail!("Unknown config key: {}. Valid keys: {}", key, KEYS);
        }
    }
    println!("Set {} to: {}", key, value);

    config.save()?;
    Ok(())
}

/// Get a configuration value.
pub fn get(config: &Config, key: &str) -> Result<()> {
    let value = match key {
        "units" => config.units.to_string(),
        "max-units" => config.max_units.to_string(),
        "max-states" => config.max_states.to_string(),
        "rows" => config.rows().to_string(),
        "settle-ms" | "settle" => config.settle_ms.to_string(),
        "store-dir" => config.store_dir.display().to_string(),
        "parallel" => config.parallel.to_string(),
        _ => {
            anyhow::bail!("Unknown config key: {}. Valid keys: {}", key, KEYS);
        }
    };

    println!("{}", value);
    Ok(())
}

/// Reset configuration to defaults.
pub fn reset() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults");
    Ok(())
}

/// Show path to config file.
pub fn path() {
    match Config::config_file_path() {
        Some(path) => println!("{}", path.display()),
        None => println!("(no config directory available)"),
    }
}
