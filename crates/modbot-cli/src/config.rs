//! CLI configuration management.
//!
//! Precedence, lowest first: built-in defaults, the JSON config file,
//! `.env`/environment variables, then command-line flags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use modbot_automaton::{AutomatonConfig, STORE_DIR};
use serde::{Deserialize, Serialize};

/// Application-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of robot units.
    pub units: u8,

    /// Largest unit count the table builder accepts.
    pub max_units: u8,

    /// Largest estimated state count the table builder accepts.
    pub max_states: u64,

    /// Rows per matrix sample. Defaults to one row per unit.
    pub rows: Option<usize>,

    /// Pause after each applied action in the control loop.
    pub settle_ms: u64,

    /// Where the table and runtime state are stored.
    pub store_dir: PathBuf,

    /// Build tables on the rayon thread pool.
    pub parallel: bool,
}

impl Default for Config {
    fn default() -> Self {
        let automaton = AutomatonConfig::default();
        Self {
            units: automaton.units,
            max_units: automaton.max_units,
            max_states: automaton.max_states,
            rows: None,
            settle_ms: automaton.settle_ms,
            store_dir: PathBuf::from(STORE_DIR),
            parallel: automaton.parallel,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Result<Option<T>>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Load configuration from the config file and environment variables.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let mut config = Self::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path).with_context(|| {
                    format!("Failed to read config from {}", config_path.display())
                })?;
                config = serde_json::from_str(&contents)
                    .with_context(|| "Failed to parse config file")?;
            }
        }

        // Environment overrides the file
        if let Some(units) = env_parse("MODBOT_UNITS")? {
            config.units = units;
        }
        if let Some(max_units) = env_parse("MODBOT_MAX_UNITS")? {
            config.max_units = max_units;
        }
        if let Some(max_states) = env_parse("MODBOT_MAX_STATES")? {
            config.max_states = max_states;
        }
        if let Some(rows) = env_parse("MODBOT_ROWS")? {
            config.rows = Some(rows);
        }
        if let Some(settle_ms) = env_parse("MODBOT_SETTLE_MS")? {
            config.settle_ms = settle_ms;
        }
        if let Ok(store_dir) = std::env::var("MODBOT_STORE_DIR") {
            config.store_dir = PathBuf::from(store_dir);
        }

        Ok(config)
    }

    /// Save current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        if let Some(config_path) = Self::config_file_path() {
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create config directory: {}", parent.display())
                })?;
            }
            let contents = serde_json::to_string_pretty(self)?;
            std::fs::write(&config_path, contents)
                .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
        }
        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_file_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "modbot", "modbot")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }

    /// Rows per matrix sample.
    pub fn rows(&self) -> usize {
        self.rows.unwrap_or(usize::from(self.units))
    }

    /// Library configuration for table building and the control loop.
    pub fn automaton_config(&self) -> AutomatonConfig {
        AutomatonConfig {
            units: self.units,
            max_units: self.max_units,
            max_states: self.max_states,
            parallel: self.parallel,
            settle_ms: self.settle_ms,
            ..AutomatonConfig::default()
        }
    }
}
