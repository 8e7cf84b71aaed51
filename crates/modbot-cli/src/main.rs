//! modbot CLI - build and drive the connectivity automaton of a modular robot.
//!
//! The transition table is built once and stored under `.modbot/`; the other
//! commands load it (or build it in memory when none is stored).

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::config as config_cmd;
use config::Config;

/// modbot - connectivity automaton for modular robots.
///
/// Run `modbot build` once, then `modbot run` to follow the sensor matrix.
#[derive(Parser, Debug)]
#[command(
    name = "modbot",
    author,
    version,
    about = "modbot: topology automaton for modular robots",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory holding the stored table and runtime state.
    #[arg(long, global = true, env = "MODBOT_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Number of robot units (overrides config).
    #[arg(short = 'n', long, global = true)]
    units: Option<u8>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Enumerate the state space, build the transition table and store it.
    Build {
        /// Largest estimated state count to accept.
        #[arg(long)]
        max_states: Option<u64>,

        /// Build on a single thread.
        #[arg(long)]
        sequential: bool,

        /// Print stats without storing the table.
        #[arg(long)]
        no_save: bool,
    },

    /// Show stats for the stored table (default command).
    Stats {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Apply wire-encoded actions and print each outcome.
    ///
    /// Actions come from a file (one per line, `#` comments allowed) and/or
    /// repeated `--action` flags. Malformed lines are reported and skipped.
    Apply {
        /// File of actions, or `-` for stdin.
        file: Option<PathBuf>,

        /// Action to apply (can be specified multiple times).
        #[arg(short, long = "action")]
        actions: Vec<String>,

        /// Start from the stored runtime state instead of the empty topology.
        #[arg(long)]
        resume: bool,

        /// Store the final state for later `--resume` or `run`.
        #[arg(long)]
        save: bool,

        /// Rendering of the final topology: text or dot.
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Decode matrix samples into actions without touching the automaton.
    Decode {
        /// File of comma-separated matrix rows, or `-` for stdin.
        file: PathBuf,

        /// Rows per sample (defaults to the unit count).
        #[arg(long)]
        rows: Option<usize>,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Run the control loop over a matrix source until it ends or Ctrl+C.
    Run {
        /// Matrix source: file, device path, or `-` for stdin.
        #[arg(default_value = "-")]
        input: PathBuf,

        /// Rows per sample (defaults to the unit count).
        #[arg(long)]
        rows: Option<usize>,

        /// Pause after each applied action, in milliseconds.
        #[arg(long)]
        settle_ms: Option<u64>,

        /// Ignore the stored runtime state and start disconnected.
        #[arg(long)]
        fresh: bool,

        /// Do not store the final runtime state.
        #[arg(long)]
        no_save: bool,

        /// Rendering of each new topology: text or dot.
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Configuration key.
        key: String,
        /// Configuration value.
        value: String,
    },

    /// Get a configuration value.
    Get {
        /// Configuration key.
        key: String,
    },

    /// Reset configuration to defaults.
    Reset,

    /// Show path to config file.
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN // Default to less noise
    };

    let subscriber = tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    // RUST_LOG wins over the verbosity flags
    if std::env::var_os("RUST_LOG").is_some() {
        subscriber.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        subscriber.with_max_level(level).init();
    }

    // Load configuration, then apply global flags
    let mut config = Config::load()?;
    if let Some(store_dir) = cli.store_dir {
        config.store_dir = store_dir;
    }
    if let Some(units) = cli.units {
        config.units = units;
    }

    let command = cli.command.unwrap_or(Commands::Stats { json: false });

    match command {
        Commands::Build {
            max_states,
            sequential,
            no_save,
        } => {
            if let Some(max_states) = max_states {
                config.max_states = max_states;
            }
            if sequential {
                config.parallel = false;
            }
            commands::build::execute(&config, !no_save)?;
        }

        Commands::Stats { json } => {
            commands::stats::execute(&config, json)?;
        }

        Commands::Apply {
            file,
            actions,
            resume,
            save,
            format,
        } => {
            let format = commands::parse_format(&format)?;
            commands::apply::execute(&config, file, actions, resume, save, format)?;
        }

        Commands::Decode { file, rows, json } => {
            if rows.is_some() {
                config.rows = rows;
            }
            commands::decode::execute(&config, &file, json)?;
        }

        Commands::Run {
            input,
            rows,
            settle_ms,
            fresh,
            no_save,
            format,
        } => {
            if rows.is_some() {
                config.rows = rows;
            }
            if let Some(settle_ms) = settle_ms {
                config.settle_ms = settle_ms;
            }
            let format = commands::parse_format(&format)?;
            commands::run::execute(&config, &input, !fresh, !no_save, format)?;
        }

        Commands::Config(config_cmd_inner) => match config_cmd_inner {
            ConfigCommands::Show => config_cmd::show(&config)?,
            ConfigCommands::Set { key, value } => config_cmd::set(&mut config, &key, &value)?,
            ConfigCommands::Get { key } => config_cmd::get(&config, &key)?,
            ConfigCommands::Reset => config_cmd::reset()?,
            ConfigCommands::Path => config_cmd::path(),
        },
    }

    Ok(())
}
