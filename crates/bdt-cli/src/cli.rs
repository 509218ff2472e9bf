//! Command-line interface definition.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Battery dispatch optimization toolkit", long_about = None)]
pub struct Cli {
    /// Set the logging level
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Perfect-foresight monthly optimization over a scenario horizon
    Monthly {
        /// Path to a scenario spec (TOML or JSON)
        #[arg(long)]
        scenario: PathBuf,
        /// Directory for the trajectory CSV and summary JSON
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Also print the dual-variable savings attribution (single-month
        /// horizons only)
        #[arg(long)]
        attribution: bool,
        /// Per-solve wall-clock budget in seconds
        #[arg(long)]
        timeout: Option<f64>,
    },
    /// Rolling-horizon simulation with a receding optimization window
    Rolling {
        /// Path to a scenario spec (TOML or JSON)
        #[arg(long)]
        scenario: PathBuf,
        /// Optimization window length in hours
        #[arg(long, default_value_t = 24)]
        window_hours: usize,
        /// Steps of each solution to commit before re-solving
        #[arg(long, default_value_t = 1)]
        commit_steps: usize,
        /// Directory for the trajectory CSV and summary JSON
        #[arg(long)]
        out_dir: Option<PathBuf>,
        /// Per-solve wall-clock budget in seconds
        #[arg(long)]
        timeout: Option<f64>,
    },
    /// Parallel battery-sizing sweep
    Sweep {
        /// Path to a scenario spec (TOML or JSON); its battery acts as the
        /// template for non-size parameters
        #[arg(long)]
        scenario: PathBuf,
        /// Candidate capacities in kWh, comma-separated
        #[arg(long, value_delimiter = ',')]
        capacities: Vec<f64>,
        /// Candidate power limits in kW, comma-separated (zipped with
        /// capacities)
        #[arg(long, value_delimiter = ',')]
        powers: Vec<f64>,
        /// Use the rolling engine with this window length in hours instead
        /// of perfect foresight
        #[arg(long)]
        rolling_window_hours: Option<usize>,
        /// Output directory for the sweep manifest
        #[arg(long, default_value = "sweep-out")]
        out_dir: PathBuf,
        /// Worker threads (0 = auto)
        #[arg(long, default_value_t = 0)]
        threads: usize,
    },
    /// Scenario utilities: list presets or materialize one to files
    Scenario {
        #[command(subcommand)]
        command: ScenarioCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ScenarioCommands {
    /// List the built-in benchmark scenarios
    List,
    /// Write a preset scenario spec (TOML) and its materialized series
    /// (CSV)
    Materialize {
        /// Preset name (see `scenario list`)
        #[arg(long)]
        preset: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}
