use clap::Parser;
use tracing_subscriber::FmtSubscriber;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match &cli.command {
        Commands::Monthly {
            scenario,
            out_dir,
            attribution,
            timeout,
        } => commands::run_monthly(scenario, out_dir.as_deref(), *attribution, *timeout),
        Commands::Rolling {
            scenario,
            window_hours,
            commit_steps,
            out_dir,
            timeout,
        } => commands::run_rolling(
            scenario,
            *window_hours,
            *commit_steps,
            out_dir.as_deref(),
            *timeout,
        ),
        Commands::Sweep {
            scenario,
            capacities,
            powers,
            rolling_window_hours,
            out_dir,
            threads,
        } => commands::run_sizing_sweep(
            scenario,
            capacities,
            powers,
            *rolling_window_hours,
            out_dir,
            *threads,
        ),
        Commands::Scenario { command } => commands::run_scenario(command),
    }
}
