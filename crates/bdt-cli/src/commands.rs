//! Command implementations.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use bdt_batch::{run_sweep, SizingCandidate, SweepMethod, SweepRunnerConfig};
use bdt_core::ExogenousSeries;
use bdt_opt::{
    attribute_value, solve_month, solve_sequential, MonthlyConfig, SolverSettings, Summary,
    Trajectory,
};
use bdt_scenarios::{load_spec_from_path, presets, ScenarioSpec};
use bdt_sim::{RollingConfig, RollingController};
use tabwriter::TabWriter;
use tracing::info;

use crate::cli::ScenarioCommands;

fn solver_settings(timeout: Option<f64>) -> SolverSettings {
    SolverSettings {
        time_limit: timeout.map(Duration::from_secs_f64),
        ..SolverSettings::default()
    }
}

fn load_scenario(path: &Path) -> Result<(ScenarioSpec, ExogenousSeries)> {
    let spec = load_spec_from_path(path)?;
    let series = spec
        .materialize()
        .with_context(|| format!("materializing scenario '{}'", spec.name))?;
    Ok((spec, series))
}

pub fn run_monthly(
    scenario: &Path,
    out_dir: Option<&Path>,
    attribution: bool,
    timeout: Option<f64>,
) -> Result<()> {
    let (spec, series) = load_scenario(scenario)?;
    let config = MonthlyConfig {
        battery: spec.battery.clone(),
        tariff: spec.tariff.clone(),
        limits: spec.limits,
        solver: solver_settings(timeout),
        initial_soc: spec.initial_soc,
    };

    let solution = solve_sequential(&series, &config)?;
    print_summary(&spec.name, &solution.summary)?;
    let lp_objective: f64 = solution.months.iter().map(|m| m.window.objective).sum();
    println!("LP objective (incremental tariff basis): {:.2}", lp_objective);

    if attribution {
        let grid = series.grid();
        if grid.month_index(0) != grid.month_index(grid.len() - 1) {
            bail!("attribution is defined for single-month horizons only");
        }
        let monthly = solve_month(&series, &config)?;
        let report = attribute_value(&series, &config, &monthly)?;
        print_attribution(&report)?;
    }

    if let Some(dir) = out_dir {
        write_outputs(dir, &solution.trajectory, &solution.summary)?;
    }
    Ok(())
}

pub fn run_rolling(
    scenario: &Path,
    window_hours: usize,
    commit_steps: usize,
    out_dir: Option<&Path>,
    timeout: Option<f64>,
) -> Result<()> {
    let (spec, series) = load_scenario(scenario)?;
    let window_steps = window_hours * series.grid().resolution().steps_per_hour();
    let config = RollingConfig {
        commit_steps,
        solver: solver_settings(timeout),
        initial_soc: spec.initial_soc,
        ..RollingConfig::new(window_steps)
    };

    let controller = RollingController::new(
        &series,
        spec.battery.clone(),
        spec.tariff.clone(),
        spec.limits,
        config,
    )?;
    let outcome = controller.run()?;

    print_summary(&spec.name, &outcome.summary)?;
    info!(
        solves = outcome.solves,
        safe_mode_steps = outcome.safe_mode_steps,
        warnings = outcome.diagnostics.warning_count(),
        "rolling simulation finished"
    );
    for issue in &outcome.diagnostics.issues {
        eprintln!("{}", issue);
    }

    if let Some(dir) = out_dir {
        write_outputs(dir, &outcome.trajectory, &outcome.summary)?;
    }
    Ok(())
}

pub fn run_sizing_sweep(
    scenario: &Path,
    capacities: &[f64],
    powers: &[f64],
    rolling_window_hours: Option<usize>,
    out_dir: &Path,
    threads: usize,
) -> Result<()> {
    if capacities.len() != powers.len() || capacities.is_empty() {
        bail!(
            "--capacities and --powers must be non-empty lists of equal length \
             (got {} and {})",
            capacities.len(),
            powers.len()
        );
    }
    let (spec, series) = load_scenario(scenario)?;

    let candidates: Vec<SizingCandidate> = capacities
        .iter()
        .zip(powers)
        .map(|(c, p)| SizingCandidate {
            capacity_kwh: *c,
            power_kw: *p,
        })
        .collect();
    let method = match rolling_window_hours {
        Some(hours) => SweepMethod::Rolling {
            window_steps: hours * series.grid().resolution().steps_per_hour(),
        },
        None => SweepMethod::Deterministic,
    };

    let outcome = run_sweep(
        &series,
        &SweepRunnerConfig {
            candidates,
            battery_template: spec.battery.clone(),
            tariff: spec.tariff.clone(),
            limits: spec.limits,
            solver: SolverSettings::default(),
            initial_soc: spec.initial_soc,
            method,
            output_root: out_dir.to_path_buf(),
            threads,
        },
    )?;

    let mut tw = TabWriter::new(std::io::stdout());
    writeln!(tw, "job\tcapacity kWh\tpower kW\tcost\tsavings\tcycles")?;
    for job in &outcome.jobs {
        writeln!(
            tw,
            "{}\t{:.0}\t{:.0}\t{:.2}\t{:.2}\t{:.2}",
            job.job_id,
            job.capacity_kwh,
            job.power_kw,
            job.total_cost,
            job.savings,
            job.equivalent_full_cycles
        )?;
    }
    tw.flush()?;
    println!(
        "{} ok, {} failed; baseline cost {:.2}; manifest at {}",
        outcome.success,
        outcome.failure,
        outcome.baseline_cost,
        outcome.manifest_path.display()
    );
    Ok(())
}

pub fn run_scenario(command: &ScenarioCommands) -> Result<()> {
    match command {
        ScenarioCommands::List => {
            for (name, description) in preset_catalog() {
                println!("{:<26} {}", name, description);
            }
            Ok(())
        }
        ScenarioCommands::Materialize { preset, out_dir } => {
            let spec = preset_by_name(preset)?;
            fs::create_dir_all(out_dir)
                .with_context(|| format!("creating '{}'", out_dir.display()))?;

            let spec_path = out_dir.join(format!("{}.toml", spec.name));
            fs::write(&spec_path, toml::to_string_pretty(&spec)?)
                .with_context(|| format!("writing '{}'", spec_path.display()))?;

            let series = spec.materialize()?;
            let csv_path = out_dir.join(format!("{}.csv", spec.name));
            write_series_csv(&csv_path, &series)?;
            println!(
                "wrote {} and {}",
                spec_path.display(),
                csv_path.display()
            );
            Ok(())
        }
    }
}

fn preset_catalog() -> Vec<(&'static str, &'static str)> {
    vec![
        ("no-battery-reference", "constant load, unit price, no battery"),
        ("pure-peak-shaving", "morning load spike under a demand tariff"),
        ("pure-arbitrage", "cheap nights, expensive afternoons, no tariff"),
        ("curtailment-avoidance", "midday PV above the export cap"),
        ("two-month-peaks", "61-day horizon with separated load peaks"),
        ("degradation-sensitivity", "arbitrage with LFP aging costs"),
    ]
}

fn preset_by_name(name: &str) -> Result<ScenarioSpec> {
    match name {
        "no-battery-reference" => Ok(presets::no_battery_reference()),
        "pure-peak-shaving" => Ok(presets::pure_peak_shaving()),
        "pure-arbitrage" => Ok(presets::pure_arbitrage()),
        "curtailment-avoidance" => Ok(presets::curtailment_avoidance()),
        "two-month-peaks" => Ok(presets::two_month_peaks()),
        "degradation-sensitivity" => Ok(presets::degradation_sensitivity(500.0)),
        other => Err(anyhow!(
            "unknown preset '{}'; run `bdt scenario list`",
            other
        )),
    }
}

fn print_summary(name: &str, summary: &Summary) -> Result<()> {
    let mut tw = TabWriter::new(std::io::stdout());
    writeln!(tw, "scenario\t{}", name)?;
    writeln!(tw, "steps\t{}", summary.steps)?;
    writeln!(tw, "energy cost\t{:.2}", summary.energy_cost)?;
    writeln!(tw, "power tariff (exact)\t{:.2}", summary.power_tariff_exact)?;
    writeln!(tw, "degradation cost\t{:.2}", summary.degradation_cost)?;
    writeln!(tw, "total cost\t{:.2}", summary.total_cost)?;
    writeln!(
        tw,
        "equivalent full cycles\t{:.2}",
        summary.equivalent_full_cycles
    )?;
    for peak in &summary.month_peaks {
        writeln!(
            tw,
            "peak {}-{:02}\t{:.2} kW (billed {:.2})",
            peak.year, peak.month, peak.peak_kw, peak.tariff_cost
        )?;
    }
    tw.flush()?;
    Ok(())
}

fn print_attribution(report: &bdt_opt::AttributionReport) -> Result<()> {
    let mut tw = TabWriter::new(std::io::stdout());
    writeln!(tw, "baseline cost\t{:.2}", report.baseline_cost)?;
    writeln!(tw, "optimized cost\t{:.2}", report.optimized_cost)?;
    writeln!(tw, "total savings\t{:.2}", report.total_savings)?;
    writeln!(tw, "  peak shaving\t{:.2}", report.peak_shaving)?;
    writeln!(
        tw,
        "  curtailment avoidance\t{:.2}",
        report.curtailment_avoidance
    )?;
    writeln!(tw, "  arbitrage\t{:.2}", report.arbitrage)?;
    writeln!(tw, "  self-consumption\t{:.2}", report.self_consumption)?;
    writeln!(tw, "  degradation cost\t-{:.2}", report.degradation_cost)?;
    tw.flush()?;
    Ok(())
}

fn write_outputs(dir: &Path, trajectory: &Trajectory, summary: &Summary) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating '{}'", dir.display()))?;
    write_trajectory_csv(&dir.join("trajectory.csv"), trajectory)?;
    let summary_path = dir.join("summary.json");
    fs::write(&summary_path, serde_json::to_string_pretty(summary)?)
        .with_context(|| format!("writing '{}'", summary_path.display()))?;
    Ok(())
}

/// Columnar trajectory table: one row per committed step.
fn write_trajectory_csv(path: &PathBuf, trajectory: &Trajectory) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating '{}'", path.display()))?;
    writer.write_record([
        "timestamp",
        "charge_kw",
        "discharge_kw",
        "grid_import_kw",
        "grid_export_kw",
        "soc_kwh",
        "curtail_kw",
        "price_import",
        "step_cost",
    ])?;
    for t in 0..trajectory.len() {
        let r = trajectory.record(t);
        writer.write_record([
            r.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string(),
            format!("{:.6}", r.charge_kw),
            format!("{:.6}", r.discharge_kw),
            format!("{:.6}", r.import_kw),
            format!("{:.6}", r.export_kw),
            format!("{:.6}", r.soc_kwh),
            format!("{:.6}", r.curtail_kw),
            format!("{:.6}", r.price_import),
            format!("{:.6}", r.step_cost),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_series_csv(path: &Path, series: &ExogenousSeries) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("creating '{}'", path.display()))?;
    writer.write_record([
        "timestamp",
        "pv_kw",
        "load_kw",
        "price_import",
        "price_export",
        "tou_peak",
    ])?;
    let grid = series.grid();
    for t in 0..series.len() {
        writer.write_record([
            grid.timestamp(t).format("%Y-%m-%dT%H:%M:%S").to_string(),
            format!("{:.6}", series.pv_kw()[t]),
            format!("{:.6}", series.load_kw()[t]),
            format!("{:.6}", series.price_import()[t]),
            format!("{:.6}", series.price_export()[t]),
            series.tou_peak()[t].to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}
