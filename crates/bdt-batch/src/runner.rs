//! Parallel sizing sweep over independent simulations.
//!
//! Each candidate battery size runs a full simulation on its own worker;
//! the forecast series, tariff and limits are shared read-only, and every
//! job owns its battery state through the engine it runs. The sweep is
//! embarrassingly parallel on a Rayon pool.

use anyhow::{Context, Result};
use bdt_core::{BatterySpec, ExogenousSeries, GridLimits, TariffSpec};
use bdt_opt::{solve_sequential, MonthlyConfig, SolverSettings, Summary};
use bdt_sim::{RollingConfig, RollingController};
use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use std::path::PathBuf;

use crate::job::{jobs_from_candidates, SizingCandidate, SizingJob, SizingJobRecord, SweepMethod};
use crate::manifest::{write_sweep_manifest, SweepManifest};

/// Sweep configuration.
#[derive(Debug, Clone)]
pub struct SweepRunnerConfig {
    pub candidates: Vec<SizingCandidate>,
    /// Template for non-size battery parameters (SOC band, efficiencies,
    /// aging, cell cost)
    pub battery_template: BatterySpec,
    pub tariff: TariffSpec,
    pub limits: GridLimits,
    pub solver: SolverSettings,
    pub initial_soc: f64,
    pub method: SweepMethod,
    /// Directory for `sweep_manifest.json`
    pub output_root: PathBuf,
    /// Worker threads; 0 auto-detects the CPU count
    pub threads: usize,
}

/// Sweep outcome with per-job records and the manifest location.
#[derive(Debug)]
pub struct SweepOutcome {
    pub success: usize,
    pub failure: usize,
    pub baseline_cost: f64,
    pub manifest_path: PathBuf,
    pub jobs: Vec<SizingJobRecord>,
}

pub fn run_sweep(series: &ExogenousSeries, config: &SweepRunnerConfig) -> Result<SweepOutcome> {
    let thread_count = if config.threads == 0 {
        num_cpus::get()
    } else {
        config.threads
    };
    let pool = ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .context("building Rayon thread pool for sizing sweep")?;

    // Zero-battery baseline, solved once and shared by every record
    let baseline = simulate(series, config, &BatterySpec::none(), 0.0)
        .map_err(|e| anyhow::anyhow!("baseline simulation failed: {}", e))?;
    let baseline_cost = baseline.total_cost;

    let jobs = jobs_from_candidates(&config.battery_template, &config.candidates);
    let records: Vec<SizingJobRecord> = pool.install(|| {
        jobs.par_iter()
            .map(|job| run_job(job, series, config, baseline_cost))
            .collect()
    });

    let success = records.iter().filter(|r| r.status == "ok").count();
    let failure = records.len() - success;

    let manifest = SweepManifest {
        created_at: Utc::now(),
        method: config.method.as_str().to_string(),
        num_jobs: records.len(),
        success,
        failure,
        baseline_cost,
        jobs: records.clone(),
    };
    let manifest_path = config.output_root.join("sweep_manifest.json");
    write_sweep_manifest(&manifest_path, &manifest)?;

    Ok(SweepOutcome {
        success,
        failure,
        baseline_cost,
        manifest_path,
        jobs: records,
    })
}

fn run_job(
    job: &SizingJob,
    series: &ExogenousSeries,
    config: &SweepRunnerConfig,
    baseline_cost: f64,
) -> SizingJobRecord {
    match simulate(series, config, &job.battery, config.initial_soc) {
        Ok(summary) => SizingJobRecord {
            job_id: job.job_id.clone(),
            capacity_kwh: job.candidate.capacity_kwh,
            power_kw: job.candidate.power_kw,
            status: "ok".into(),
            error: None,
            total_cost: summary.total_cost,
            savings: baseline_cost - summary.total_cost,
            equivalent_full_cycles: summary.equivalent_full_cycles,
        },
        Err(err) => {
            eprintln!("sizing job {} failed: {err}", job.job_id);
            SizingJobRecord {
                job_id: job.job_id.clone(),
                capacity_kwh: job.candidate.capacity_kwh,
                power_kw: job.candidate.power_kw,
                status: "error".into(),
                error: Some(err),
                total_cost: f64::NAN,
                savings: f64::NAN,
                equivalent_full_cycles: f64::NAN,
            }
        }
    }
}

/// Run one simulation with the configured engine and return its summary.
fn simulate(
    series: &ExogenousSeries,
    config: &SweepRunnerConfig,
    battery: &BatterySpec,
    initial_soc: f64,
) -> std::result::Result<Summary, String> {
    match config.method {
        SweepMethod::Deterministic => {
            let monthly = MonthlyConfig {
                battery: battery.clone(),
                tariff: config.tariff.clone(),
                limits: config.limits,
                solver: config.solver,
                initial_soc,
            };
            solve_sequential(series, &monthly)
                .map(|s| s.summary)
                .map_err(|e| e.to_string())
        }
        SweepMethod::Rolling { window_steps } => {
            let rolling = RollingConfig {
                initial_soc,
                solver: config.solver,
                ..RollingConfig::new(window_steps)
            };
            RollingController::new(
                series,
                battery.clone(),
                config.tariff.clone(),
                config.limits,
                rolling,
            )
            .and_then(|c| c.run())
            .map(|o| o.summary)
            .map_err(|e| e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdt_core::{ExogenousSeries, Resolution, TimeGrid};
    use chrono::NaiveDate;

    #[test]
    fn test_sweep_over_two_candidates() {
        let grid = TimeGrid::new(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            Resolution::Hourly,
            24,
        )
        .unwrap();
        // Cheap first half, expensive second half: bigger batteries save more
        let mut price = vec![0.5; 12];
        price.extend(vec![2.0; 12]);
        let series = ExogenousSeries::new(
            grid,
            vec![0.0; 24],
            vec![10.0; 24],
            price.clone(),
            price,
            vec![false; 24],
        )
        .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let config = SweepRunnerConfig {
            candidates: vec![
                SizingCandidate {
                    capacity_kwh: 0.0,
                    power_kw: 0.0,
                },
                SizingCandidate {
                    capacity_kwh: 20.0,
                    power_kw: 10.0,
                },
            ],
            battery_template: BatterySpec {
                soc_min: 0.0,
                soc_max: 1.0,
                ..BatterySpec::none()
            },
            tariff: TariffSpec::energy_only(0.0),
            limits: GridLimits::unlimited(),
            solver: SolverSettings::default(),
            initial_soc: 0.0,
            method: SweepMethod::Deterministic,
            output_root: dir.path().to_path_buf(),
            threads: 2,
        };

        let outcome = run_sweep(&series, &config).unwrap();
        assert_eq!(outcome.success, 2);
        assert_eq!(outcome.failure, 0);
        assert!(outcome.manifest_path.exists());

        // The zero-capacity candidate saves nothing; the real battery does
        let zero = &outcome.jobs[0];
        let real = &outcome.jobs[1];
        assert!(zero.savings.abs() < 1e-4);
        assert!(real.savings > 1.0, "expected savings, got {}", real.savings);
    }
}
