//! Sizing-sweep job definitions.

use bdt_core::BatterySpec;
use serde::{Deserialize, Serialize};

/// One candidate battery size in a sweep.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SizingCandidate {
    pub capacity_kwh: f64,
    /// Symmetric charge/discharge power limit
    pub power_kw: f64,
}

/// Simulation engine used for each job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SweepMethod {
    /// Perfect-foresight sequential monthly LPs
    Deterministic,
    /// Rolling-horizon simulation with the given window length in steps
    Rolling { window_steps: usize },
}

impl SweepMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepMethod::Deterministic => "deterministic",
            SweepMethod::Rolling { .. } => "rolling",
        }
    }
}

/// One runnable job: the candidate applied to the battery template.
#[derive(Debug, Clone)]
pub struct SizingJob {
    pub job_id: String,
    pub candidate: SizingCandidate,
    pub battery: BatterySpec,
}

/// Build the job list from a template spec and candidate sizes.
pub fn jobs_from_candidates(
    template: &BatterySpec,
    candidates: &[SizingCandidate],
) -> Vec<SizingJob> {
    candidates
        .iter()
        .map(|c| SizingJob {
            job_id: format!("size-{:.0}kwh-{:.0}kw", c.capacity_kwh, c.power_kw),
            candidate: *c,
            battery: BatterySpec {
                capacity_kwh: c.capacity_kwh,
                max_charge_kw: c.power_kw,
                max_discharge_kw: c.power_kw,
                ..template.clone()
            },
        })
        .collect()
}

/// Per-job outcome persisted in the sweep manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingJobRecord {
    pub job_id: String,
    pub capacity_kwh: f64,
    pub power_kw: f64,
    pub status: String,
    pub error: Option<String>,
    /// Total cost on the exact-billing basis
    pub total_cost: f64,
    /// Savings against the zero-battery baseline
    pub savings: f64,
    pub equivalent_full_cycles: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jobs_from_candidates_applies_template() {
        let template = BatterySpec {
            soc_min: 0.1,
            soc_max: 0.9,
            cell_cost_per_kwh: 250.0,
            ..BatterySpec::none()
        };
        let jobs = jobs_from_candidates(
            &template,
            &[SizingCandidate {
                capacity_kwh: 50.0,
                power_kw: 10.0,
            }],
        );
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].job_id, "size-50kwh-10kw");
        assert_eq!(jobs[0].battery.capacity_kwh, 50.0);
        assert_eq!(jobs[0].battery.soc_min, 0.1);
        assert_eq!(jobs[0].battery.cell_cost_per_kwh, 250.0);
    }
}
