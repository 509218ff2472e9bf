//! Clarabel solver backend for the dispatch LP.
//!
//! Clarabel solves the conic program `minimize q'x subject to Ax + s = b,
//! s ∈ K` with a primal-dual interior-point method. A pure LP uses two
//! cone blocks: a zero cone for the leading equality rows and a
//! nonnegative cone for the trailing inequality rows, matching the row
//! order produced by the problem assembler.
//!
//! The backend exposes both the primal vector and the dual vector `z`;
//! value attribution reads shadow prices out of `z` through the problem's
//! row map. Duals on nonnegative-cone rows are non-negative at the
//! optimum of a minimization.
//!
//! Failure semantics: numerical trouble triggers one retry with more
//! aggressive Ruiz equilibration before surfacing as a numerical error;
//! infeasibility and unboundedness are surfaced immediately; `MaxTime`
//! maps to a timeout carrying the configured budget.

use std::time::{Duration, Instant};

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use sprs::CsMat;
use tracing::debug;

use crate::error::SolveError;
use crate::problem::DispatchProblem;

/// Wall-clock and iteration budget for one solve call.
#[derive(Debug, Clone, Copy)]
pub struct SolverSettings {
    /// Wall-clock budget; `None` means unlimited
    pub time_limit: Option<Duration>,
    /// Interior-point iteration cap
    pub max_iter: u32,
    /// Forward Clarabel's own iteration log to stdout
    pub verbose: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            time_limit: None,
            max_iter: 50_000,
            verbose: false,
        }
    }
}

/// Primal/dual solution of one window LP.
#[derive(Debug, Clone)]
pub struct LpSolution {
    /// Primal variable values
    pub x: Vec<f64>,
    /// Dual multipliers, one per constraint row
    pub z: Vec<f64>,
    /// Objective value `q'x`
    pub objective: f64,
    pub iterations: usize,
    pub solve_time: Duration,
}

/// Convert the assembled CSC matrix into Clarabel's storage.
fn to_clarabel(a: &CsMat<f64>) -> CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(a.cols() + 1);
    let mut rowval = Vec::with_capacity(a.nnz());
    let mut nzval = Vec::with_capacity(a.nnz());
    colptr.push(0);
    for col in a.outer_iterator() {
        for (row, &value) in col.iter() {
            rowval.push(row);
            nzval.push(value);
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(a.rows(), a.cols(), colptr, rowval, nzval)
}

/// Best-effort hint about which constraint class makes an LP infeasible.
///
/// The model always has curtailment slack, so infeasibility can only come
/// from the import side of the balance when the grid cap cannot cover the
/// residual load.
fn infeasibility_hint(problem: &DispatchProblem) -> String {
    if problem.rows.import_cap.is_empty() {
        "power balance".to_string()
    } else {
        let cap = problem.rhs[problem.rows.import_cap[0]];
        format!(
            "power balance under grid import cap of {} kW (load exceeds importable power)",
            cap
        )
    }
}

/// Solve the window LP, returning primal and dual vectors.
pub fn solve(
    problem: &DispatchProblem,
    settings: &SolverSettings,
) -> Result<LpSolution, SolveError> {
    let start = Instant::now();
    let n_vars = problem.layout.n_vars();

    let a = to_clarabel(&problem.a);
    // Pure LP: the quadratic term is an all-zero matrix
    let p = CscMatrix::new(n_vars, n_vars, vec![0; n_vars + 1], Vec::new(), Vec::new());
    let cones: Vec<SupportedConeT<f64>> = vec![
        SupportedConeT::ZeroConeT(problem.n_eq),
        SupportedConeT::NonnegativeConeT(problem.n_ineq),
    ];

    debug!(
        vars = n_vars,
        rows = problem.n_eq + problem.n_ineq,
        nnz = problem.a.nnz(),
        density = problem.density(),
        "solving dispatch window"
    );

    // First attempt with default Ruiz equilibration; numerical trouble
    // gets one retry with more equilibration passes.
    let mut equilibrate_iters = 10u32;
    loop {
        let mut builder = DefaultSettingsBuilder::default();
        builder
            .verbose(settings.verbose)
            .max_iter(settings.max_iter)
            .equilibrate_enable(true)
            .equilibrate_max_iter(equilibrate_iters);
        if let Some(limit) = settings.time_limit {
            builder.time_limit(limit.as_secs_f64());
        }
        let clarabel_settings = builder
            .build()
            .map_err(|e| SolveError::NumericalIssue(format!("solver settings error: {:?}", e)))?;

        let mut solver = DefaultSolver::new(
            &p,
            &problem.objective,
            &a,
            &problem.rhs,
            &cones,
            clarabel_settings,
        )
        .map_err(|e| {
            SolveError::NumericalIssue(format!("solver initialization failed: {:?}", e))
        })?;

        solver.solve();
        let sol = solver.solution;

        match sol.status {
            SolverStatus::Solved | SolverStatus::AlmostSolved => {
                let objective: f64 = problem
                    .objective
                    .iter()
                    .zip(&sol.x)
                    .map(|(c, x)| c * x)
                    .sum();
                return Ok(LpSolution {
                    x: sol.x,
                    z: sol.z,
                    objective,
                    iterations: sol.iterations as usize,
                    solve_time: start.elapsed(),
                });
            }
            SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
                return Err(SolveError::Infeasible(infeasibility_hint(problem)));
            }
            SolverStatus::DualInfeasible | SolverStatus::AlmostDualInfeasible => {
                return Err(SolveError::Unbounded);
            }
            SolverStatus::MaxTime => {
                return Err(SolveError::Timeout(
                    settings.time_limit.unwrap_or_else(|| start.elapsed()),
                ));
            }
            status => {
                if equilibrate_iters == 10 {
                    debug!(?status, "retrying solve with tighter scaling");
                    equilibrate_iters = 50;
                    continue;
                }
                return Err(SolveError::NumericalIssue(format!(
                    "solver returned status {:?} after scaling retry",
                    status
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{build_window, PeakMode, WindowParams};
    use bdt_core::{
        BatterySpec, ExogenousSeries, GridLimits, Resolution, TariffSpec, TimeGrid,
    };
    use chrono::NaiveDate;

    fn flat_series(len: usize, load: f64, price: f64) -> ExogenousSeries {
        let start = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let grid = TimeGrid::new(start, Resolution::Hourly, len).unwrap();
        ExogenousSeries::new(
            grid,
            vec![0.0; len],
            vec![load; len],
            vec![price; len],
            vec![price; len],
            vec![false; len],
        )
        .unwrap()
    }

    #[test]
    fn test_no_battery_flat_load() {
        // Load must be met from the grid alone; objective = price·load·T
        let series = flat_series(24, 10.0, 1.0);
        let problem = build_window(
            &series.full_window(),
            &BatterySpec::none(),
            &TariffSpec::energy_only(0.0),
            &GridLimits::unlimited(),
            WindowParams {
                initial_soc_kwh: 0.0,
                month_peak_kw: 0.0,
                mode: PeakMode::MonthlyTight,
            },
        )
        .unwrap();

        let sol = solve(&problem, &SolverSettings::default()).unwrap();
        assert!((sol.objective - 240.0).abs() < 1e-4);
        for t in 0..24 {
            assert!((sol.x[problem.layout.import(t)] - 10.0).abs() < 1e-5);
            assert!(sol.x[problem.layout.charge(t)].abs() < 1e-6);
            assert!(sol.x[problem.layout.discharge(t)].abs() < 1e-6);
        }
        // Balance duals price one marginal kWh of load at the import price
        for &row in &problem.rows.balance {
            assert!((sol.z[row].abs() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn test_infeasible_when_import_capped_below_load() {
        let series = flat_series(6, 10.0, 1.0);
        let problem = build_window(
            &series.full_window(),
            &BatterySpec::none(),
            &TariffSpec::energy_only(0.0),
            &GridLimits {
                import_limit_kw: Some(5.0),
                export_limit_kw: None,
            },
            WindowParams {
                initial_soc_kwh: 0.0,
                month_peak_kw: 0.0,
                mode: PeakMode::MonthlyTight,
            },
        )
        .unwrap();

        let err = solve(&problem, &SolverSettings::default());
        assert!(matches!(err, Err(SolveError::Infeasible(_))));
    }
}
