//! Rolling-horizon dispatch controller.
//!
//! Repeatedly solves a short-window LP over the forecast, commits the
//! first step(s), advances the battery state and moves the window forward
//! one step (receding horizon). The monthly demand charge enters short
//! windows as a state-based peak penalty; windows that reach the end of
//! the current billing month switch to tight mode so the tail of each
//! month is billed through the bracket relaxation directly.
//!
//! The controller is an explicit state machine:
//!
//! ```text
//! Idle → BuildingWindow → Solving → ApplyingFirstStep
//!      → AdvancingState → MonthBoundaryCheck → Idle → … → Done
//! ```
//!
//! Execution is strictly sequential: every window depends on the state
//! left behind by the previous one. Cancellation is cooperative and
//! checked at window boundaries (the `Idle` state).
//!
//! Failure semantics: infeasibility is a fault and aborts (the model
//! carries curtailment slack, so it should be impossible); timeouts and
//! numerical errors trigger a safe-mode step (battery idle, grid meets
//! load) with a warning, and more than `max_consecutive_faults` in a row
//! aborts the simulation.

use bdt_core::{
    month_start, BatterySpec, BatteryState, CoreError, Diagnostics, ExogenousSeries, GridLimits,
    TariffSpec,
};
use bdt_opt::{
    build_window, extract, solve, DispatchProblem, PeakMode, SolveError, SolverSettings,
    StepRecord, Summary, Trajectory, WindowParams, WindowResult,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::penalty::PeakPenaltyParams;

/// Rolling simulation errors
#[derive(Error, Debug)]
pub enum SimError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Solve(#[from] SolveError),
    #[error("simulation aborted after {count} consecutive solver faults at step {step}")]
    TooManyFaults { step: usize, count: usize },
}

/// Rolling-horizon controller configuration.
#[derive(Debug, Clone)]
pub struct RollingConfig {
    /// Window length W in grid steps (e.g. 24 h of steps)
    pub window_steps: usize,
    /// Steps of each solution to commit before re-solving (receding
    /// horizon of 1 by default)
    pub commit_steps: usize,
    /// Per-solve budget and iteration cap
    pub solver: SolverSettings,
    /// Consecutive recoverable faults tolerated before aborting
    pub max_consecutive_faults: usize,
    /// Initial SOC as a fraction of nominal capacity
    pub initial_soc: f64,
}

impl RollingConfig {
    pub fn new(window_steps: usize) -> Self {
        Self {
            window_steps,
            commit_steps: 1,
            solver: SolverSettings::default(),
            max_consecutive_faults: 3,
            initial_soc: 0.5,
        }
    }
}

/// Completed rolling simulation.
#[derive(Debug, Clone, Serialize)]
pub struct RollingOutcome {
    pub trajectory: Trajectory,
    pub summary: Summary,
    pub final_state: BatteryState,
    pub diagnostics: Diagnostics,
    /// Number of LP solves performed
    pub solves: usize,
    /// Steps dispatched by the safe-mode fallback
    pub safe_mode_steps: usize,
    /// Whether the run was cancelled cooperatively before the horizon end
    pub cancelled: bool,
}

/// Controller phases, in transition order.
enum Phase {
    Idle,
    BuildingWindow,
    Solving { problem: Box<DispatchProblem> },
    ApplyingFirstStep { result: WindowResult },
    AdvancingState { result: WindowResult, committed: usize },
    MonthBoundaryCheck,
    Done,
}

/// Rolling-horizon dispatch simulation over one forecast horizon.
pub struct RollingController<'a> {
    series: &'a ExogenousSeries,
    battery: BatterySpec,
    tariff: TariffSpec,
    limits: GridLimits,
    config: RollingConfig,
    state: BatteryState,
    t_now: usize,
    trajectory: Trajectory,
    diagnostics: Diagnostics,
    solves: usize,
    safe_mode_steps: usize,
    consecutive_faults: usize,
}

impl<'a> RollingController<'a> {
    pub fn new(
        series: &'a ExogenousSeries,
        battery: BatterySpec,
        tariff: TariffSpec,
        limits: GridLimits,
        config: RollingConfig,
    ) -> Result<Self, SimError> {
        battery.validate()?;
        tariff.validate()?;
        limits.validate()?;
        if config.window_steps == 0 {
            return Err(CoreError::Config("window length must be at least one step".into()).into());
        }
        if config.commit_steps == 0 || config.commit_steps > config.window_steps {
            return Err(CoreError::Config(format!(
                "commit_steps {} must lie in [1, window_steps {}]",
                config.commit_steps, config.window_steps
            ))
            .into());
        }

        let grid = series.grid();
        let mut diagnostics = Diagnostics::new();
        // Warned once here rather than on every window build
        tariff.check_marginal_monotonicity(&mut diagnostics);
        let window_hours = config.window_steps as f64 * grid.step_hours();
        if window_hours < 24.0 {
            diagnostics.add_warning(
                "horizon",
                &format!(
                    "window of {} h is shorter than a day; morning solves cannot see evening peaks",
                    window_hours
                ),
            );
        }

        let state = BatteryState::new(&battery, config.initial_soc, grid.start())?;
        let trajectory = Trajectory::new(grid.step_hours());
        Ok(Self {
            series,
            battery,
            tariff,
            limits,
            config,
            state,
            t_now: 0,
            trajectory,
            diagnostics,
            solves: 0,
            safe_mode_steps: 0,
            consecutive_faults: 0,
        })
    }

    /// Current battery state (for inspection between runs).
    pub fn state(&self) -> &BatteryState {
        &self.state
    }

    /// Run the simulation to the end of the horizon.
    pub fn run(self) -> Result<RollingOutcome, SimError> {
        self.run_with_cancel(|| false)
    }

    /// Run with a cooperative cancellation hook, checked at window
    /// boundaries.
    pub fn run_with_cancel(
        mut self,
        should_cancel: impl Fn() -> bool,
    ) -> Result<RollingOutcome, SimError> {
        let horizon = self.series.len();
        let mut cancelled = false;
        let mut phase = Phase::Idle;

        loop {
            phase = match phase {
                Phase::Idle => {
                    if self.t_now >= horizon {
                        Phase::Done
                    } else if should_cancel() {
                        cancelled = true;
                        Phase::Done
                    } else {
                        Phase::BuildingWindow
                    }
                }

                Phase::BuildingWindow => {
                    let problem = self.build_current_window()?;
                    Phase::Solving {
                        problem: Box::new(problem),
                    }
                }

                Phase::Solving { problem } => {
                    self.solves += 1;
                    match solve(&problem, &self.config.solver) {
                        Ok(sol) => {
                            self.consecutive_faults = 0;
                            let result = extract(&problem, &sol, &mut self.diagnostics);
                            Phase::ApplyingFirstStep { result }
                        }
                        Err(err) if err.is_recoverable() => {
                            self.consecutive_faults += 1;
                            warn!(
                                step = self.t_now,
                                faults = self.consecutive_faults,
                                "solver fault, dispatching safe-mode step: {}",
                                err
                            );
                            self.diagnostics.add_warning_at_step(
                                "safe-mode",
                                &err.to_string(),
                                self.t_now,
                            );
                            if self.consecutive_faults > self.config.max_consecutive_faults {
                                return Err(SimError::TooManyFaults {
                                    step: self.t_now,
                                    count: self.consecutive_faults,
                                });
                            }
                            self.apply_safe_mode_steps()?;
                            Phase::MonthBoundaryCheck
                        }
                        Err(err) => return Err(SimError::Solve(err)),
                    }
                }

                Phase::ApplyingFirstStep { result } => {
                    let committed = self
                        .config
                        .commit_steps
                        .min(result.len())
                        .min(horizon - self.t_now);
                    self.append_committed(&result, committed)?;
                    Phase::AdvancingState { result, committed }
                }

                Phase::AdvancingState { result, committed } => {
                    for k in 0..committed {
                        self.state.apply_step(
                            &self.battery,
                            result.timestamp(k),
                            result.grid.step_hours(),
                            result.charge_kw[k],
                            result.discharge_kw[k],
                            result.import_kw[k],
                            result.degradation[k],
                        );
                    }
                    self.t_now += committed;
                    Phase::MonthBoundaryCheck
                }

                Phase::MonthBoundaryCheck => {
                    // `apply_step` resets the running peak when a committed
                    // step crosses into a new month; re-anchor here as well
                    // so the next window build sees a consistent baseline
                    // even when no step was committed (safe-mode tail).
                    if self.t_now < horizon {
                        let next = self.series.grid().timestamp(self.t_now);
                        if month_start(next) != self.state.month_anchor {
                            self.state.month_peak_kw = 0.0;
                            self.state.month_anchor = month_start(next);
                        }
                    }
                    Phase::Idle
                }

                Phase::Done => break,
            };
        }

        let summary = self.trajectory.summarize(&self.battery, &self.tariff);
        Ok(RollingOutcome {
            trajectory: self.trajectory,
            summary,
            final_state: self.state,
            diagnostics: self.diagnostics,
            solves: self.solves,
            safe_mode_steps: self.safe_mode_steps,
            cancelled,
        })
    }

    /// Slice the forecast and build the LP for the current window.
    fn build_current_window(&self) -> Result<DispatchProblem, SolveError> {
        let grid = self.series.grid();
        let horizon = self.series.len();
        let month_end = grid.month_steps(self.t_now).end;

        // Tight mode when the window reaches the end of the billing month;
        // otherwise penalty mode over the full window length.
        let remaining_in_month = month_end - self.t_now;
        let (len, mode) = if remaining_in_month <= self.config.window_steps {
            (remaining_in_month, PeakMode::MonthlyTight)
        } else {
            let len = self.config.window_steps.min(horizon - self.t_now);
            let window = self.series.window(self.t_now, len)?;
            let params = PeakPenaltyParams::compute(
                &self.tariff,
                self.state.month_peak_kw,
                &window,
                grid.days_remaining_in_month(self.t_now),
                grid.days_in_month_of(self.t_now),
            );
            debug!(
                step = self.t_now,
                penalty = params.value(),
                base = params.base,
                "rolling window in penalty mode"
            );
            (
                len,
                PeakMode::RollingPenalty {
                    penalty_per_kw: params.value(),
                },
            )
        };

        let window = self.series.window(self.t_now, len)?;
        build_window(
            &window,
            &self.battery,
            &self.tariff,
            &self.limits,
            WindowParams {
                initial_soc_kwh: self.state.soc_kwh,
                month_peak_kw: self.state.month_peak_kw,
                mode,
            },
        )
    }

    /// Append the first `committed` steps of a solved window to the
    /// trajectory, priced with the all-in import price.
    fn append_committed(
        &mut self,
        result: &WindowResult,
        committed: usize,
    ) -> Result<(), SimError> {
        let window = self.series.window(self.t_now, committed)?;
        let effective: Vec<f64> = window
            .price_import
            .iter()
            .zip(window.tou_peak)
            .map(|(spot, tou)| self.tariff.effective_import_price(*spot, *tou))
            .collect();
        self.trajectory
            .extend_from_window(result, &effective, window.price_export, committed);
        Ok(())
    }

    /// Safe-mode dispatch: battery idle, grid meets the load, surplus PV
    /// exports up to the cap and curtails the rest. Applied for one commit
    /// interval.
    fn apply_safe_mode_steps(&mut self) -> Result<(), SimError> {
        let horizon = self.series.len();
        let committed = self.config.commit_steps.min(horizon - self.t_now);
        let window = self.series.window(self.t_now, committed)?;
        let dt = window.grid.step_hours();

        for k in 0..committed {
            let net = window.load_kw[k] - window.pv_kw[k];
            let import = net.max(0.0);
            let surplus = (-net).max(0.0);
            let export = match self.limits.export_limit_kw {
                Some(cap) => surplus.min(cap),
                None => surplus,
            };
            let curtail = surplus - export;
            let price = self
                .tariff
                .effective_import_price(window.price_import[k], window.tou_peak[k]);
            let degradation = if self.battery.capacity_kwh > 0.0 {
                self.battery.calendar_aging_per_step(dt)
            } else {
                0.0
            };
            let ts = window.grid.timestamp(k);

            self.trajectory.push(StepRecord {
                timestamp: ts,
                charge_kw: 0.0,
                discharge_kw: 0.0,
                import_kw: import,
                export_kw: export,
                curtail_kw: curtail,
                soc_kwh: self.state.soc_kwh,
                price_import: price,
                step_cost: price * import * dt - window.price_export[k] * export * dt,
                degradation,
            });
            self.state
                .apply_step(&self.battery, ts, dt, 0.0, 0.0, import, degradation);
        }

        self.safe_mode_steps += committed;
        self.t_now += committed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdt_core::{Resolution, TimeGrid};
    use chrono::NaiveDate;

    fn flat_series(len: usize) -> ExogenousSeries {
        let grid = TimeGrid::new(
            NaiveDate::from_ymd_opt(2024, 6, 1)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            Resolution::Hourly,
            len,
        )
        .unwrap();
        ExogenousSeries::new(
            grid,
            vec![0.0; len],
            vec![10.0; len],
            vec![1.0; len],
            vec![1.0; len],
            vec![false; len],
        )
        .unwrap()
    }

    #[test]
    fn test_config_validation() {
        let series = flat_series(48);
        let bad = RollingConfig {
            commit_steps: 30,
            ..RollingConfig::new(24)
        };
        assert!(RollingController::new(
            &series,
            BatterySpec::none(),
            TariffSpec::energy_only(0.0),
            GridLimits::unlimited(),
            bad,
        )
        .is_err());
    }

    #[test]
    fn test_short_window_warns() {
        let series = flat_series(48);
        let controller = RollingController::new(
            &series,
            BatterySpec::none(),
            TariffSpec::energy_only(0.0),
            GridLimits::unlimited(),
            RollingConfig::new(6),
        )
        .unwrap();
        assert_eq!(controller.diagnostics.warning_count(), 1);
    }

    #[test]
    fn test_no_battery_rolling_matches_load() {
        let series = flat_series(48);
        let controller = RollingController::new(
            &series,
            BatterySpec::none(),
            TariffSpec::energy_only(0.0),
            GridLimits::unlimited(),
            RollingConfig::new(24),
        )
        .unwrap();
        let outcome = controller.run().unwrap();

        assert_eq!(outcome.trajectory.len(), 48);
        assert_eq!(outcome.safe_mode_steps, 0);
        assert!(!outcome.cancelled);
        for t in 0..48 {
            assert!((outcome.trajectory.import_kw[t] - 10.0).abs() < 1e-5);
        }
        assert!((outcome.summary.energy_cost - 480.0).abs() < 1e-3);
    }

    #[test]
    fn test_cancellation_at_window_boundary() {
        let series = flat_series(48);
        let controller = RollingController::new(
            &series,
            BatterySpec::none(),
            TariffSpec::energy_only(0.0),
            GridLimits::unlimited(),
            RollingConfig::new(24),
        )
        .unwrap();
        let outcome = controller.run_with_cancel(|| true).unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.trajectory.is_empty());
    }
}
