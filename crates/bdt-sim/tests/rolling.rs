//! End-to-end tests of the rolling-horizon controller: month-peak reset,
//! SOC continuity across windows, and solver-fault handling.

use std::time::Duration;

use bdt_core::{
    BatterySpec, ExogenousSeries, GridLimits, PowerBracket, Resolution, TariffSpec, TimeGrid,
};
use bdt_opt::SolverSettings;
use bdt_scenarios::presets;
use bdt_sim::{RollingConfig, RollingController, SimError};
use chrono::NaiveDate;

fn spike_series(days: u32, extra_hours: usize, spike_days: &[u32]) -> ExogenousSeries {
    let start = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let len = days as usize * 24 + extra_hours;
    let grid = TimeGrid::new(start, Resolution::Hourly, len).unwrap();
    let load: Vec<f64> = (0..len)
        .map(|t| {
            let day = (t / 24) as u32;
            let hour = t % 24;
            if spike_days.contains(&day) && (18..20).contains(&hour) {
                40.0
            } else {
                5.0
            }
        })
        .collect();
    ExogenousSeries::new(
        grid,
        vec![0.0; len],
        load,
        vec![1.0; len],
        vec![1.0; len],
        vec![false; len],
    )
    .unwrap()
}

fn shaving_battery() -> BatterySpec {
    BatterySpec {
        capacity_kwh: 20.0,
        max_charge_kw: 5.0,
        max_discharge_kw: 5.0,
        soc_min: 0.0,
        soc_max: 1.0,
        ..BatterySpec::none()
    }
}

fn bracket_tariff() -> TariffSpec {
    TariffSpec {
        brackets: vec![
            PowerBracket {
                width_kw: 10.0,
                cumulative_cost: 100.0,
            },
            PowerBracket {
                width_kw: 40.0,
                cumulative_cost: 900.0,
            },
        ],
        ..TariffSpec::default()
    }
}

#[test]
fn month_peak_resets_at_month_boundary() {
    // A 40 kW spike on day 5 (June), horizon ending 12 hours into July:
    // the state's running peak at the end reflects only July's small
    // imports, independent of the June spike.
    let series = spike_series(30, 12, &[4]);
    let config = RollingConfig {
        commit_steps: 24,
        initial_soc: 0.5,
        ..RollingConfig::new(168)
    };
    let controller = RollingController::new(
        &series,
        shaving_battery(),
        bracket_tariff(),
        GridLimits::unlimited(),
        config,
    )
    .unwrap();
    let outcome = controller.run().unwrap();

    let july_first = NaiveDate::from_ymd_opt(2024, 7, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    assert_eq!(outcome.final_state.month_anchor, july_first);
    assert!(
        outcome.final_state.month_peak_kw < 10.0,
        "July peak {} should be independent of June's 40 kW spike",
        outcome.final_state.month_peak_kw
    );

    // The trajectory-level monthly peaks agree: June carries the spike
    // (shaved by up to 5 kW), July does not.
    assert_eq!(outcome.summary.month_peaks.len(), 2);
    assert!(outcome.summary.month_peaks[0].peak_kw > 30.0);
    assert!(outcome.summary.month_peaks[1].peak_kw < 10.0);
}

#[test]
fn two_month_horizon_bills_each_month_separately() {
    // Spec scenario: 61 days, peaks on day 5 and day 35, weekly windows.
    let spec = presets::two_month_peaks();
    let series = spec.materialize().unwrap();
    let config = RollingConfig {
        commit_steps: 24,
        initial_soc: spec.initial_soc,
        ..RollingConfig::new(168)
    };
    let controller = RollingController::new(
        &series,
        spec.battery.clone(),
        spec.tariff.clone(),
        spec.limits,
        config,
    )
    .unwrap();
    let outcome = controller.run().unwrap();

    assert_eq!(outcome.trajectory.len(), series.len());
    assert_eq!(outcome.summary.month_peaks.len(), 2);
    for peak in &outcome.summary.month_peaks {
        assert!(
            peak.peak_kw <= 40.0 + 1e-6 && peak.peak_kw > 30.0,
            "each month sees its own spike (possibly shaved): {}",
            peak.peak_kw
        );
    }
    // Both months are billed; neither inherits the other's peak.
    let billed: f64 = outcome
        .summary
        .month_peaks
        .iter()
        .map(|m| m.tariff_cost)
        .sum();
    assert!((billed - outcome.summary.power_tariff_exact).abs() < 1e-9);
    assert_eq!(outcome.safe_mode_steps, 0);
}

#[test]
fn soc_is_continuous_across_windows() {
    // Price spread over two days so the battery actually moves.
    let start = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap();
    let len = 48;
    let grid = TimeGrid::new(start, Resolution::Hourly, len).unwrap();
    let price: Vec<f64> = (0..len)
        .map(|t| if t % 24 < 12 { 0.5 } else { 2.0 })
        .collect();
    let series = ExogenousSeries::new(
        grid,
        vec![0.0; len],
        vec![5.0; len],
        price.clone(),
        price,
        vec![false; len],
    )
    .unwrap();

    let battery = BatterySpec {
        eta_charge: 0.9,
        eta_discharge: 0.9,
        ..shaving_battery()
    };
    let controller = RollingController::new(
        &series,
        battery.clone(),
        TariffSpec::default(),
        GridLimits::unlimited(),
        RollingConfig {
            initial_soc: 0.5,
            ..RollingConfig::new(24)
        },
    )
    .unwrap();
    let outcome = controller.run().unwrap();

    // Replay the SOC recursion over the committed trajectory
    let mut soc = 0.5 * battery.capacity_kwh;
    let mut moved = false;
    for t in 0..outcome.trajectory.len() {
        soc += battery.eta_charge * outcome.trajectory.charge_kw[t]
            - outcome.trajectory.discharge_kw[t] / battery.eta_discharge;
        assert!(
            (outcome.trajectory.soc_kwh[t] - soc).abs() < 1e-6,
            "SOC discontinuity at step {}: {} vs {}",
            t,
            outcome.trajectory.soc_kwh[t],
            soc
        );
        soc = outcome.trajectory.soc_kwh[t];
        if outcome.trajectory.charge_kw[t] > 1e-3 {
            moved = true;
        }
    }
    assert!(moved, "the price spread should trigger charging");
    assert!((outcome.final_state.soc_kwh - soc).abs() < 1e-9);
}

#[test]
fn repeated_timeouts_abort_after_fault_threshold() {
    let series = spike_series(2, 0, &[]);
    let config = RollingConfig {
        solver: SolverSettings {
            time_limit: Some(Duration::from_nanos(1)),
            ..SolverSettings::default()
        },
        max_consecutive_faults: 3,
        initial_soc: 0.5,
        ..RollingConfig::new(24)
    };
    let controller = RollingController::new(
        &series,
        shaving_battery(),
        TariffSpec::default(),
        GridLimits::unlimited(),
        config,
    )
    .unwrap();

    match controller.run() {
        Err(SimError::TooManyFaults { step, count }) => {
            // Three safe-mode steps were dispatched before the abort
            assert_eq!(step, 3);
            assert_eq!(count, 4);
        }
        other => panic!("expected TooManyFaults, got {:?}", other.map(|o| o.solves)),
    }
}

#[test]
fn rolling_penalty_zero_when_no_tariff() {
    // Without a power tariff the penalty base is zero and rolling dispatch
    // reduces to plain arbitrage over each window. Two days keep the month
    // remainder longer than the window, so penalty mode is exercised.
    let mut spec = presets::pure_arbitrage();
    spec.days = 2;
    let series = spec.materialize().unwrap();
    let controller = RollingController::new(
        &series,
        spec.battery.clone(),
        spec.tariff.clone(),
        spec.limits,
        RollingConfig {
            initial_soc: spec.initial_soc,
            ..RollingConfig::new(24)
        },
    )
    .unwrap();
    let outcome = controller.run().unwrap();

    // The first window sees the whole day, so rolling with a 24 h window
    // captures the same spread the monthly solve does.
    assert!(outcome.summary.energy_cost < -50.0);
    assert_eq!(outcome.safe_mode_steps, 0);
}
