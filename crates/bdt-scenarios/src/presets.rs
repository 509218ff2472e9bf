//! Canned benchmark scenarios.
//!
//! Small, deterministic systems used by the integration tests and as CLI
//! demo inputs: a no-battery reference, pure peak shaving, pure arbitrage,
//! curtailment avoidance, and a two-month horizon with separated load
//! peaks for month-reset checks.

use bdt_core::{BatterySpec, EnergyRates, GridLimits, PowerBracket, Resolution, TariffSpec};
use chrono::NaiveDate;

use crate::profiles::{ProfileSpec, TouSpec};
use crate::spec::ScenarioSpec;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
}

fn base(name: &str, days: u32) -> ScenarioSpec {
    ScenarioSpec {
        name: name.to_string(),
        description: None,
        start: start(),
        days,
        resolution: Resolution::Hourly,
        pv: ProfileSpec::Constant { value: 0.0 },
        load: ProfileSpec::Constant { value: 0.0 },
        price_import: ProfileSpec::Constant { value: 0.0 },
        price_export: None,
        tou: TouSpec::AllOffpeak,
        battery: BatterySpec::none(),
        tariff: TariffSpec::default(),
        limits: GridLimits::unlimited(),
        initial_soc: 0.5,
    }
}

fn simple_battery(capacity_kwh: f64, power_kw: f64) -> BatterySpec {
    BatterySpec {
        capacity_kwh,
        max_charge_kw: power_kw,
        max_discharge_kw: power_kw,
        soc_min: 0.0,
        soc_max: 1.0,
        ..BatterySpec::none()
    }
}

/// No battery, constant 10 kW load, one month at unit price.
pub fn no_battery_reference() -> ScenarioSpec {
    ScenarioSpec {
        load: ProfileSpec::Constant { value: 10.0 },
        price_import: ProfileSpec::Constant { value: 1.0 },
        initial_soc: 0.0,
        ..base("no-battery-reference", 30)
    }
}

/// Free energy, a 60 kW morning spike over a 20 kW base, and a power
/// tariff worth shaving: the only incentive is the demand charge.
pub fn pure_peak_shaving() -> ScenarioSpec {
    ScenarioSpec {
        load: ProfileSpec::DailyBlock {
            base: 20.0,
            elevated: 60.0,
            from_hour: 7,
            to_hour: 8,
        },
        battery: simple_battery(50.0, 10.0),
        tariff: TariffSpec {
            energy: EnergyRates::default(),
            brackets: vec![
                PowerBracket {
                    width_kw: 25.0,
                    cumulative_cost: 500.0,
                },
                PowerBracket {
                    width_kw: 25.0,
                    cumulative_cost: 1500.0,
                },
                PowerBracket {
                    width_kw: 50.0,
                    cumulative_cost: 4500.0,
                },
            ],
        },
        ..base("pure-peak-shaving", 1)
    }
}

/// No load or PV, cheap nights and expensive afternoons, no power tariff:
/// the battery can only arbitrage.
pub fn pure_arbitrage() -> ScenarioSpec {
    ScenarioSpec {
        price_import: ProfileSpec::HalfDaySplit {
            low: 1.0,
            high: 2.0,
            split_hour: 12,
        },
        battery: BatterySpec {
            eta_charge: 0.95,
            eta_discharge: 0.95,
            ..simple_battery(100.0, 50.0)
        },
        initial_soc: 0.0,
        ..base("pure-arbitrage", 1)
    }
}

/// Midday PV above a 5 kW export cap: without a battery most of the
/// production is curtailed. A small aging cost keeps charging beyond the
/// sellable volume strictly unattractive, so the optimum is unique.
pub fn curtailment_avoidance() -> ScenarioSpec {
    ScenarioSpec {
        pv: ProfileSpec::DailyBlock {
            base: 0.0,
            elevated: 20.0,
            from_hour: 10,
            to_hour: 15,
        },
        price_import: ProfileSpec::Constant { value: 0.5 },
        price_export: Some(ProfileSpec::Constant { value: 0.5 }),
        battery: BatterySpec {
            cell_cost_per_kwh: 100.0,
            cyclic_aging_coeff: 1e-4,
            ..simple_battery(50.0, 15.0)
        },
        limits: GridLimits {
            import_limit_kw: None,
            export_limit_kw: Some(5.0),
        },
        initial_soc: 0.0,
        ..base("curtailment-avoidance", 1)
    }
}

/// 61-day horizon with load peaks on day 5 and day 35, for verifying the
/// monthly peak reset across rolling windows.
pub fn two_month_peaks() -> ScenarioSpec {
    ScenarioSpec {
        load: ProfileSpec::DaySpike {
            base: 5.0,
            spike: 40.0,
            days: vec![4, 34],
            from_hour: 18,
            to_hour: 20,
        },
        price_import: ProfileSpec::Constant { value: 1.0 },
        battery: simple_battery(20.0, 5.0),
        tariff: TariffSpec {
            energy: EnergyRates::default(),
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
        },
        ..base("two-month-peaks", 61)
    }
}

/// Arbitrage scenario with LFP aging costs attached, for comparing cycle
/// counts across cell-cost assumptions.
pub fn degradation_sensitivity(cell_cost_per_kwh: f64) -> ScenarioSpec {
    let mut spec = pure_arbitrage();
    spec.name = "degradation-sensitivity".to_string();
    spec.battery.cell_cost_per_kwh = cell_cost_per_kwh;
    spec.battery.cyclic_aging_coeff = 2e-4;
    spec.battery.calendar_aging_per_hour = 1e-7;
    spec
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_materialize() {
        for spec in [
            no_battery_reference(),
            pure_peak_shaving(),
            pure_arbitrage(),
            curtailment_avoidance(),
            two_month_peaks(),
            degradation_sensitivity(500.0),
        ] {
            let series = spec.materialize().unwrap();
            assert_eq!(series.len(), spec.days as usize * 24);
            spec.battery.validate().unwrap();
            spec.tariff.validate().unwrap();
        }
    }

    #[test]
    fn test_two_month_horizon_spans_boundary() {
        let series = two_month_peaks().materialize().unwrap();
        let grid = series.grid();
        assert_ne!(grid.month_index(0), grid.month_index(grid.len() - 1));
    }
}
