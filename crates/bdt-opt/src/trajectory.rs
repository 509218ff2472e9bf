//! Committed dispatch trajectory and run summary.
//!
//! A [`Trajectory`] is the append-only concatenation of committed steps:
//! the full window in monthly mode, the first step of each window in
//! rolling mode. Storage is columnar so it can be emitted directly as a
//! table (one column per primal variable plus price and step cost).

use bdt_core::{month_start, BatterySpec, TariffSpec};
use chrono::{Datelike, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::window::WindowResult;

/// One committed step of the simulation.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StepRecord {
    pub timestamp: NaiveDateTime,
    pub charge_kw: f64,
    pub discharge_kw: f64,
    pub import_kw: f64,
    pub export_kw: f64,
    pub curtail_kw: f64,
    pub soc_kwh: f64,
    /// All-in import price of the step (currency/kWh)
    pub price_import: f64,
    /// Energy cost of the step (import cost minus export revenue)
    pub step_cost: f64,
    /// Capacity fraction lost in the step
    pub degradation: f64,
}

/// Columnar, append-only dispatch trajectory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Trajectory {
    pub step_hours: f64,
    pub timestamps: Vec<NaiveDateTime>,
    pub charge_kw: Vec<f64>,
    pub discharge_kw: Vec<f64>,
    pub import_kw: Vec<f64>,
    pub export_kw: Vec<f64>,
    pub curtail_kw: Vec<f64>,
    pub soc_kwh: Vec<f64>,
    pub price_import: Vec<f64>,
    pub step_cost: Vec<f64>,
    pub degradation: Vec<f64>,
}

impl Trajectory {
    pub fn new(step_hours: f64) -> Self {
        Self {
            step_hours,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn push(&mut self, record: StepRecord) {
        self.timestamps.push(record.timestamp);
        self.charge_kw.push(record.charge_kw);
        self.discharge_kw.push(record.discharge_kw);
        self.import_kw.push(record.import_kw);
        self.export_kw.push(record.export_kw);
        self.curtail_kw.push(record.curtail_kw);
        self.soc_kwh.push(record.soc_kwh);
        self.price_import.push(record.price_import);
        self.step_cost.push(record.step_cost);
        self.degradation.push(record.degradation);
    }

    /// Append the first `count` steps of a solved window.
    pub fn extend_from_window(
        &mut self,
        window: &WindowResult,
        price_import: &[f64],
        price_export: &[f64],
        count: usize,
    ) {
        let dt = window.grid.step_hours();
        for t in 0..count.min(window.len()) {
            let step_cost = price_import[t] * window.import_kw[t] * dt
                - price_export[t] * window.export_kw[t] * dt;
            self.push(StepRecord {
                timestamp: window.timestamp(t),
                charge_kw: window.charge_kw[t],
                discharge_kw: window.discharge_kw[t],
                import_kw: window.import_kw[t],
                export_kw: window.export_kw[t],
                curtail_kw: window.curtail_kw[t],
                soc_kwh: window.soc_kwh[t],
                price_import: price_import[t],
                step_cost,
                degradation: window.degradation[t],
            });
        }
    }

    pub fn record(&self, t: usize) -> StepRecord {
        StepRecord {
            timestamp: self.timestamps[t],
            charge_kw: self.charge_kw[t],
            discharge_kw: self.discharge_kw[t],
            import_kw: self.import_kw[t],
            export_kw: self.export_kw[t],
            curtail_kw: self.curtail_kw[t],
            soc_kwh: self.soc_kwh[t],
            price_import: self.price_import[t],
            step_cost: self.step_cost[t],
            degradation: self.degradation[t],
        }
    }

    /// Hourly-aggregated import peak per calendar month, in trajectory
    /// order. Sub-hourly steps aggregate by max within the hour.
    pub fn monthly_peaks(&self) -> Vec<MonthPeak> {
        let mut out: Vec<MonthPeak> = Vec::new();
        let mut current_hour: Option<(NaiveDateTime, f64)> = None;

        let commit_hour = |out: &mut Vec<MonthPeak>, hour: NaiveDateTime, peak: f64| {
            let anchor = month_start(hour);
            match out.last_mut() {
                Some(m) if m.month_anchor == anchor => {
                    if peak > m.peak_kw {
                        m.peak_kw = peak;
                    }
                }
                _ => out.push(MonthPeak {
                    year: anchor.year(),
                    month: anchor.month(),
                    month_anchor: anchor,
                    peak_kw: peak,
                    tariff_cost: 0.0,
                }),
            }
        };

        for (ts, &import) in self.timestamps.iter().zip(&self.import_kw) {
            let hour = ts
                .with_minute(0)
                .and_then(|x| x.with_second(0))
                .expect("truncating to the hour is always valid");
            match current_hour {
                Some((h, peak)) if h == hour => {
                    current_hour = Some((h, peak.max(import)));
                }
                Some((h, peak)) => {
                    commit_hour(&mut out, h, peak);
                    current_hour = Some((hour, import));
                }
                None => current_hour = Some((hour, import)),
            }
        }
        if let Some((h, peak)) = current_hour {
            commit_hour(&mut out, h, peak);
        }
        out
    }

    /// Summarize the trajectory with exact (step-function) tariff billing.
    pub fn summarize(&self, battery: &BatterySpec, tariff: &TariffSpec) -> Summary {
        let throughput: f64 = self
            .charge_kw
            .iter()
            .zip(&self.discharge_kw)
            .map(|(c, d)| (c + d) * self.step_hours)
            .sum();
        let equivalent_full_cycles = if battery.capacity_kwh > 0.0 {
            throughput / (2.0 * battery.capacity_kwh)
        } else {
            0.0
        };

        let mut month_peaks = self.monthly_peaks();
        for m in &mut month_peaks {
            m.tariff_cost = tariff.power_tariff_exact(m.peak_kw);
        }
        let power_tariff_exact: f64 = month_peaks.iter().map(|m| m.tariff_cost).sum();

        let energy_cost: f64 = self.step_cost.iter().sum();
        let cum_degradation: f64 = self.degradation.iter().sum();
        let degradation_cost = battery.degradation_weight() * cum_degradation;

        Summary {
            energy_cost,
            power_tariff_exact,
            degradation_cost,
            total_cost: energy_cost + power_tariff_exact + degradation_cost,
            equivalent_full_cycles,
            cum_degradation,
            month_peaks,
            steps: self.len(),
        }
    }
}

/// Hourly-basis import peak of one calendar month.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MonthPeak {
    pub year: i32,
    pub month: u32,
    pub month_anchor: NaiveDateTime,
    pub peak_kw: f64,
    /// Exact step-function tariff cost billed for this peak
    pub tariff_cost: f64,
}

/// Aggregate costs and physical totals of a trajectory.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    /// Import cost minus export revenue
    pub energy_cost: f64,
    /// Exact (post-processed) power tariff over all months
    pub power_tariff_exact: f64,
    /// Degradation cost at the cell-replacement weight
    pub degradation_cost: f64,
    pub total_cost: f64,
    pub equivalent_full_cycles: f64,
    pub cum_degradation: f64,
    pub month_peaks: Vec<MonthPeak>,
    pub steps: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use bdt_core::PowerBracket;
    use chrono::NaiveDate;

    fn ts(m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn record(timestamp: NaiveDateTime, import: f64) -> StepRecord {
        StepRecord {
            timestamp,
            charge_kw: 0.0,
            discharge_kw: 0.0,
            import_kw: import,
            export_kw: 0.0,
            curtail_kw: 0.0,
            soc_kwh: 0.0,
            price_import: 1.0,
            step_cost: import,
            degradation: 0.0,
        }
    }

    #[test]
    fn test_monthly_peaks_hourly_aggregation() {
        let mut traj = Trajectory::new(0.25);
        // One hour with quarter peaks 2/8/4/1 -> hourly value 8
        for (minute, import) in [(0, 2.0), (15, 8.0), (30, 4.0), (45, 1.0)] {
            traj.push(record(ts(1, 26, 0, minute), import));
        }
        // Next month, a lower peak
        traj.push(record(ts(2, 2, 0, 0), 5.0));

        let peaks = traj.monthly_peaks();
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].peak_kw, 8.0);
        assert_eq!(peaks[1].peak_kw, 5.0);
        assert_eq!(peaks[0].month, 1);
        assert_eq!(peaks[1].month, 2);
    }

    #[test]
    fn test_summary_totals() {
        let battery = BatterySpec {
            capacity_kwh: 10.0,
            max_charge_kw: 5.0,
            max_discharge_kw: 5.0,
            soc_min: 0.0,
            soc_max: 1.0,
            cell_cost_per_kwh: 200.0,
            ..BatterySpec::none()
        };
        let tariff = TariffSpec {
            brackets: vec![PowerBracket {
                width_kw: 10.0,
                cumulative_cost: 50.0,
            }],
            ..TariffSpec::energy_only(0.0)
        };

        let mut traj = Trajectory::new(1.0);
        let mut rec = record(ts(1, 26, 0, 0), 4.0);
        rec.charge_kw = 5.0;
        rec.degradation = 1e-4;
        traj.push(rec);
        let mut rec = record(ts(1, 26, 1, 0), 0.0);
        rec.discharge_kw = 5.0;
        traj.push(rec);

        let summary = traj.summarize(&battery, &tariff);
        // Throughput 10 kWh over a 10 kWh battery = half a full cycle
        assert!((summary.equivalent_full_cycles - 0.5).abs() < 1e-9);
        assert_eq!(summary.power_tariff_exact, 50.0);
        assert!((summary.energy_cost - 4.0).abs() < 1e-9);
        assert!(
            (summary.degradation_cost - battery.degradation_weight() * 1e-4).abs() < 1e-9
        );
        assert_eq!(summary.steps, 2);
    }
}
