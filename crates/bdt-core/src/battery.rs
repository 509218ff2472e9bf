//! Battery specification and operational state.
//!
//! [`BatterySpec`] is immutable per run and validated before any
//! optimization. [`BatteryState`] persists across rolling windows: it
//! carries the state of charge, the running monthly import peak, and the
//! cumulative degradation, and is advanced from the first committed step of
//! each solved window.
//!
//! Degradation follows the LFP model used in the LP objective: cyclic aging
//! linear in normalized throughput plus a constant calendar rate, combined
//! as a max. The per-cycle coefficient is defensible for LFP because the
//! empirical degradation curve is nearly flat in depth of discharge; other
//! chemistries would need a piecewise coefficient and integer variables.

use chrono::{Datelike, Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

fn default_eta() -> f64 {
    1.0
}

/// Immutable battery parameters for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatterySpec {
    /// Nominal capacity E_nom (kWh)
    pub capacity_kwh: f64,
    /// Maximum charge power (kW)
    pub max_charge_kw: f64,
    /// Maximum discharge power (kW)
    pub max_discharge_kw: f64,
    /// Lower SOC bound as a fraction of nominal capacity
    pub soc_min: f64,
    /// Upper SOC bound as a fraction of nominal capacity
    pub soc_max: f64,
    /// Charge efficiency, applied in the SOC dynamics
    #[serde(default = "default_eta")]
    pub eta_charge: f64,
    /// Discharge efficiency, applied in the SOC dynamics
    #[serde(default = "default_eta")]
    pub eta_discharge: f64,
    /// Inverter efficiency, applied in the AC power balance
    #[serde(default = "default_eta")]
    pub eta_inverter: f64,
    /// Cell replacement cost (currency/kWh)
    #[serde(default)]
    pub cell_cost_per_kwh: f64,
    /// Capacity fraction lost at end of life (e.g. 0.20)
    #[serde(default = "BatterySpec::default_eol")]
    pub eol_fraction: f64,
    /// Cyclic aging coefficient: capacity fraction lost per unit of
    /// capacity-normalized throughput
    #[serde(default)]
    pub cyclic_aging_coeff: f64,
    /// Calendar aging rate (capacity fraction per hour)
    #[serde(default)]
    pub calendar_aging_per_hour: f64,
}

impl BatterySpec {
    fn default_eol() -> f64 {
        0.20
    }

    /// Spec for a system without a battery (sizing baseline).
    pub fn none() -> Self {
        Self {
            capacity_kwh: 0.0,
            max_charge_kw: 0.0,
            max_discharge_kw: 0.0,
            soc_min: 0.0,
            soc_max: 1.0,
            eta_charge: 1.0,
            eta_discharge: 1.0,
            eta_inverter: 1.0,
            cell_cost_per_kwh: 0.0,
            eol_fraction: Self::default_eol(),
            cyclic_aging_coeff: 0.0,
            calendar_aging_per_hour: 0.0,
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        if !(self.capacity_kwh >= 0.0 && self.capacity_kwh.is_finite()) {
            return Err(CoreError::Config(format!(
                "battery capacity must be finite and non-negative, got {}",
                self.capacity_kwh
            )));
        }
        if self.max_charge_kw < 0.0 || self.max_discharge_kw < 0.0 {
            return Err(CoreError::Config(
                "battery power limits must be non-negative".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.soc_min) || !(0.0..=1.0).contains(&self.soc_max) {
            return Err(CoreError::Config(
                "soc_min and soc_max must lie in [0, 1]".into(),
            ));
        }
        if self.soc_min > self.soc_max {
            return Err(CoreError::Config(format!(
                "soc_min {} exceeds soc_max {}",
                self.soc_min, self.soc_max
            )));
        }
        for (name, eta) in [
            ("eta_charge", self.eta_charge),
            ("eta_discharge", self.eta_discharge),
            ("eta_inverter", self.eta_inverter),
        ] {
            if !(eta > 0.0 && eta <= 1.0) {
                return Err(CoreError::Config(format!(
                    "{} must lie in (0, 1], got {}",
                    name, eta
                )));
            }
        }
        if self.cell_cost_per_kwh < 0.0 {
            return Err(CoreError::Config("cell cost must be non-negative".into()));
        }
        if !(self.eol_fraction > 0.0 && self.eol_fraction <= 1.0) {
            return Err(CoreError::Config(format!(
                "end-of-life fraction must lie in (0, 1], got {}",
                self.eol_fraction
            )));
        }
        if self.cyclic_aging_coeff < 0.0 || self.calendar_aging_per_hour < 0.0 {
            return Err(CoreError::Config(
                "aging coefficients must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Lowest admissible stored energy (kWh)
    pub fn min_energy_kwh(&self) -> f64 {
        self.soc_min * self.capacity_kwh
    }

    /// Highest admissible stored energy (kWh)
    pub fn max_energy_kwh(&self) -> f64 {
        self.soc_max * self.capacity_kwh
    }

    /// Monetary weight of one unit of degradation fraction in the LP
    /// objective: c_cell * E_nom / eol.
    pub fn degradation_weight(&self) -> f64 {
        self.cell_cost_per_kwh * self.capacity_kwh / self.eol_fraction
    }

    /// Calendar aging per step of the given duration
    pub fn calendar_aging_per_step(&self, step_hours: f64) -> f64 {
        self.calendar_aging_per_hour * step_hours
    }
}

/// Mutable battery state carried across rolling windows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryState {
    /// Current stored energy (kWh)
    pub soc_kwh: f64,
    /// Running maximum of hourly grid import this calendar month (kW)
    pub month_peak_kw: f64,
    /// First timestamp of the current calendar month
    pub month_anchor: NaiveDateTime,
    /// Capacity fraction lost since commissioning
    pub cum_degradation: f64,
    /// Timestamp of the last update (end of the last applied step)
    pub last_time: NaiveDateTime,
}

impl BatteryState {
    /// Initialize state at simulation start.
    ///
    /// `initial_soc` is a fraction of nominal capacity and must lie within
    /// the spec's SOC band.
    pub fn new(spec: &BatterySpec, initial_soc: f64, start: NaiveDateTime) -> CoreResult<Self> {
        spec.validate()?;
        if initial_soc < spec.soc_min - 1e-9 || initial_soc > spec.soc_max + 1e-9 {
            return Err(CoreError::Config(format!(
                "initial SOC {} outside [{}, {}]",
                initial_soc, spec.soc_min, spec.soc_max
            )));
        }
        Ok(Self {
            soc_kwh: initial_soc * spec.capacity_kwh,
            month_peak_kw: 0.0,
            month_anchor: month_start(start),
            cum_degradation: 0.0,
            last_time: start,
        })
    }

    /// Advance the state by one committed dispatch step.
    ///
    /// If the step's timestamp falls in a new calendar month, the running
    /// peak resets before the step's import is accumulated.
    pub fn apply_step(
        &mut self,
        spec: &BatterySpec,
        step_start: NaiveDateTime,
        step_hours: f64,
        charge_kw: f64,
        discharge_kw: f64,
        import_kw: f64,
        degradation: f64,
    ) {
        if month_start(step_start) != self.month_anchor {
            self.month_peak_kw = 0.0;
            self.month_anchor = month_start(step_start);
        }

        self.soc_kwh += spec.eta_charge * charge_kw * step_hours
            - discharge_kw * step_hours / spec.eta_discharge;
        // Clamp solver-tolerance drift back into the admissible band
        self.soc_kwh = self
            .soc_kwh
            .clamp(spec.min_energy_kwh(), spec.max_energy_kwh());

        if import_kw > self.month_peak_kw {
            self.month_peak_kw = import_kw;
        }
        self.cum_degradation += degradation;
        self.last_time =
            step_start + Duration::seconds((step_hours * 3600.0).round() as i64);
    }

    /// Current SOC as a fraction of nominal capacity (0 for a zero-capacity
    /// spec).
    pub fn soc_fraction(&self, spec: &BatterySpec) -> f64 {
        if spec.capacity_kwh > 0.0 {
            self.soc_kwh / spec.capacity_kwh
        } else {
            0.0
        }
    }
}

/// Midnight on the first day of the timestamp's month
pub fn month_start(ts: NaiveDateTime) -> NaiveDateTime {
    ts.date()
        .with_day(1)
        .expect("day 1 exists in every month")
        .and_hms_opt(0, 0, 0)
        .expect("midnight is always a valid time")
}
