//! Grid tariff model: time-of-use energy charges and a progressive
//! monthly power-demand (capacity) tariff.
//!
//! The power tariff is an ordered list of brackets `{width_kw,
//! cumulative_cost}`: a monthly peak falling inside bracket i is billed the
//! bracket's full cumulative cost. That step function needs integer
//! variables to represent exactly, so the LP uses the incremental
//! relaxation instead: continuous activations `z_i in [0, 1]` with ordering
//! `z_i <= z_{i-1}`, peak `= sum(width_i * z_i)` and cost
//! `= sum(c_i * z_i)` where `c_i = cum_i - cum_{i-1}`. When the
//! incremental costs are non-decreasing the relaxation is tight at vertex
//! points; between vertices it under-approximates, so callers re-evaluate
//! the solved peak with [`TariffSpec::power_tariff_exact`] after the solve.
//!
//! Non-decreasing incremental costs are the common case but not required.
//! A decreasing marginal bracket makes the LP prefer partial activation of
//! a higher bracket; that sequence is detected here and reported as a
//! warning, never an error.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::diagnostics::Diagnostics;
use crate::error::{CoreError, CoreResult};

/// One bracket of the progressive power tariff.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PowerBracket {
    /// Width of the bracket (kW)
    pub width_kw: f64,
    /// Monthly cost billed when the peak falls in this bracket
    pub cumulative_cost: f64,
}

/// Energy charges for the time-of-use bands (currency/kWh on top of spot).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EnergyRates {
    pub peak_per_kwh: f64,
    pub offpeak_per_kwh: f64,
}

/// Full tariff specification for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TariffSpec {
    #[serde(default)]
    pub energy: EnergyRates,
    /// Progressive power brackets, ordered from the lowest. Empty means no
    /// power tariff.
    #[serde(default)]
    pub brackets: Vec<PowerBracket>,
}

impl TariffSpec {
    /// Tariff with no power component and flat energy rates.
    pub fn energy_only(rate_per_kwh: f64) -> Self {
        Self {
            energy: EnergyRates {
                peak_per_kwh: rate_per_kwh,
                offpeak_per_kwh: rate_per_kwh,
            },
            brackets: Vec::new(),
        }
    }

    pub fn validate(&self) -> CoreResult<()> {
        let mut prev_cum = 0.0;
        for (i, b) in self.brackets.iter().enumerate() {
            if !(b.width_kw >= 0.0 && b.width_kw.is_finite()) {
                return Err(CoreError::Config(format!(
                    "bracket {} width must be finite and non-negative, got {}",
                    i, b.width_kw
                )));
            }
            if !b.cumulative_cost.is_finite() || b.cumulative_cost < 0.0 {
                return Err(CoreError::Config(format!(
                    "bracket {} cumulative cost must be finite and non-negative, got {}",
                    i, b.cumulative_cost
                )));
            }
            if b.cumulative_cost < prev_cum {
                return Err(CoreError::Config(format!(
                    "bracket cumulative costs must be non-decreasing (bracket {}: {} < {})",
                    i, b.cumulative_cost, prev_cum
                )));
            }
            prev_cum = b.cumulative_cost;
        }
        for (name, rate) in [
            ("peak energy rate", self.energy.peak_per_kwh),
            ("off-peak energy rate", self.energy.offpeak_per_kwh),
        ] {
            if !rate.is_finite() {
                return Err(CoreError::Config(format!("{} must be finite", name)));
            }
        }
        Ok(())
    }

    pub fn has_power_tariff(&self) -> bool {
        !self.brackets.is_empty()
    }

    /// Incremental bracket costs `c_i = cum_i - cum_{i-1}`.
    pub fn incremental_costs(&self) -> Vec<f64> {
        let mut prev = 0.0;
        self.brackets
            .iter()
            .map(|b| {
                let c = b.cumulative_cost - prev;
                prev = b.cumulative_cost;
                c
            })
            .collect()
    }

    /// Report a decreasing incremental-cost sequence. The LP relaxation is
    /// still valid but may activate a higher bracket partially instead of
    /// filling a lower one.
    pub fn check_marginal_monotonicity(&self, diag: &mut Diagnostics) {
        let costs = self.incremental_costs();
        for i in 1..costs.len() {
            if costs[i] < costs[i - 1] - 1e-12 {
                let message = format!(
                    "incremental bracket costs decrease at bracket {} ({:.4} < {:.4}); \
                     the LP relaxation may activate brackets partially out of order",
                    i,
                    costs[i],
                    costs[i - 1]
                );
                warn!(bracket = i, "{}", message);
                diag.add_warning("tariff", &message);
                break;
            }
        }
    }

    /// Energy rate for a time-of-use band (currency/kWh on top of spot).
    pub fn energy_rate(&self, tou_peak: bool) -> f64 {
        if tou_peak {
            self.energy.peak_per_kwh
        } else {
            self.energy.offpeak_per_kwh
        }
    }

    /// All-in import price for one step (spot plus the band's energy rate).
    pub fn effective_import_price(&self, spot: f64, tou_peak: bool) -> f64 {
        spot + self.energy_rate(tou_peak)
    }

    /// Energy cost of one step: (import cost, export revenue). Linear in
    /// the powers; the import side carries the time-of-use energy charge.
    pub fn energy_cost(
        &self,
        import_kw: f64,
        export_kw: f64,
        spot_import: f64,
        spot_export: f64,
        tou_peak: bool,
        step_hours: f64,
    ) -> (f64, f64) {
        let import_cost = self.effective_import_price(spot_import, tou_peak) * import_kw * step_hours;
        let export_revenue = spot_export * export_kw * step_hours;
        (import_cost, export_revenue)
    }

    /// Exact step-function evaluation of the monthly power tariff: the
    /// cumulative cost of the bracket containing `peak_kw`. A peak beyond
    /// the last bracket is billed the last bracket's cost.
    pub fn power_tariff_exact(&self, peak_kw: f64) -> f64 {
        if peak_kw <= 0.0 || self.brackets.is_empty() {
            return 0.0;
        }
        let mut upper = 0.0;
        for b in &self.brackets {
            upper += b.width_kw;
            if peak_kw <= upper + 1e-9 {
                return b.cumulative_cost;
            }
        }
        self.brackets
            .last()
            .map(|b| b.cumulative_cost)
            .unwrap_or(0.0)
    }

    /// Marginal cost per kW of the bracket containing `peak_kw`, used as
    /// the base of the rolling peak penalty. Zero-width brackets are
    /// skipped.
    pub fn marginal_rate_at(&self, peak_kw: f64) -> f64 {
        let costs = self.incremental_costs();
        let mut upper = 0.0;
        let mut last_rate = 0.0;
        for (b, c) in self.brackets.iter().zip(&costs) {
            if b.width_kw <= 0.0 {
                continue;
            }
            upper += b.width_kw;
            last_rate = c / b.width_kw;
            if peak_kw <= upper + 1e-9 {
                return last_rate;
            }
        }
        last_rate
    }

    /// Total width covered by the brackets: the largest peak the LP
    /// relaxation can represent.
    pub fn total_bracket_width_kw(&self) -> f64 {
        self.brackets.iter().map(|b| b.width_kw).sum()
    }
}
