//! State-based peak-penalty parameterization for rolling windows.
//!
//! A short window cannot see the rest of the billing month, so the
//! monthly demand charge is folded into the window as a per-kW penalty on
//! imports above the committed month peak:
//!
//! ```text
//! penalty = base · proximity · forecast_risk · time_factor
//! ```
//!
//! `base` is the marginal bracket rate scaled by the remaining fraction of
//! the month; the three factors are bounded multipliers that raise the
//! penalty when demand runs close to the peak, when the forecast exceeds
//! it, and early in the month when a new peak would be billed for many
//! remaining days. The exact functional form is a tuning surface, not a
//! contract: each factor is monotone in its driver and bounded, and
//! nothing downstream depends on the coefficients.

use bdt_core::{ExogenousWindow, TariffSpec};
use serde::Serialize;

/// Multiplicative decomposition of the rolling peak penalty (per kW of
/// violation per step).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PeakPenaltyParams {
    /// Marginal tariff rate scaled by the remaining month fraction
    pub base: f64,
    /// In [1, 2]: rises as forecast demand approaches the month peak
    pub proximity: f64,
    /// In [1, 1.5]: rises when the window forecast exceeds the month peak
    pub forecast_risk: f64,
    /// In [1, 1.5]: larger earlier in the month
    pub time_factor: f64,
}

impl PeakPenaltyParams {
    /// Combined per-kW penalty
    pub fn value(&self) -> f64 {
        self.base * self.proximity * self.forecast_risk * self.time_factor
    }

    /// Compute the penalty parameters from the battery state and the
    /// forecast window.
    pub fn compute(
        tariff: &TariffSpec,
        month_peak_kw: f64,
        window: &ExogenousWindow<'_>,
        days_remaining: u32,
        days_in_month: u32,
    ) -> Self {
        let remaining_fraction = if days_in_month == 0 {
            1.0
        } else {
            f64::from(days_remaining) / f64::from(days_in_month)
        };
        let base = tariff.marginal_rate_at(month_peak_kw.max(1e-9)) * remaining_fraction;

        let max_net_load = window.max_net_load_kw();
        // With no peak committed yet, any import sets a new one: treat
        // demand as already at the peak and the forecast as exceeding it.
        let (near, excess) = if month_peak_kw <= 1e-9 {
            (1.0, 1.0)
        } else {
            (
                (max_net_load / month_peak_kw).clamp(0.0, 1.0),
                ((max_net_load - month_peak_kw) / month_peak_kw).clamp(0.0, 1.0),
            )
        };
        let proximity = 1.0 + near;
        let forecast_risk = 1.0 + 0.5 * excess;
        let time_factor = 1.0 + 0.5 * remaining_fraction;

        Self {
            base,
            proximity,
            forecast_risk,
            time_factor,
        }
    }
}
