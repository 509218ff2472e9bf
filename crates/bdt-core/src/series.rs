//! Exogenous forecast series aligned to a time grid.
//!
//! PV production, load, spot prices and the time-of-use band are consumed
//! as inputs; forecasting itself is out of scope. All series are validated
//! once at construction (lengths, NaN/Inf, negativity) so the optimizer can
//! assume clean columns. Prices may be negative.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::time::TimeGrid;

/// Forecast inputs for an optimization horizon, one value per grid step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExogenousSeries {
    grid: TimeGrid,
    /// PV production forecast (kW, average over step), non-negative
    pv_kw: Vec<f64>,
    /// Load forecast (kW), non-negative
    load_kw: Vec<f64>,
    /// Import price (currency/kWh), may be negative
    price_import: Vec<f64>,
    /// Export price (currency/kWh), may differ from import, may be negative
    price_export: Vec<f64>,
    /// Whether the step falls in the high energy-tariff band
    tou_peak: Vec<bool>,
}

impl ExogenousSeries {
    pub fn new(
        grid: TimeGrid,
        pv_kw: Vec<f64>,
        load_kw: Vec<f64>,
        price_import: Vec<f64>,
        price_export: Vec<f64>,
        tou_peak: Vec<bool>,
    ) -> CoreResult<Self> {
        let t = grid.len();
        for (name, len) in [
            ("pv", pv_kw.len()),
            ("load", load_kw.len()),
            ("price_import", price_import.len()),
            ("price_export", price_export.len()),
            ("tou_peak", tou_peak.len()),
        ] {
            if len != t {
                return Err(CoreError::Data(format!(
                    "{} series has {} steps, grid has {}",
                    name, len, t
                )));
            }
        }
        for (name, series) in [
            ("pv", &pv_kw),
            ("load", &load_kw),
            ("price_import", &price_import),
            ("price_export", &price_export),
        ] {
            if let Some(i) = series.iter().position(|v| !v.is_finite()) {
                return Err(CoreError::Data(format!(
                    "{} series contains a non-finite value at step {}",
                    name, i
                )));
            }
        }
        for (name, series) in [("pv", &pv_kw), ("load", &load_kw)] {
            if let Some(i) = series.iter().position(|v| *v < 0.0) {
                return Err(CoreError::Data(format!(
                    "{} series is negative at step {}",
                    name, i
                )));
            }
        }
        Ok(Self {
            grid,
            pv_kw,
            load_kw,
            price_import,
            price_export,
            tou_peak,
        })
    }

    pub fn grid(&self) -> &TimeGrid {
        &self.grid
    }

    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub fn pv_kw(&self) -> &[f64] {
        &self.pv_kw
    }

    pub fn load_kw(&self) -> &[f64] {
        &self.load_kw
    }

    pub fn price_import(&self) -> &[f64] {
        &self.price_import
    }

    pub fn price_export(&self) -> &[f64] {
        &self.price_export
    }

    pub fn tou_peak(&self) -> &[bool] {
        &self.tou_peak
    }

    /// Borrowed view over steps `[t0, t0 + len)`.
    pub fn window(&self, t0: usize, len: usize) -> CoreResult<ExogenousWindow<'_>> {
        let grid = self.grid.window(t0, len)?;
        Ok(ExogenousWindow {
            grid,
            pv_kw: &self.pv_kw[t0..t0 + len],
            load_kw: &self.load_kw[t0..t0 + len],
            price_import: &self.price_import[t0..t0 + len],
            price_export: &self.price_export[t0..t0 + len],
            tou_peak: &self.tou_peak[t0..t0 + len],
        })
    }

    /// View over the whole horizon.
    pub fn full_window(&self) -> ExogenousWindow<'_> {
        self.window(0, self.len())
            .expect("full window is always in range")
    }
}

/// Borrowed slice of an [`ExogenousSeries`] covering one optimization window.
#[derive(Debug, Clone)]
pub struct ExogenousWindow<'a> {
    pub grid: TimeGrid,
    pub pv_kw: &'a [f64],
    pub load_kw: &'a [f64],
    pub price_import: &'a [f64],
    pub price_export: &'a [f64],
    pub tou_peak: &'a [bool],
}

impl ExogenousWindow<'_> {
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    /// Largest net load (load minus PV, floored at zero) in the window,
    /// used by the rolling peak-penalty heuristic.
    pub fn max_net_load_kw(&self) -> f64 {
        self.load_kw
            .iter()
            .zip(self.pv_kw)
            .map(|(l, p)| (l - p).max(0.0))
            .fold(0.0_f64, f64::max)
    }
}
