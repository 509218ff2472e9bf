//! Typed scenario specifications.
//!
//! A scenario bundles everything one simulation needs: the horizon, the
//! synthetic profiles, and the battery/tariff/grid configuration. Specs
//! are serde types loadable from TOML or JSON, and materialize into a
//! validated [`ExogenousSeries`] deterministically.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bdt_core::{
    BatterySpec, CoreResult, ExogenousSeries, GridLimits, Resolution, TariffSpec, TimeGrid,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::profiles::{ProfileSpec, TouSpec};

fn default_soc() -> f64 {
    0.5
}

/// Complete description of one simulation scenario.
///
/// Scalar fields come first so the spec serializes cleanly to TOML
/// (values before tables).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// First day of the horizon (midnight)
    pub start: NaiveDate,
    /// Horizon length in days
    pub days: u32,
    #[serde(default)]
    pub resolution: Resolution,
    #[serde(default = "default_soc")]
    pub initial_soc: f64,
    pub pv: ProfileSpec,
    pub load: ProfileSpec,
    pub price_import: ProfileSpec,
    /// Defaults to the import profile when absent (no feed-in spread)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price_export: Option<ProfileSpec>,
    #[serde(default)]
    pub tou: TouSpec,
    pub battery: BatterySpec,
    #[serde(default)]
    pub tariff: TariffSpec,
    #[serde(default)]
    pub limits: GridLimits,
}

impl ScenarioSpec {
    /// Time grid of the scenario horizon.
    pub fn grid(&self) -> CoreResult<TimeGrid> {
        let start = self
            .start
            .and_hms_opt(0, 0, 0)
            .expect("midnight is always a valid time");
        let len = self.days as usize * 24 * self.resolution.steps_per_hour();
        TimeGrid::new(start, self.resolution, len)
    }

    /// Evaluate all profiles into a validated series.
    pub fn materialize(&self) -> CoreResult<ExogenousSeries> {
        let grid = self.grid()?;
        let pv = self.pv.evaluate(&grid);
        let load = self.load.evaluate(&grid);
        let price_import = self.price_import.evaluate(&grid);
        let price_export = self
            .price_export
            .as_ref()
            .unwrap_or(&self.price_import)
            .evaluate(&grid);
        let tou = self.tou.evaluate(&grid);
        ExogenousSeries::new(grid, pv, load, price_import, price_export, tou)
    }
}

/// Load a scenario spec from a TOML or JSON file (by extension, TOML when
/// ambiguous).
pub fn load_spec_from_path(path: &Path) -> Result<ScenarioSpec> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("reading scenario spec '{}'", path.display()))?;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("json") => {
            serde_json::from_str(&data).context("parsing scenario spec json")
        }
        _ => toml::from_str(&data).context("parsing scenario spec toml"),
    }
}
