//! # bdt-core: Battery Dispatch Modeling Core
//!
//! Provides the fundamental data structures for battery dispatch
//! optimization: the discrete time grid, exogenous forecast series, battery
//! specification and operational state, and the grid tariff model.
//!
//! ## Design Philosophy
//!
//! Everything an optimizer consumes is a typed, validated record:
//!
//! - Specs ([`BatterySpec`], [`TariffSpec`], [`GridLimits`]) are immutable
//!   per run and validated at construction (configuration errors are fatal
//!   and surface before any solve).
//! - Series ([`ExogenousSeries`]) are validated columnar data aligned to a
//!   [`TimeGrid`]; windows borrow rather than copy.
//! - [`BatteryState`] is the only mutable piece; it is owned by exactly one
//!   simulation at a time, so sharing specs and series read-only across
//!   parallel runs needs no locking.
//!
//! Option sets are enumerated types ([`Resolution`]), never strings.
//!
//! ## Quick Start
//!
//! ```rust
//! use bdt_core::{BatterySpec, BatteryState, Resolution, TimeGrid};
//!
//! let grid = TimeGrid::full_month(2024, 6, Resolution::Hourly).unwrap();
//! assert_eq!(grid.len(), 720);
//!
//! let spec = BatterySpec {
//!     capacity_kwh: 50.0,
//!     max_charge_kw: 10.0,
//!     max_discharge_kw: 10.0,
//!     soc_min: 0.1,
//!     soc_max: 0.9,
//!     ..BatterySpec::none()
//! };
//! spec.validate().unwrap();
//!
//! let state = BatteryState::new(&spec, 0.5, grid.start()).unwrap();
//! assert_eq!(state.soc_kwh, 25.0);
//! ```

pub mod battery;
pub mod diagnostics;
pub mod error;
pub mod grid;
pub mod series;
pub mod tariff;
pub mod time;

pub use battery::{month_start, BatterySpec, BatteryState};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{CoreError, CoreResult};
pub use grid::GridLimits;
pub use series::{ExogenousSeries, ExogenousWindow};
pub use tariff::{EnergyRates, PowerBracket, TariffSpec};
pub use time::{days_in_month, Resolution, TimeGrid};
