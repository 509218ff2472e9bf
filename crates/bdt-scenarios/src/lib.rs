//! # bdt-scenarios: Scenario Specification and Materialization
//!
//! Typed, serde-loadable scenario descriptions for dispatch simulations:
//! parametric profiles (constant, daily block, half-day split, solar bell,
//! day spikes), time-of-use bands, and the battery/tariff/grid
//! configuration, materialized deterministically into validated series.
//!
//! The [`presets`] module carries the canned benchmark systems used by the
//! integration tests and the CLI demos.

pub mod presets;
pub mod profiles;
pub mod spec;

pub use profiles::{ProfileSpec, TouSpec};
pub use spec::{load_spec_from_path, ScenarioSpec};
