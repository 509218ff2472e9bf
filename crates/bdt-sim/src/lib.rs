//! # bdt-sim: Rolling-Horizon Dispatch Simulation
//!
//! Drives the window LP from `bdt-opt` through time under forecast
//! uncertainty: solve a short window, commit the first step, advance the
//! battery state, repeat. The monthly demand charge is carried into short
//! windows as a state-based peak penalty instead of an infeasibly long
//! forecast horizon.
//!
//! See [`RollingController`] for the state machine and failure semantics,
//! and [`PeakPenaltyParams`] for the penalty parameterization.

pub mod controller;
pub mod penalty;

pub use controller::{RollingConfig, RollingController, RollingOutcome, SimError};
pub use penalty::PeakPenaltyParams;
