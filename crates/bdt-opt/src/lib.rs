//! # bdt-opt: Dispatch Optimization for Battery Systems
//!
//! Builds and solves the linear program behind battery dispatch: energy
//! arbitrage, peak shaving under a progressive monthly power tariff, PV
//! curtailment avoidance and LFP aging costs, over hourly or
//! quarter-hourly grids.
//!
//! ## Architecture
//!
//! | Module | Role |
//! |--------|------|
//! | [`problem`] | Assemble one window LP as a sparse matrix with tracked constraint classes |
//! | [`solver`] | Clarabel backend: primal and dual vectors, status mapping, timeout budget |
//! | [`window`] | Extract primal series, shadow prices and the cost decomposition |
//! | [`monthly`] | Full-month tight-mode solves, sequential multi-month chaining |
//! | [`trajectory`] | Committed-step container and exact-billing summary |
//! | [`attribution`] | Savings decomposition from dual variables (monthly mode) |
//!
//! The problem/solver split mirrors a formulation/backend separation: the
//! builder produces a solver-agnostic sparse LP plus a row map, and the
//! backend turns it into a Clarabel conic program with two cone blocks.
//!
//! ## Example
//!
//! ```ignore
//! use bdt_opt::monthly::{solve_month, MonthlyConfig};
//!
//! let solution = solve_month(&series, &config)?;
//! println!("objective: {:.2}", solution.window.objective);
//! println!("exact power tariff: {:.2}", solution.power_tariff_exact);
//! ```

pub mod attribution;
pub mod error;
pub mod monthly;
pub mod problem;
pub mod solver;
pub mod trajectory;
pub mod window;

pub use attribution::{attribute_value, AttributionReport};
pub use error::SolveError;
pub use monthly::{
    solve_month, solve_sequential, MonthlyConfig, MonthlySolution, SequentialSolution,
};
pub use problem::{build_window, DispatchProblem, PeakMode, RowMap, VarLayout, WindowParams};
pub use solver::{solve, LpSolution, SolverSettings};
pub use trajectory::{MonthPeak, StepRecord, Summary, Trajectory};
pub use window::{extract, DualValues, WindowResult, DEGENERACY_TOL_KW};
