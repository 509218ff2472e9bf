//! # bdt-batch: Parallel Sizing Sweeps
//!
//! Runs independent dispatch simulations over a list of candidate battery
//! sizes on a Rayon worker pool and writes a JSON manifest with per-job
//! costs and savings against the zero-battery baseline. Forecasts and
//! specs are shared read-only; each job owns its own battery state, so no
//! locking is involved.

pub mod job;
pub mod manifest;
pub mod runner;

pub use job::{jobs_from_candidates, SizingCandidate, SizingJob, SizingJobRecord, SweepMethod};
pub use manifest::{load_sweep_manifest, write_sweep_manifest, SweepManifest};
pub use runner::{run_sweep, SweepOutcome, SweepRunnerConfig};
