//! Sweep manifest persistence.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::job::SizingJobRecord;

/// Machine-readable record of one sizing sweep.
#[derive(Debug, Serialize, Deserialize)]
pub struct SweepManifest {
    pub created_at: DateTime<Utc>,
    pub method: String,
    pub num_jobs: usize,
    pub success: usize,
    pub failure: usize,
    /// Total cost of the zero-battery baseline
    pub baseline_cost: f64,
    pub jobs: Vec<SizingJobRecord>,
}

pub fn write_sweep_manifest(path: &Path, manifest: &SweepManifest) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating manifest directory '{}'", parent.display()))?;
    }
    let json =
        serde_json::to_string_pretty(manifest).context("serializing sweep manifest to JSON")?;
    fs::write(path, json)
        .with_context(|| format!("writing sweep manifest '{}'", path.display()))?;
    Ok(())
}

pub fn load_sweep_manifest(path: &Path) -> Result<SweepManifest> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("opening sweep manifest '{}'", path.display()))?;
    serde_json::from_str(&data)
        .with_context(|| format!("parsing sweep manifest '{}'", path.display()))
}
