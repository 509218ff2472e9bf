//! Unified error types for the BDT ecosystem
//!
//! This module provides a common error type [`CoreError`] covering the
//! construction-time failure modes of the dispatch model: invalid
//! configuration and malformed input data. Solver-level failures live in
//! `bdt-opt`; they convert into `CoreError` at API boundaries where a
//! single error type is wanted.

use thiserror::Error;

/// Unified error type for model construction and validation.
///
/// Configuration errors are detected when specs are built (invalid battery
/// bounds, non-monotonic tariff brackets). Data errors are detected when a
/// window is assembled (length mismatches, NaN values, non-monotonic
/// timestamps). Both are fatal and propagate immediately to the caller.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid specification detected at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or inconsistent input series detected at window build
    #[error("Data error: {0}")]
    Data(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for CoreError {
    fn from(s: String) -> Self {
        CoreError::Other(s)
    }
}

impl From<&str> for CoreError {
    fn from(s: &str) -> Self {
        CoreError::Other(s.to_string())
    }
}
