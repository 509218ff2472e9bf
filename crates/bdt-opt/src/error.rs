//! Solver-level errors for dispatch optimization.

use std::time::Duration;

use bdt_core::CoreError;

/// Dispatch LP solver errors
#[derive(Debug, Clone)]
pub enum SolveError {
    /// The LP is infeasible; carries the constraint class hint
    Infeasible(String),
    /// The LP is unbounded
    Unbounded,
    /// Solver exceeded its wall-clock budget
    Timeout(Duration),
    /// Numerical difficulties in the solver
    NumericalIssue(String),
    /// Input data failed validation at window build
    DataValidation(String),
    /// Invalid configuration reached the optimizer
    Configuration(String),
}

impl std::fmt::Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::Infeasible(msg) => write!(f, "dispatch LP infeasible: {}", msg),
            SolveError::Unbounded => write!(f, "dispatch LP unbounded"),
            SolveError::Timeout(dur) => write!(f, "dispatch LP timeout after {:?}", dur),
            SolveError::NumericalIssue(msg) => {
                write!(f, "dispatch LP numerical issue: {}", msg)
            }
            SolveError::DataValidation(msg) => write!(f, "dispatch data validation: {}", msg),
            SolveError::Configuration(msg) => write!(f, "dispatch configuration: {}", msg),
        }
    }
}

impl std::error::Error for SolveError {}

impl From<CoreError> for SolveError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config(msg) => SolveError::Configuration(msg),
            CoreError::Data(msg) => SolveError::DataValidation(msg),
            CoreError::Other(msg) => SolveError::DataValidation(msg),
        }
    }
}

impl SolveError {
    /// Whether the rolling controller may recover from this error with a
    /// safe-mode step. Infeasibility and bad inputs are never recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SolveError::Timeout(_) | SolveError::NumericalIssue(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverability() {
        assert!(SolveError::Timeout(Duration::from_secs(1)).is_recoverable());
        assert!(SolveError::NumericalIssue("x".into()).is_recoverable());
        assert!(!SolveError::Infeasible("balance".into()).is_recoverable());
        assert!(!SolveError::DataValidation("x".into()).is_recoverable());
    }
}
