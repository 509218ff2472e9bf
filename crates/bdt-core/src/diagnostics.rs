//! Diagnostics infrastructure for tracking issues during a run.
//!
//! Collects warnings and errors raised while validating specs, building
//! windows, and stepping a simulation. Supports:
//!
//! - Severity levels (Warning, Error)
//! - Categories for grouping issues (tariff, solver, degeneracy, safe-mode)
//! - Optional step references (timestep index within the run)
//! - Serialization for JSON output
//!
//! # Example
//!
//! ```
//! use bdt_core::diagnostics::{Diagnostics, Severity};
//!
//! let mut diag = Diagnostics::new();
//!
//! diag.add_warning("tariff", "incremental bracket costs are not non-decreasing");
//! diag.add_warning_at_step("degeneracy", "simultaneous charge and discharge", 42);
//!
//! assert_eq!(diag.warning_count(), 2);
//! assert!(!diag.has_errors());
//! ```

use serde::Serialize;

/// Severity level for diagnostic issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Unusual but the run continued (e.g., safe-mode step)
    Warning,
    /// A step or window could not be completed as intended
    Error,
}

/// A single diagnostic issue encountered during a run
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticIssue {
    /// Severity of the issue
    pub severity: Severity,
    /// Category for grouping (e.g., "tariff", "solver", "degeneracy", "safe-mode")
    pub category: String,
    /// Human-readable description of the issue
    pub message: String,
    /// Optional timestep index within the simulation horizon
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
}

impl DiagnosticIssue {
    pub fn new(
        severity: Severity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            step: None,
        }
    }

    /// Attach the timestep index the issue occurred at
    pub fn with_step(mut self, step: usize) -> Self {
        self.step = Some(step);
        self
    }
}

impl std::fmt::Display for DiagnosticIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };

        write!(f, "[{}:{}] {}", severity, self.category, self.message)?;

        if let Some(step) = self.step {
            write!(f, " at step {}", step)?;
        }

        Ok(())
    }
}

/// Collection of diagnostic issues for a run.
///
/// The primary container for tracking warnings and errors during spec
/// validation, window builds, and rolling simulation.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    /// All collected issues
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<DiagnosticIssue>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw issue directly
    pub fn add(&mut self, issue: DiagnosticIssue) {
        self.issues.push(issue);
    }

    /// Add a warning with category and message
    pub fn add_warning(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message));
    }

    /// Add a warning with a timestep reference
    pub fn add_warning_at_step(&mut self, category: &str, message: &str, step: usize) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Warning, category, message).with_step(step));
    }

    /// Add an error with category and message
    pub fn add_error(&mut self, category: &str, message: &str) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message));
    }

    /// Add an error with a timestep reference
    pub fn add_error_at_step(&mut self, category: &str, message: &str, step: usize) {
        self.issues
            .push(DiagnosticIssue::new(Severity::Error, category, message).with_step(step));
    }

    /// Count warning issues
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Count error issues
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Check if there are any issues
    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    /// Check if there are any errors
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    /// Get issues filtered by category
    pub fn issues_by_category<'a>(
        &'a self,
        category: &'a str,
    ) -> impl Iterator<Item = &'a DiagnosticIssue> {
        self.issues.iter().filter(move |i| i.category == category)
    }

    /// Merge another diagnostics collection into this one
    pub fn merge(&mut self, other: Diagnostics) {
        self.issues.extend(other.issues);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_queries() {
        let mut diag = Diagnostics::new();
        diag.add_warning("tariff", "non-monotone bracket costs");
        diag.add_error_at_step("solver", "numerical issue", 7);

        assert_eq!(diag.warning_count(), 1);
        assert_eq!(diag.error_count(), 1);
        assert!(diag.has_errors());
        assert_eq!(diag.issues_by_category("solver").count(), 1);
    }

    #[test]
    fn test_display_with_step() {
        let issue =
            DiagnosticIssue::new(Severity::Warning, "safe-mode", "solver timeout").with_step(12);
        assert_eq!(
            issue.to_string(),
            "[warning:safe-mode] solver timeout at step 12"
        );
    }

    #[test]
    fn test_merge() {
        let mut a = Diagnostics::new();
        a.add_warning("tariff", "w1");
        let mut b = Diagnostics::new();
        b.add_warning("degeneracy", "w2");
        a.merge(b);
        assert_eq!(a.warning_count(), 2);
    }
}
