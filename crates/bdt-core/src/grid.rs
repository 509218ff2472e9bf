//! Grid connection limits.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Import/export limits of the grid connection. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GridLimits {
    /// Maximum grid import (kW)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub import_limit_kw: Option<f64>,
    /// Maximum grid export (kW)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export_limit_kw: Option<f64>,
}

impl GridLimits {
    pub fn unlimited() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> CoreResult<()> {
        for (name, limit) in [
            ("import limit", self.import_limit_kw),
            ("export limit", self.export_limit_kw),
        ] {
            if let Some(v) = limit {
                if !(v >= 0.0 && v.is_finite()) {
                    return Err(CoreError::Config(format!(
                        "grid {} must be finite and non-negative, got {}",
                        name, v
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_negative_limit_rejected() {
        let g = GridLimits {
            import_limit_kw: Some(-1.0),
            export_limit_kw: None,
        };
        assert!(g.validate().is_err());
        assert!(GridLimits::unlimited().validate().is_ok());
    }
}
