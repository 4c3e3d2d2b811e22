use serde::{Deserialize, Serialize};

use crate::error::OptimizeError;
use crate::units::{Unit, convert};

/// Tuning for one optimization call. Lengths are in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Saw-blade loss charged between two adjacent cuts on one piece.
    pub kerf: f64,
    /// Floating-point tolerance for length comparisons, not a business allowance.
    pub epsilon: f64,
    /// Unit that error reports use for cut lengths.
    pub display_unit: Unit,
}

impl OptimizerConfig {
    pub const DEFAULT_KERF_IN: f64 = 0.125;
    pub const DEFAULT_EPSILON_IN: f64 = 0.001;

    /// Sets the kerf from a value in any linear unit.
    pub fn with_kerf(mut self, value: f64, unit: Unit) -> Result<Self, OptimizeError> {
        self.kerf = convert(value, unit, Unit::Inch)?;
        self.validate()?;
        Ok(self)
    }

    pub fn with_display_unit(mut self, unit: Unit) -> Self {
        self.display_unit = unit;
        self
    }

    pub fn validate(&self) -> Result<(), OptimizeError> {
        if !self.kerf.is_finite() || self.kerf < 0.0 {
            return Err(OptimizeError::InvalidConfiguration(format!(
                "kerf must be a non-negative length, got {}",
                self.kerf
            )));
        }
        if !self.epsilon.is_finite() || self.epsilon < 0.0 {
            return Err(OptimizeError::InvalidConfiguration(format!(
                "epsilon must be a non-negative length, got {}",
                self.epsilon
            )));
        }
        if self.display_unit.squared().is_none() {
            return Err(OptimizeError::InvalidConfiguration(format!(
                "display unit must be linear, got {}",
                self.display_unit
            )));
        }
        Ok(())
    }
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            kerf: Self::DEFAULT_KERF_IN,
            epsilon: Self::DEFAULT_EPSILON_IN,
            display_unit: Unit::Inch,
        }
    }
}
