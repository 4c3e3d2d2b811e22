use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::catalog::Material;
use crate::config::OptimizerConfig;
use crate::error::WidthError;
use crate::types::{Dimensions, StandardStockOption};
use crate::units::{StandardConverter, Unit, UnitConverter};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "orientation", rename_all = "snake_case")]
pub enum WidthSelection {
    /// The requirement's width runs across the roll.
    AsGiven { width: f64, roll_length: f64 },
    /// The requirement's length runs across the roll.
    Swapped { width: f64, roll_length: f64 },
    /// No standard widths were configured; the required area is taken as consumed.
    Unoptimized,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidthPlan {
    pub requirement: Dimensions,
    pub unit: Unit,
    pub selection: WidthSelection,
    pub standard_width: Option<StandardStockOption>,
    pub required_area: f64,
    pub consumed_area: f64,
    pub wasted_area: f64,
    pub efficiency_percent: f64,
    pub area_unit: Unit,
}

impl WidthPlan {
    pub fn is_optimized(&self) -> bool {
        !matches!(self.selection, WidthSelection::Unoptimized)
    }
}

/// Picks a roll width for one panel. A requirement can be laid either way
/// round: the narrowest width holding its width is tried first, then the
/// narrowest holding its length. Nothing is taken from stock here.
pub struct WidthSolver<C = StandardConverter> {
    converter: C,
    epsilon: f64,
}

impl WidthSolver<StandardConverter> {
    pub fn new() -> Self {
        Self::with_converter(StandardConverter)
    }
}

impl Default for WidthSolver<StandardConverter> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: UnitConverter> WidthSolver<C> {
    pub fn with_converter(converter: C) -> Self {
        Self {
            converter,
            epsilon: OptimizerConfig::DEFAULT_EPSILON_IN,
        }
    }

    pub fn solve(
        &self,
        standard_widths: &[StandardStockOption],
        required_width: Decimal,
        required_length: Decimal,
        unit: Unit,
    ) -> Result<WidthPlan, WidthError> {
        let area_unit = unit.squared().ok_or_else(|| {
            WidthError::InvalidRequirement(format!("requirement unit must be linear, got {unit}"))
        })?;
        let requirement = Dimensions::new(positive(required_width)?, positive(required_length)?);
        // Tolerance is held in inches; widths are compared in the request unit.
        let epsilon = self.converter.convert(self.epsilon, Unit::Inch, unit)?;
        let required_area = requirement.area();

        if standard_widths.is_empty() {
            tracing::warn!(
                requirement = %requirement,
                unit = %unit,
                "no standard widths configured, using required area as consumed"
            );
            return Ok(WidthPlan {
                requirement,
                unit,
                selection: WidthSelection::Unoptimized,
                standard_width: None,
                required_area,
                consumed_area: required_area,
                wasted_area: 0.0,
                efficiency_percent: 100.0,
                area_unit,
            });
        }

        let widths = standard_widths
            .iter()
            .map(|o| -> Result<(f64, StandardStockOption), WidthError> {
                let width = self.converter.convert_decimal(o.nominal_length, o.unit, unit)?;
                if !width.is_finite() || width <= 0.0 {
                    return Err(WidthError::InvalidRequirement(format!(
                        "standard width {o} must be positive"
                    )));
                }
                Ok((width, *o))
            })
            .collect::<Result<Vec<_>, WidthError>>()?;

        let (selection, option) = if let Some((width, option)) =
            narrowest_fitting(&widths, requirement.width, epsilon)
        {
            (
                WidthSelection::AsGiven {
                    width,
                    roll_length: requirement.length,
                },
                option,
            )
        } else if let Some((width, option)) = narrowest_fitting(&widths, requirement.length, epsilon) {
            let swapped = requirement.rotated();
            (
                WidthSelection::Swapped {
                    width,
                    roll_length: swapped.length,
                },
                option,
            )
        } else {
            let largest = widths.iter().map(|(w, _)| *w).fold(f64::MIN, f64::max);
            return Err(WidthError::NoFeasibleWidth {
                required_width: requirement.width,
                required_length: requirement.length,
                largest_available: largest,
                unit,
            });
        };

        let consumed_area = match selection {
            WidthSelection::AsGiven { width, roll_length }
            | WidthSelection::Swapped { width, roll_length } => width * roll_length,
            WidthSelection::Unoptimized => required_area,
        };

        Ok(WidthPlan {
            requirement,
            unit,
            selection,
            standard_width: Some(option),
            required_area,
            consumed_area,
            wasted_area: consumed_area - required_area,
            efficiency_percent: required_area / consumed_area * 100.0,
            area_unit,
        })
    }

}

/// Narrowest width that holds `target`. The first listed wins a tie.
fn narrowest_fitting(
    widths: &[(f64, StandardStockOption)],
    target: f64,
    epsilon: f64,
) -> Option<(f64, StandardStockOption)> {
    widths
        .iter()
        .filter(|(w, _)| *w >= target - epsilon)
        .fold(None, |best: Option<(f64, StandardStockOption)>, &(w, o)| match best {
            Some((bw, _)) if bw <= w => best,
            _ => Some((w, o)),
        })
}

fn positive(value: Decimal) -> Result<f64, WidthError> {
    match value.to_f64() {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        _ => Err(WidthError::InvalidRequirement(format!(
            "dimensions must be positive, got {value}"
        ))),
    }
}

/// Chooses a roll width for one panel of `material`.
pub fn optimize_width_for_panel(
    material: &Material,
    required_width: Decimal,
    required_length: Decimal,
    unit: Unit,
) -> Result<WidthPlan, WidthError> {
    WidthSolver::new().solve(&material.standard_widths, required_width, required_length, unit)
}
