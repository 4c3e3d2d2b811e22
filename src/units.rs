use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::ConversionError;

const MM_PER_INCH: f64 = 25.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    #[serde(rename = "in")]
    Inch,
    #[serde(rename = "ft")]
    Foot,
    #[serde(rename = "mm")]
    Millimeter,
    #[serde(rename = "cm")]
    Centimeter,
    #[serde(rename = "m")]
    Meter,
    #[serde(rename = "sqin")]
    SquareInch,
    #[serde(rename = "sqft")]
    SquareFoot,
    #[serde(rename = "sqmm")]
    SquareMillimeter,
    #[serde(rename = "sqcm")]
    SquareCentimeter,
    #[serde(rename = "sqm")]
    SquareMeter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Length,
    Area,
}

impl Unit {
    pub fn dimension(self) -> Dimension {
        match self {
            Unit::Inch | Unit::Foot | Unit::Millimeter | Unit::Centimeter | Unit::Meter => {
                Dimension::Length
            }
            _ => Dimension::Area,
        }
    }

    /// Size of one of this unit in inches (or square inches for area units).
    fn factor(self) -> f64 {
        let linear = |u: Unit| match u {
            Unit::Inch | Unit::SquareInch => 1.0,
            Unit::Foot | Unit::SquareFoot => 12.0,
            Unit::Millimeter | Unit::SquareMillimeter => 1.0 / MM_PER_INCH,
            Unit::Centimeter | Unit::SquareCentimeter => 10.0 / MM_PER_INCH,
            Unit::Meter | Unit::SquareMeter => 1000.0 / MM_PER_INCH,
        };
        match self.dimension() {
            Dimension::Length => linear(self),
            Dimension::Area => linear(self) * linear(self),
        }
    }

    /// The area unit matching a linear unit. `None` for area units.
    pub fn squared(self) -> Option<Unit> {
        match self {
            Unit::Inch => Some(Unit::SquareInch),
            Unit::Foot => Some(Unit::SquareFoot),
            Unit::Millimeter => Some(Unit::SquareMillimeter),
            Unit::Centimeter => Some(Unit::SquareCentimeter),
            Unit::Meter => Some(Unit::SquareMeter),
            _ => None,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Inch => "in",
            Unit::Foot => "ft",
            Unit::Millimeter => "mm",
            Unit::Centimeter => "cm",
            Unit::Meter => "m",
            Unit::SquareInch => "sqin",
            Unit::SquareFoot => "sqft",
            Unit::SquareMillimeter => "sqmm",
            Unit::SquareCentimeter => "sqcm",
            Unit::SquareMeter => "sqm",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

impl FromStr for Unit {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in" | "inch" | "inches" | "\"" => Ok(Unit::Inch),
            "ft" | "foot" | "feet" | "'" => Ok(Unit::Foot),
            "mm" | "millimeter" | "millimeters" => Ok(Unit::Millimeter),
            "cm" | "centimeter" | "centimeters" => Ok(Unit::Centimeter),
            "m" | "meter" | "meters" => Ok(Unit::Meter),
            "sqin" | "sq in" | "in2" => Ok(Unit::SquareInch),
            "sqft" | "sq ft" | "ft2" => Ok(Unit::SquareFoot),
            "sqmm" | "sq mm" | "mm2" => Ok(Unit::SquareMillimeter),
            "sqcm" | "sq cm" | "cm2" => Ok(Unit::SquareCentimeter),
            "sqm" | "sq m" | "m2" => Ok(Unit::SquareMeter),
            other => Err(ConversionError::UnknownUnit(other.to_string())),
        }
    }
}

/// Converts `value` between two units of the same dimension.
///
/// A non-finite input or result is an error, never a zero.
pub fn convert(value: f64, from: Unit, to: Unit) -> Result<f64, ConversionError> {
    if !value.is_finite() {
        return Err(ConversionError::NonFinite {
            value: value.to_string(),
            from,
            to,
        });
    }
    if from.dimension() != to.dimension() {
        return Err(ConversionError::Incompatible { from, to });
    }
    if from == to {
        return Ok(value);
    }
    let result = value * from.factor() / to.factor();
    if !result.is_finite() {
        return Err(ConversionError::NonFinite {
            value: value.to_string(),
            from,
            to,
        });
    }
    Ok(result)
}

/// Source of unit conversions for the optimizers.
pub trait UnitConverter {
    fn convert(&self, value: f64, from: Unit, to: Unit) -> Result<f64, ConversionError>;

    fn convert_decimal(&self, value: Decimal, from: Unit, to: Unit) -> Result<f64, ConversionError> {
        let raw = value.to_f64().ok_or_else(|| ConversionError::NonFinite {
            value: value.to_string(),
            from,
            to,
        })?;
        self.convert(raw, from, to)
    }

    fn to_inches(&self, value: Decimal, from: Unit) -> Result<f64, ConversionError> {
        self.convert_decimal(value, from, Unit::Inch)
    }
}

/// The built-in table of linear and area factors.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConverter;

impl UnitConverter for StandardConverter {
    fn convert(&self, value: f64, from: Unit, to: Unit) -> Result<f64, ConversionError> {
        convert(value, from, to)
    }
}
