use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::units::Unit;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("cannot convert {from} to {to}: incompatible dimensions")]
    Incompatible { from: Unit, to: Unit },

    #[error("converting {value} from {from} to {to} produced no finite result")]
    NonFinite { value: String, from: Unit, to: Unit },

    #[error("unknown unit '{0}'")]
    UnknownUnit(String),
}

/// A cut that could not be placed, with its length in the caller's display unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmetCut {
    pub length: f64,
    pub unit: Unit,
    pub source_id: String,
}

fn list_unmet(unmet: &[UnmetCut]) -> String {
    unmet
        .iter()
        .map(|c| format!("{:.3} {} ({})", c.length, c.unit, c.source_id))
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OptimizeError {
    #[error(
        "cut '{source_id}' of {length:.3} {unit} is longer than the largest stock length ({largest:.3} {unit})"
    )]
    OversizedCut {
        source_id: String,
        length: f64,
        largest: f64,
        unit: Unit,
    },

    #[error(
        "insufficient stock for material '{material_id}': {} cut(s) unmet: {}",
        .unmet.len(),
        list_unmet(.unmet)
    )]
    Shortfall {
        material_id: String,
        unmet: Vec<UnmetCut>,
    },

    #[error("invalid stock configuration: {0}")]
    InvalidStockConfiguration(String),

    #[error("invalid requirement: {0}")]
    InvalidRequirement(String),

    #[error("invalid optimizer configuration: {0}")]
    InvalidConfiguration(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WidthError {
    #[error(
        "no standard width fits {required_width:.3} x {required_length:.3} {unit} in either orientation (largest available width: {largest_available:.3} {unit})"
    )]
    NoFeasibleWidth {
        required_width: f64,
        required_length: f64,
        largest_available: f64,
        unit: Unit,
    },

    #[error("invalid requirement: {0}")]
    InvalidRequirement(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("material '{0}' not found")]
    MaterialNotFound(String),

    #[error("no plan recorded for order '{0}'")]
    PlanNotFound(String),

    #[error("order '{0}' already has a finalized plan")]
    PlanFinalized(String),

    #[error("material '{material_id}': {source}")]
    Optimize {
        material_id: String,
        #[source]
        source: OptimizeError,
    },

    #[error(
        "stock for material '{material_id}' changed: {length} {unit} needs {required}, only {available} available"
    )]
    StockChanged {
        material_id: String,
        length: Decimal,
        unit: Unit,
        required: u32,
        available: u32,
    },

    #[error("failed to acquire lock: {0}")]
    Lock(String),

    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

impl PlanError {
    pub(crate) fn optimize(material_id: &str, source: OptimizeError) -> Self {
        PlanError::Optimize {
            material_id: material_id.to_string(),
            source,
        }
    }
}
