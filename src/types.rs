use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::units::Unit;

/// One catalog length (or width) a material is sold in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StandardStockOption {
    pub nominal_length: Decimal,
    pub unit: Unit,
}

impl StandardStockOption {
    pub fn new(nominal_length: Decimal, unit: Unit) -> Self {
        Self {
            nominal_length,
            unit,
        }
    }

    /// True when both options name the same length in the same unit, ignoring scale.
    pub fn same_as(&self, other: &StandardStockOption) -> bool {
        self.unit == other.unit && self.nominal_length.normalize() == other.nominal_length.normalize()
    }
}

impl std::fmt::Display for StandardStockOption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.nominal_length.normalize(), self.unit)
    }
}

/// A persisted inventory batch as it arrives from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockBatch {
    pub length: Decimal,
    pub unit: Unit,
    pub quantity: u32,
    #[serde(default)]
    pub unit_rate: Decimal,
}

/// Batches of one length and unit merged into a single entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidatedStock {
    pub option: StandardStockOption,
    pub quantity: u32,
    pub unit_rate: Decimal,
}

/// A cut to produce, length in inches.
///
/// `source_id` only traces the cut back to whatever needs it. Packing never
/// looks at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredCut {
    pub length: f64,
    pub source_id: String,
}

impl RequiredCut {
    pub fn new(length: f64, source_id: impl Into<String>) -> Self {
        Self {
            length,
            source_id: source_id.into(),
        }
    }
}

/// One consumed stock piece and the cuts it carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeUsed {
    pub stock: StandardStockOption,
    /// Stock length in inches.
    pub stock_length: f64,
    pub cuts: Vec<RequiredCut>,
    /// Sum of the cuts plus kerf between adjacent cuts.
    pub consumed_length: f64,
    pub scrap_length: f64,
    pub unit_rate: Decimal,
    pub weight: Option<Decimal>,
}

impl PipeUsed {
    pub fn kerf_loss(&self) -> f64 {
        self.consumed_length - self.cuts.iter().map(|c| c.length).sum::<f64>()
    }
}

/// Consumption of one stock length within a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockUsage {
    pub stock: StandardStockOption,
    pub stock_length: f64,
    pub count: u32,
    pub total_scrap: f64,
    pub cost: Decimal,
}

/// Derived view of a plan. Always recomputable from the pieces.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CuttingPlanSummary {
    pub by_stock: Vec<StockUsage>,
    pub total_pieces: usize,
    pub total_cuts: usize,
    pub total_scrap: f64,
    pub total_cost: Decimal,
    pub total_weight: Option<Decimal>,
    pub utilization_percent: f64,
}

impl CuttingPlanSummary {
    pub fn from_pieces(pieces: &[PipeUsed]) -> Self {
        let mut by_stock: Vec<StockUsage> = Vec::new();
        for piece in pieces {
            match by_stock.iter_mut().find(|u| u.stock.same_as(&piece.stock)) {
                Some(usage) => {
                    usage.count += 1;
                    usage.total_scrap += piece.scrap_length;
                    usage.cost += piece.unit_rate;
                }
                None => by_stock.push(StockUsage {
                    stock: piece.stock,
                    stock_length: piece.stock_length,
                    count: 1,
                    total_scrap: piece.scrap_length,
                    cost: piece.unit_rate,
                }),
            }
        }
        by_stock.sort_by(|a, b| b.stock_length.total_cmp(&a.stock_length));

        let total_stock: f64 = pieces.iter().map(|p| p.stock_length).sum();
        let total_cut: f64 = pieces
            .iter()
            .flat_map(|p| &p.cuts)
            .map(|c| c.length)
            .sum();
        let utilization_percent = if total_stock > 0.0 {
            total_cut / total_stock * 100.0
        } else {
            0.0
        };

        let total_weight = if pieces.is_empty() {
            None
        } else {
            pieces
                .iter()
                .map(|p| p.weight)
                .sum::<Option<Decimal>>()
        };

        Self {
            total_pieces: pieces.len(),
            total_cuts: pieces.iter().map(|p| p.cuts.len()).sum(),
            total_scrap: pieces.iter().map(|p| p.scrap_length).sum(),
            total_cost: by_stock.iter().map(|u| u.cost).sum(),
            total_weight,
            utilization_percent,
            by_stock,
        }
    }
}

/// The result of packing one material's cuts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CuttingPlan {
    pub material_id: String,
    /// Kerf the plan was computed with, in inches.
    pub kerf: f64,
    pub pieces: Vec<PipeUsed>,
    pub summary: CuttingPlanSummary,
    /// The working stock copy after every piece in the plan was taken.
    pub remaining_stock: Vec<ConsolidatedStock>,
}

impl CuttingPlan {
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }
}

/// A width x length requirement for panel or roll material.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: f64,
    pub length: f64,
}

impl Dimensions {
    pub fn new(width: f64, length: f64) -> Self {
        Self { width, length }
    }

    pub fn area(&self) -> f64 {
        self.width * self.length
    }

    pub fn rotated(&self) -> Self {
        Self {
            width: self.length,
            length: self.width,
        }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(len: i64) -> StandardStockOption {
        StandardStockOption::new(Decimal::from(len), Unit::Inch)
    }

    fn piece(len: i64, cuts: &[f64], kerf: f64, rate: i64, weight: Option<Decimal>) -> PipeUsed {
        let cut_total: f64 = cuts.iter().sum();
        let consumed = cut_total + kerf * (cuts.len().saturating_sub(1)) as f64;
        PipeUsed {
            stock: option(len),
            stock_length: len as f64,
            cuts: cuts
                .iter()
                .enumerate()
                .map(|(i, &l)| RequiredCut::new(l, format!("c{i}")))
                .collect(),
            consumed_length: consumed,
            scrap_length: len as f64 - consumed,
            unit_rate: Decimal::from(rate),
            weight,
        }
    }

    #[test]
    fn test_same_as_ignores_scale() {
        let a = StandardStockOption::new(Decimal::new(1440, 1), Unit::Inch);
        assert!(a.same_as(&option(144)));
        assert!(!a.same_as(&StandardStockOption::new(Decimal::from(144), Unit::Millimeter)));
    }

    #[test]
    fn test_kerf_loss() {
        let p = piece(144, &[50.0, 40.0, 30.0], 0.125, 0, None);
        assert!((p.kerf_loss() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_summary_groups_by_stock() {
        let pieces = vec![
            piece(120, &[100.0], 0.125, 10, None),
            piece(144, &[100.0, 40.0], 0.125, 12, None),
            piece(120, &[60.0, 50.0], 0.125, 10, None),
        ];
        let summary = CuttingPlanSummary::from_pieces(&pieces);
        assert_eq!(summary.total_pieces, 3);
        assert_eq!(summary.total_cuts, 5);
        assert_eq!(summary.by_stock.len(), 2);
        assert_eq!(summary.by_stock[0].stock_length, 144.0);
        assert_eq!(summary.by_stock[1].count, 2);
        assert!((summary.by_stock[1].total_scrap - (20.0 + 9.875)).abs() < 1e-9);
        assert_eq!(summary.total_cost, Decimal::from(32));
        assert_eq!(summary.total_weight, None);
    }

    #[test]
    fn test_summary_weight_requires_every_piece() {
        let pieces = vec![
            piece(120, &[100.0], 0.0, 0, Some(Decimal::new(125, 1))),
            piece(120, &[100.0], 0.0, 0, Some(Decimal::new(125, 1))),
        ];
        let summary = CuttingPlanSummary::from_pieces(&pieces);
        assert_eq!(summary.total_weight, Some(Decimal::from(25)));

        let mixed = vec![
            piece(120, &[100.0], 0.0, 0, Some(Decimal::ONE)),
            piece(120, &[100.0], 0.0, 0, None),
        ];
        assert_eq!(CuttingPlanSummary::from_pieces(&mixed).total_weight, None);
    }

    #[test]
    fn test_summary_empty() {
        let summary = CuttingPlanSummary::from_pieces(&[]);
        assert_eq!(summary.total_pieces, 0);
        assert_eq!(summary.utilization_percent, 0.0);
    }

    #[test]
    fn test_dimensions_rotated() {
        let d = Dimensions::new(5.0, 3.0);
        assert_eq!(d.rotated(), Dimensions::new(3.0, 5.0));
        assert_eq!(d.area(), 15.0);
        assert_eq!(d.to_string(), "5x3");
    }
}
