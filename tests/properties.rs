//! Property tests for the linear packer
//!
//! - Conservation: every required cut lands on exactly one piece
//! - Capacity: no piece holds more than its stock length
//! - Non-negativity: the working stock never underflows
//! - Determinism: identical inputs give identical plans

use cut_planner::catalog::Material;
use cut_planner::config::OptimizerConfig;
use cut_planner::error::OptimizeError;
use cut_planner::solver::{LinearSolver, optimize_material_cutting};
use cut_planner::types::{RequiredCut, StockBatch};
use cut_planner::units::Unit;
use proptest::prelude::*;
use rust_decimal::Decimal;

const EPS: f64 = OptimizerConfig::DEFAULT_EPSILON_IN;

fn material(stock: &[(u32, u32)]) -> Material {
    let batches: Vec<StockBatch> = stock
        .iter()
        .map(|&(len, qty)| StockBatch {
            length: Decimal::from(len),
            unit: Unit::Inch,
            quantity: qty,
            unit_rate: Decimal::ONE,
        })
        .collect();
    Material::new("prop", &batches)
}

fn cuts(lengths: &[u32]) -> Vec<RequiredCut> {
    lengths
        .iter()
        .enumerate()
        // Quarter-inch lengths keep sums exact in f64.
        .map(|(i, &q)| RequiredCut::new(q as f64 / 4.0, format!("cut-{i}")))
        .collect()
}

fn stock_strategy() -> impl Strategy<Value = Vec<(u32, u32)>> {
    prop::collection::vec((48u32..=240, 0u32..6), 1..5)
}

fn cut_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(4u32..=960, 0..25)
}

proptest! {
    #[test]
    fn prop_conservation_and_capacity(stock in stock_strategy(), lengths in cut_strategy()) {
        let required = cuts(&lengths);
        let config = OptimizerConfig::default();
        match optimize_material_cutting(&material(&stock), &required, &config) {
            Ok(plan) => {
                let mut expected: Vec<(u64, String)> = required
                    .iter()
                    .map(|c| (c.length.to_bits(), c.source_id.clone()))
                    .collect();
                let mut placed: Vec<(u64, String)> = plan
                    .pieces
                    .iter()
                    .flat_map(|p| &p.cuts)
                    .map(|c| (c.length.to_bits(), c.source_id.clone()))
                    .collect();
                expected.sort();
                placed.sort();
                prop_assert_eq!(placed, expected);

                for piece in &plan.pieces {
                    prop_assert!(!piece.cuts.is_empty());
                    prop_assert!(piece.consumed_length <= piece.stock_length + EPS);
                    prop_assert!(piece.scrap_length >= -EPS);
                }

                let start: u32 = stock.iter().map(|&(_, q)| q).sum();
                let left: u32 = plan.remaining_stock.iter().map(|s| s.quantity).sum();
                prop_assert_eq!(start - left, plan.piece_count() as u32);
            }
            Err(OptimizeError::Shortfall { unmet, .. }) => {
                prop_assert!(!unmet.is_empty());
                prop_assert!(unmet.len() <= required.len());
            }
            Err(OptimizeError::OversizedCut { length, largest, .. }) => {
                prop_assert!(length > largest);
            }
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn prop_deterministic(stock in stock_strategy(), lengths in cut_strategy()) {
        let required = cuts(&lengths);
        let m = material(&stock);
        let solver = LinearSolver::new(OptimizerConfig::default());
        let catalog = solver.catalog(&m).unwrap();
        let a = solver.solve(&catalog, &required);
        let b = solver.solve(&catalog, &required);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_input_order_does_not_change_piece_count(
        stock in stock_strategy(),
        lengths in cut_strategy(),
    ) {
        let required = cuts(&lengths);
        let mut reversed = required.clone();
        reversed.reverse();
        let config = OptimizerConfig::default();
        let m = material(&stock);
        let a = optimize_material_cutting(&m, &required, &config).map(|p| p.piece_count());
        let b = optimize_material_cutting(&m, &reversed, &config).map(|p| p.piece_count());
        prop_assert_eq!(a.is_ok(), b.is_ok());
        if let (Ok(a), Ok(b)) = (a, b) {
            prop_assert_eq!(a, b);
        }
    }
}

#[test]
fn test_oversize_reported_before_stock_is_touched() {
    let m = material(&[(144, 3)]);
    let required = vec![RequiredCut::new(200.0, "header")];
    let err = optimize_material_cutting(&m, &required, &OptimizerConfig::default()).unwrap_err();
    assert!(matches!(err, OptimizeError::OversizedCut { ref source_id, .. } if source_id == "header"));
    assert_eq!(m.stock[0].quantity, 3);
}

#[test]
fn test_shortfall_names_the_second_cut() {
    let m = material(&[(120, 1)]);
    let required = vec![RequiredCut::new(100.0, "left"), RequiredCut::new(100.0, "right")];
    let config = OptimizerConfig::default();
    let err = optimize_material_cutting(&m, &required, &config).unwrap_err();
    let OptimizeError::Shortfall { unmet, .. } = err else {
        panic!("expected shortfall");
    };
    assert_eq!(unmet.len(), 1);
    assert_eq!(unmet[0].length, 100.0);
    assert_eq!(unmet[0].source_id, "right");
}
