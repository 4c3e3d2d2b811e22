use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::aggregate::{LineItem, OrderPlan, optimize_order};
use crate::catalog::{Material, WeightTable};
use crate::config::OptimizerConfig;
use crate::error::PlanError;
use crate::solver::LinearSolver;
use crate::types::{ConsolidatedStock, StockUsage};
use crate::units::{StandardConverter, UnitConverter};

/// Loads materials by id.
pub trait MaterialSource {
    fn material(&self, id: &str) -> Result<Option<Material>, PlanError>;
}

impl MaterialSource for HashMap<String, Material> {
    fn material(&self, id: &str) -> Result<Option<Material>, PlanError> {
        Ok(self.get(id).cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Draft,
    Finalized,
}

/// The plan persisted alongside an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSnapshot {
    pub order_id: String,
    pub revision: u32,
    pub status: PlanStatus,
    pub config: OptimizerConfig,
    pub plan: OrderPlan,
}

/// Planning reads a snapshot of stock and never writes inventory. Commits
/// re-check every quantity under the inventory write lock before decrementing.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    materials: RwLock<HashMap<String, Material>>,
    plans: RwLock<HashMap<String, PlanSnapshot>>,
    weights: Option<WeightTable>,
}

fn lock_err(e: impl std::fmt::Display) -> PlanError {
    PlanError::Lock(e.to_string())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weights(mut self, weights: WeightTable) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn upsert_material(&self, material: Material) -> Result<(), PlanError> {
        let mut materials = self.materials.write().map_err(lock_err)?;
        materials.insert(material.id.clone(), material);
        Ok(())
    }

    pub fn order_plan(&self, order_id: &str) -> Result<Option<PlanSnapshot>, PlanError> {
        let plans = self.plans.read().map_err(lock_err)?;
        Ok(plans.get(order_id).cloned())
    }

    /// A linear solver carrying this store's weight table.
    pub fn solver(&self, config: OptimizerConfig) -> LinearSolver {
        let solver = LinearSolver::new(config);
        match &self.weights {
            Some(weights) => solver.with_weights(weights.clone()),
            None => solver,
        }
    }

    /// Computes and stores a draft plan for an order.
    ///
    /// A previous draft for the same order is discarded before planning, so an
    /// order never has two live plans. A finalized order cannot be re-planned.
    pub fn plan_order(
        &self,
        order_id: &str,
        items: &[LineItem],
        config: OptimizerConfig,
    ) -> Result<PlanSnapshot, PlanError> {
        let previous_revision = {
            let mut plans = self.plans.write().map_err(lock_err)?;
            match plans.get(order_id).map(|s| (s.status, s.revision)) {
                Some((PlanStatus::Finalized, _)) => {
                    return Err(PlanError::PlanFinalized(order_id.to_string()));
                }
                Some((PlanStatus::Draft, revision)) => {
                    tracing::info!(order = order_id, revision, "discarding draft plan");
                    plans.remove(order_id);
                    revision
                }
                None => 0,
            }
        };

        let plan = optimize_order(items, self, &self.solver(config))?;
        let snapshot = PlanSnapshot {
            order_id: order_id.to_string(),
            revision: previous_revision + 1,
            status: PlanStatus::Draft,
            config,
            plan,
        };

        let mut plans = self.plans.write().map_err(lock_err)?;
        if let Some(existing) = plans.get(order_id)
            && existing.status == PlanStatus::Finalized
        {
            return Err(PlanError::PlanFinalized(order_id.to_string()));
        }
        plans.insert(order_id.to_string(), snapshot.clone());
        tracing::info!(
            order = order_id,
            revision = snapshot.revision,
            materials = snapshot.plan.materials.len(),
            "stored draft plan"
        );
        Ok(snapshot)
    }

    /// Decrements inventory by an order's draft plan and finalizes it.
    ///
    /// Every material is checked before any is changed. If current stock can
    /// no longer cover the plan, nothing is written and the plan stays a draft.
    pub fn commit_order(&self, order_id: &str) -> Result<PlanSnapshot, PlanError> {
        let mut plans = self.plans.write().map_err(lock_err)?;
        let snapshot = plans
            .get_mut(order_id)
            .ok_or_else(|| PlanError::PlanNotFound(order_id.to_string()))?;
        if snapshot.status == PlanStatus::Finalized {
            return Err(PlanError::PlanFinalized(order_id.to_string()));
        }

        let mut materials = self.materials.write().map_err(lock_err)?;
        let mut updates = Vec::with_capacity(snapshot.plan.materials.len());
        for (material_id, plan) in &snapshot.plan.materials {
            let material = materials
                .get(material_id)
                .ok_or_else(|| PlanError::MaterialNotFound(material_id.clone()))?;
            let mut stock = material.stock.clone();
            for usage in &plan.summary.by_stock {
                take_pieces(material_id, &mut stock, usage, snapshot.config.epsilon)?;
            }
            updates.push((material_id.clone(), stock));
        }
        for (material_id, stock) in updates {
            if let Some(material) = materials.get_mut(&material_id) {
                material.stock = stock;
            }
        }

        snapshot.status = PlanStatus::Finalized;
        tracing::info!(order = order_id, revision = snapshot.revision, "committed plan");
        Ok(snapshot.clone())
    }
}

impl MaterialSource for InMemoryStore {
    fn material(&self, id: &str) -> Result<Option<Material>, PlanError> {
        let materials = self.materials.read().map_err(lock_err)?;
        Ok(materials.get(id).cloned())
    }
}

/// Removes `usage.count` pieces of the used length from `stock`, across every
/// batch entry of that length.
fn take_pieces(
    material_id: &str,
    stock: &mut [ConsolidatedStock],
    usage: &StockUsage,
    epsilon: f64,
) -> Result<(), PlanError> {
    let converter = StandardConverter;
    let mut matching = Vec::new();
    for (idx, entry) in stock.iter().enumerate() {
        let length = converter.to_inches(entry.option.nominal_length, entry.option.unit)?;
        if (length - usage.stock_length).abs() <= epsilon {
            matching.push(idx);
        }
    }

    let available: u32 = matching.iter().map(|&i| stock[i].quantity).sum();
    if available < usage.count {
        return Err(PlanError::StockChanged {
            material_id: material_id.to_string(),
            length: usage.stock.nominal_length,
            unit: usage.stock.unit,
            required: usage.count,
            available,
        });
    }

    let mut needed = usage.count;
    for idx in matching {
        let taken = needed.min(stock[idx].quantity);
        stock[idx].quantity -= taken;
        needed -= taken;
        if needed == 0 {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::MaterialRequirement;
    use crate::types::{RequiredCut, StockBatch};
    use crate::units::Unit;
    use rust_decimal::Decimal;

    fn store_with(stock: &[(i64, Unit, u32)]) -> InMemoryStore {
        let batches: Vec<StockBatch> = stock
            .iter()
            .map(|&(len, unit, qty)| StockBatch {
                length: Decimal::from(len),
                unit,
                quantity: qty,
                unit_rate: Decimal::TEN,
            })
            .collect();
        let store = InMemoryStore::new();
        store.upsert_material(Material::new("frame", &batches)).unwrap();
        store
    }

    fn order(len: i64, qty: u32) -> Vec<LineItem> {
        vec![LineItem {
            id: "item-1".to_string(),
            label: None,
            quantity: qty,
            requirements: vec![MaterialRequirement {
                material_id: "frame".to_string(),
                length: Decimal::from(len),
                unit: Unit::Inch,
                pieces_per_item: 1,
                label: None,
            }],
        }]
    }

    fn quantities(store: &InMemoryStore) -> Vec<u32> {
        store
            .material("frame")
            .unwrap()
            .unwrap()
            .stock
            .iter()
            .map(|s| s.quantity)
            .collect()
    }

    #[test]
    fn test_replanning_replaces_draft() {
        let store = store_with(&[(144, Unit::Inch, 5)]);
        let first = store.plan_order("o-1", &order(100, 2), OptimizerConfig::default()).unwrap();
        assert_eq!(first.revision, 1);
        let second = store.plan_order("o-1", &order(100, 3), OptimizerConfig::default()).unwrap();
        assert_eq!(second.revision, 2);

        let stored = store.order_plan("o-1").unwrap().unwrap();
        assert_eq!(stored, second);
        assert_eq!(stored.plan.materials["frame"].piece_count(), 3);
    }

    #[test]
    fn test_planning_does_not_touch_inventory() {
        let store = store_with(&[(144, Unit::Inch, 5)]);
        store.plan_order("o-1", &order(100, 2), OptimizerConfig::default()).unwrap();
        assert_eq!(quantities(&store), vec![5]);
    }

    #[test]
    fn test_failed_replan_leaves_no_plan() {
        let store = store_with(&[(144, Unit::Inch, 2)]);
        store.plan_order("o-1", &order(100, 2), OptimizerConfig::default()).unwrap();
        let err = store.plan_order("o-1", &order(100, 3), OptimizerConfig::default());
        assert!(matches!(err, Err(PlanError::Optimize { .. })));
        assert_eq!(store.order_plan("o-1").unwrap(), None);
    }

    #[test]
    fn test_commit_decrements_and_finalizes() {
        let store = store_with(&[(144, Unit::Inch, 2), (12, Unit::Foot, 1)]);
        store.plan_order("o-1", &order(100, 3), OptimizerConfig::default()).unwrap();
        let committed = store.commit_order("o-1").unwrap();
        assert_eq!(committed.status, PlanStatus::Finalized);
        assert_eq!(quantities(&store), vec![0, 0]);

        let err = store.plan_order("o-1", &order(100, 1), OptimizerConfig::default());
        assert_eq!(err, Err(PlanError::PlanFinalized("o-1".to_string())));
        assert_eq!(
            store.commit_order("o-1"),
            Err(PlanError::PlanFinalized("o-1".to_string()))
        );
    }

    #[test]
    fn test_second_commit_on_same_snapshot_is_rejected() {
        let store = store_with(&[(144, Unit::Inch, 2)]);
        store.plan_order("o-1", &order(100, 2), OptimizerConfig::default()).unwrap();
        store.plan_order("o-2", &order(100, 2), OptimizerConfig::default()).unwrap();

        store.commit_order("o-1").unwrap();
        let err = store.commit_order("o-2").unwrap_err();
        assert!(matches!(
            err,
            PlanError::StockChanged {
                required: 2,
                available: 0,
                ..
            }
        ));
        assert_eq!(
            store.order_plan("o-2").unwrap().unwrap().status,
            PlanStatus::Draft
        );
        assert_eq!(quantities(&store), vec![0]);
    }

    #[test]
    fn test_commit_unknown_order() {
        let store = InMemoryStore::new();
        assert_eq!(
            store.commit_order("nope"),
            Err(PlanError::PlanNotFound("nope".to_string()))
        );
    }

    #[test]
    fn test_weights_flow_into_plans() {
        let mut material = Material::new(
            "frame",
            &[StockBatch {
                length: Decimal::from(12),
                unit: Unit::Foot,
                quantity: 2,
                unit_rate: Decimal::ONE,
            }],
        );
        material.gauge = Some("14ga".to_string());
        let store = InMemoryStore::new()
            .with_weights(WeightTable::new(Unit::Foot).with_rate("14ga", Decimal::TWO));
        store.upsert_material(material).unwrap();
        let snapshot = store.plan_order("o-1", &order(100, 1), OptimizerConfig::default()).unwrap();
        assert_eq!(
            snapshot.plan.materials["frame"].summary.total_weight,
            Some(Decimal::from(24))
        );
    }

    #[test]
    fn test_store_solver_weighs_adhoc_material() {
        let mut material = Material::new(
            "adhoc",
            &[StockBatch {
                length: Decimal::from(10),
                unit: Unit::Foot,
                quantity: 1,
                unit_rate: Decimal::ONE,
            }],
        );
        material.gauge = Some("16ga".to_string());
        let store = InMemoryStore::new()
            .with_weights(WeightTable::new(Unit::Foot).with_rate("16ga", Decimal::new(5, 1)));
        let solver = store.solver(OptimizerConfig::default());
        let catalog = solver.catalog(&material).unwrap();
        let plan = solver
            .solve(&catalog, &[RequiredCut::new(60.0, "leg")])
            .unwrap();
        assert_eq!(plan.summary.total_weight, Some(Decimal::from(5)));

        let bare = InMemoryStore::new().solver(OptimizerConfig::default());
        let plan = bare.solve(&catalog, &[RequiredCut::new(60.0, "leg")]).unwrap();
        assert_eq!(plan.summary.total_weight, None);
    }
}
