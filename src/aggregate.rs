use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;
use crate::solver::LinearSolver;
use crate::store::MaterialSource;
use crate::types::{CuttingPlan, RequiredCut};
use crate::units::{Unit, UnitConverter};

fn one() -> u32 {
    1
}

/// Cuts of one material that a single unit of a line item needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialRequirement {
    pub material_id: String,
    pub length: Decimal,
    pub unit: Unit,
    #[serde(default = "one")]
    pub pieces_per_item: u32,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    pub quantity: u32,
    pub requirements: Vec<MaterialRequirement>,
}

impl LineItem {
    fn name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.id)
    }
}

/// What one line item needs, before packing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCuts {
    pub item_id: String,
    pub material_id: String,
    pub length: Decimal,
    pub unit: Unit,
    pub count: u32,
    pub label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PooledRequirements {
    pub by_material: BTreeMap<String, Vec<RequiredCut>>,
    pub per_item: Vec<ItemCuts>,
}

impl PooledRequirements {
    pub fn cut_count(&self) -> usize {
        self.by_material.values().map(Vec::len).sum()
    }
}

/// Collects every cut of every item, repeated by item quantity, keyed by material.
pub fn pool(
    items: &[LineItem],
    converter: &impl UnitConverter,
) -> Result<PooledRequirements, PlanError> {
    let mut pooled = PooledRequirements::default();

    for item in items {
        for req in &item.requirements {
            let count = item.quantity.saturating_mul(req.pieces_per_item);
            pooled.per_item.push(ItemCuts {
                item_id: item.id.clone(),
                material_id: req.material_id.clone(),
                length: req.length,
                unit: req.unit,
                count,
                label: req.label.clone(),
            });
            if count == 0 {
                continue;
            }

            let length = converter.to_inches(req.length, req.unit)?;
            let part = req.label.as_deref().unwrap_or(&req.material_id);
            let cuts = pooled.by_material.entry(req.material_id.clone()).or_default();
            for unit_no in 1..=item.quantity {
                for _ in 0..req.pieces_per_item {
                    cuts.push(RequiredCut::new(
                        length,
                        format!("{} #{}: {}", item.name(), unit_no, part),
                    ));
                }
            }
        }
    }

    Ok(pooled)
}

/// Cutting plans for every material an order uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPlan {
    pub materials: BTreeMap<String, CuttingPlan>,
    pub per_item: Vec<ItemCuts>,
}

/// Pools the order's cuts and packs each material once.
///
/// Any material failing fails the whole order.
pub fn optimize_order<C: UnitConverter>(
    items: &[LineItem],
    materials: &impl MaterialSource,
    solver: &LinearSolver<C>,
) -> Result<OrderPlan, PlanError> {
    let pooled = pool(items, solver.converter())?;
    tracing::debug!(
        items = items.len(),
        materials = pooled.by_material.len(),
        cuts = pooled.cut_count(),
        "pooled order requirements"
    );

    let mut plans = BTreeMap::new();
    for (material_id, cuts) in &pooled.by_material {
        let material = materials
            .material(material_id)?
            .ok_or_else(|| PlanError::MaterialNotFound(material_id.clone()))?;
        let catalog = solver
            .catalog(&material)
            .map_err(|e| PlanError::optimize(material_id, e))?;
        let plan = solver
            .solve(&catalog, cuts)
            .map_err(|e| PlanError::optimize(material_id, e))?;
        plans.insert(material_id.clone(), plan);
    }

    Ok(OrderPlan {
        materials: plans,
        per_item: pooled.per_item,
    })
}
