use crate::catalog::{Material, StockCatalog, WeightTable};
use crate::config::OptimizerConfig;
use crate::error::{OptimizeError, UnmetCut};
use crate::types::{CuttingPlan, CuttingPlanSummary, PipeUsed, RequiredCut};
use crate::units::{StandardConverter, Unit, UnitConverter};

/// Greedy first-fit-decreasing packer for linear cuts against finite stock.
///
/// Each iteration simulates packing every remaining cut onto one piece of
/// each stock length still in stock, and commits the piece that leaves the
/// least scrap. Equal scrap (within epsilon) goes to the longer length, the
/// first one in catalog order.
pub struct LinearSolver<C = StandardConverter> {
    config: OptimizerConfig,
    converter: C,
    weights: Option<WeightTable>,
}

#[derive(Debug)]
struct Candidate {
    entry: usize,
    placed: Vec<usize>,
    consumed: f64,
    scrap: f64,
}

impl LinearSolver<StandardConverter> {
    pub fn new(config: OptimizerConfig) -> Self {
        Self::with_converter(config, StandardConverter)
    }
}

impl<C: UnitConverter> LinearSolver<C> {
    pub fn with_converter(config: OptimizerConfig, converter: C) -> Self {
        Self {
            config,
            converter,
            weights: None,
        }
    }

    pub fn with_weights(mut self, weights: WeightTable) -> Self {
        self.weights = Some(weights);
        self
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    pub fn converter(&self) -> &C {
        &self.converter
    }

    pub fn catalog(&self, material: &Material) -> Result<StockCatalog, OptimizeError> {
        StockCatalog::build(material, &self.converter, self.config.epsilon)
    }

    /// Packs `cuts` onto a private copy of `catalog`.
    ///
    /// Either every cut lands on a piece or the call fails and nothing it
    /// took from the copy survives. The stock left after a successful run is
    /// returned in [`CuttingPlan::remaining_stock`].
    pub fn solve(
        &self,
        catalog: &StockCatalog,
        cuts: &[RequiredCut],
    ) -> Result<CuttingPlan, OptimizeError> {
        self.config.validate()?;
        self.check_requirements(catalog, cuts)?;

        let mut working = catalog.clone();
        let mut remaining = cuts.to_vec();
        remaining.sort_by(|a, b| b.length.total_cmp(&a.length));

        let mut pieces = Vec::new();
        while !remaining.is_empty() {
            let Some(best) = self.best_candidate(&working, &remaining) else {
                return Err(self.shortfall(catalog.material_id(), &remaining)?);
            };
            if !working.take(best.entry) {
                return Err(self.shortfall(catalog.material_id(), &remaining)?);
            }
            let piece = self.commit(&working, best, &mut remaining)?;
            tracing::debug!(
                material = catalog.material_id(),
                stock = %piece.stock,
                cuts = piece.cuts.len(),
                scrap = piece.scrap_length,
                "committed stock piece"
            );
            pieces.push(piece);
        }

        let summary = CuttingPlanSummary::from_pieces(&pieces);
        tracing::info!(
            material = catalog.material_id(),
            cuts = cuts.len(),
            pieces = summary.total_pieces,
            scrap = summary.total_scrap,
            "cutting plan computed"
        );

        Ok(CuttingPlan {
            material_id: catalog.material_id().to_string(),
            kerf: self.config.kerf,
            pieces,
            summary,
            remaining_stock: working.into_stock(),
        })
    }

    fn check_requirements(
        &self,
        catalog: &StockCatalog,
        cuts: &[RequiredCut],
    ) -> Result<(), OptimizeError> {
        if let Some(bad) = cuts
            .iter()
            .find(|c| !c.length.is_finite() || c.length <= 0.0)
        {
            return Err(OptimizeError::InvalidRequirement(format!(
                "cut '{}' has non-positive length {}",
                bad.source_id, bad.length
            )));
        }
        if catalog.entries().is_empty() {
            return Err(OptimizeError::InvalidStockConfiguration(format!(
                "material '{}' has no standard lengths",
                catalog.material_id()
            )));
        }

        let largest = catalog.largest_length();
        let longest = cuts.iter().fold(None::<&RequiredCut>, |acc, c| match acc {
            Some(a) if a.length >= c.length => Some(a),
            _ => Some(c),
        });
        if let Some(cut) = longest
            && cut.length > largest + self.config.epsilon
        {
            let unit = self.config.display_unit;
            return Err(OptimizeError::OversizedCut {
                source_id: cut.source_id.clone(),
                length: self.converter.convert(cut.length, Unit::Inch, unit)?,
                largest: self.converter.convert(largest, Unit::Inch, unit)?,
                unit,
            });
        }
        Ok(())
    }

    /// First-fit of the sorted cut list onto one piece of `stock_length`.
    fn pack_one(&self, stock_length: f64, remaining: &[RequiredCut]) -> (Vec<usize>, f64) {
        let mut placed = Vec::new();
        let mut used = 0.0;
        for (i, cut) in remaining.iter().enumerate() {
            let loss = if placed.is_empty() { 0.0 } else { self.config.kerf };
            if used + cut.length + loss <= stock_length + self.config.epsilon {
                used += cut.length + loss;
                placed.push(i);
            }
        }
        (placed, used)
    }

    fn best_candidate(&self, catalog: &StockCatalog, remaining: &[RequiredCut]) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;
        for (idx, entry) in catalog.entries().iter().enumerate() {
            if entry.quantity == 0 {
                continue;
            }
            let (placed, consumed) = self.pack_one(entry.length, remaining);
            if placed.is_empty() {
                continue;
            }
            let scrap = entry.length - consumed;
            if best
                .as_ref()
                .is_none_or(|b| scrap < b.scrap - self.config.epsilon)
            {
                best = Some(Candidate {
                    entry: idx,
                    placed,
                    consumed,
                    scrap,
                });
            }
        }
        best
    }

    fn commit(
        &self,
        catalog: &StockCatalog,
        candidate: Candidate,
        remaining: &mut Vec<RequiredCut>,
    ) -> Result<PipeUsed, OptimizeError> {
        // First-fit always takes the earliest of equal-length cuts, so removing
        // by position removes the same multiset as removing by length.
        let mut cuts = Vec::with_capacity(candidate.placed.len());
        for &i in candidate.placed.iter().rev() {
            cuts.push(remaining.remove(i));
        }
        cuts.reverse();

        let entry = &catalog.entries()[candidate.entry];
        let weight = match (&self.weights, catalog.gauge()) {
            (Some(table), Some(gauge)) => table.piece_weight(gauge, &entry.option, &self.converter)?,
            _ => None,
        };

        Ok(PipeUsed {
            stock: entry.option,
            stock_length: entry.length,
            cuts,
            consumed_length: candidate.consumed,
            scrap_length: candidate.scrap.max(0.0),
            unit_rate: entry.unit_rate,
            weight,
        })
    }

    fn shortfall(
        &self,
        material_id: &str,
        remaining: &[RequiredCut],
    ) -> Result<OptimizeError, OptimizeError> {
        let unit = self.config.display_unit;
        let unmet = remaining
            .iter()
            .map(|c| {
                Ok::<_, OptimizeError>(UnmetCut {
                    length: self.converter.convert(c.length, Unit::Inch, unit)?,
                    unit,
                    source_id: c.source_id.clone(),
                })
            })
            .collect::<Result<Vec<_>, OptimizeError>>()?;
        tracing::info!(material = material_id, unmet = unmet.len(), "stock shortfall");
        Ok(OptimizeError::Shortfall {
            material_id: material_id.to_string(),
            unmet,
        })
    }
}

/// Packs the pooled cuts of one material against that material's stock.
pub fn optimize_material_cutting(
    material: &Material,
    cuts: &[RequiredCut],
    config: &OptimizerConfig,
) -> Result<CuttingPlan, OptimizeError> {
    let solver = LinearSolver::new(*config);
    let catalog = solver.catalog(material)?;
    solver.solve(&catalog, cuts)
}
