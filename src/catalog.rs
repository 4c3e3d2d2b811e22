use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde::{Deserialize, Serialize};

use crate::error::{ConversionError, OptimizeError};
use crate::types::{ConsolidatedStock, StandardStockOption, StockBatch};
use crate::units::{Unit, UnitConverter};

/// A material document as stored, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum RawMaterial {
    /// Older records: bare numbers sharing one unit.
    Legacy {
        id: String,
        #[serde(default)]
        name: String,
        unit: Unit,
        standard_lengths: Vec<Decimal>,
        #[serde(default)]
        batches: Vec<StockBatch>,
        #[serde(default)]
        gauge: Option<String>,
    },
    Current {
        id: String,
        #[serde(default)]
        name: String,
        #[serde(default)]
        stock_options: Vec<StandardStockOption>,
        #[serde(default)]
        standard_widths: Vec<StandardStockOption>,
        #[serde(default)]
        batches: Vec<StockBatch>,
        #[serde(default)]
        gauge: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: String,
    pub name: String,
    pub stock_options: Vec<StandardStockOption>,
    pub standard_widths: Vec<StandardStockOption>,
    pub stock: Vec<ConsolidatedStock>,
    pub gauge: Option<String>,
}

impl Material {
    pub fn new(id: impl Into<String>, batches: &[StockBatch]) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            stock_options: Vec::new(),
            standard_widths: Vec::new(),
            stock: consolidate(batches),
            gauge: None,
        }
    }
}

impl From<RawMaterial> for Material {
    fn from(raw: RawMaterial) -> Self {
        match raw {
            RawMaterial::Legacy {
                id,
                name,
                unit,
                standard_lengths,
                batches,
                gauge,
            } => Material {
                id,
                name,
                stock_options: standard_lengths
                    .into_iter()
                    .map(|len| StandardStockOption::new(len, unit))
                    .collect(),
                standard_widths: Vec::new(),
                stock: consolidate(&batches),
                gauge,
            },
            RawMaterial::Current {
                id,
                name,
                stock_options,
                standard_widths,
                batches,
                gauge,
            } => Material {
                id,
                name,
                stock_options,
                standard_widths,
                stock: consolidate(&batches),
                gauge,
            },
        }
    }
}

/// Merges batches that share length and unit.
///
/// Quantities are summed. The unit rate becomes the quantity-weighted average.
/// Output follows the order each length first appears in.
pub fn consolidate(batches: &[StockBatch]) -> Vec<ConsolidatedStock> {
    let mut merged: Vec<(ConsolidatedStock, Decimal)> = Vec::new();
    for batch in batches {
        let option = StandardStockOption::new(batch.length, batch.unit);
        let value = batch.unit_rate * Decimal::from(batch.quantity);
        match merged.iter_mut().find(|(s, _)| s.option.same_as(&option)) {
            Some((stock, total_value)) => {
                if stock.unit_rate != batch.unit_rate {
                    tracing::warn!(
                        length = %option,
                        existing = %stock.unit_rate,
                        incoming = %batch.unit_rate,
                        "averaging mismatched unit rates"
                    );
                }
                stock.quantity = stock.quantity.saturating_add(batch.quantity);
                *total_value += value;
            }
            None => merged.push((
                ConsolidatedStock {
                    option,
                    quantity: batch.quantity,
                    unit_rate: batch.unit_rate,
                },
                value,
            )),
        }
    }

    merged
        .into_iter()
        .map(|(mut stock, total_value)| {
            if stock.quantity > 0 {
                stock.unit_rate = (total_value / Decimal::from(stock.quantity)).round_dp(4);
            }
            stock
        })
        .collect()
}

/// One cuttable length in the working copy.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub option: StandardStockOption,
    /// Length in inches.
    pub length: f64,
    pub quantity: u32,
    pub unit_rate: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockCatalog {
    material_id: String,
    gauge: Option<String>,
    entries: Vec<CatalogEntry>,
}

impl StockCatalog {
    /// Builds the working copy for one material.
    ///
    /// Standard lengths without stock appear with quantity zero. Stocked
    /// lengths that are not in the standard list are still offered.
    pub fn build(
        material: &Material,
        converter: &impl UnitConverter,
        epsilon: f64,
    ) -> Result<Self, OptimizeError> {
        let mut entries: Vec<CatalogEntry> = Vec::new();

        let stocked = material
            .stock
            .iter()
            .map(|s| (s.option, s.quantity, s.unit_rate));
        let standard = material
            .stock_options
            .iter()
            .map(|o| (*o, 0u32, Decimal::ZERO));

        for (option, quantity, unit_rate) in standard.chain(stocked) {
            let length = canonical_length(&material.id, &option, converter)?;
            match entries
                .iter_mut()
                .find(|e| (e.length - length).abs() <= epsilon)
            {
                Some(entry) => {
                    let total = entry.quantity.saturating_add(quantity);
                    if total > 0 {
                        entry.unit_rate = ((entry.unit_rate * Decimal::from(entry.quantity)
                            + unit_rate * Decimal::from(quantity))
                            / Decimal::from(total))
                        .round_dp(4);
                    }
                    entry.quantity = total;
                }
                None => entries.push(CatalogEntry {
                    option,
                    length,
                    quantity,
                    unit_rate,
                }),
            }
        }

        if entries.is_empty() {
            return Err(OptimizeError::InvalidStockConfiguration(format!(
                "material '{}' has no standard lengths",
                material.id
            )));
        }

        entries.sort_by(|a, b| b.length.total_cmp(&a.length));

        Ok(Self {
            material_id: material.id.clone(),
            gauge: material.gauge.clone(),
            entries,
        })
    }

    pub fn material_id(&self) -> &str {
        &self.material_id
    }

    pub fn gauge(&self) -> Option<&str> {
        self.gauge.as_deref()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn largest_length(&self) -> f64 {
        self.entries.first().map_or(0.0, |e| e.length)
    }

    pub fn available(&self) -> u32 {
        self.entries.iter().map(|e| e.quantity).sum()
    }

    /// Takes one piece of the entry at `idx`. Returns false when none is left.
    pub fn take(&mut self, idx: usize) -> bool {
        match self.entries.get_mut(idx) {
            Some(entry) if entry.quantity > 0 => {
                entry.quantity -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn into_stock(self) -> Vec<ConsolidatedStock> {
        self.entries
            .into_iter()
            .map(|e| ConsolidatedStock {
                option: e.option,
                quantity: e.quantity,
                unit_rate: e.unit_rate,
            })
            .collect()
    }
}

fn canonical_length(
    material_id: &str,
    option: &StandardStockOption,
    converter: &impl UnitConverter,
) -> Result<f64, OptimizeError> {
    let length = converter
        .to_inches(option.nominal_length, option.unit)
        .map_err(|e| {
            OptimizeError::InvalidStockConfiguration(format!(
                "material '{material_id}': standard length {option} cannot be used: {e}"
            ))
        })?;
    if length <= 0.0 {
        return Err(OptimizeError::InvalidStockConfiguration(format!(
            "material '{material_id}': standard length {option} must be positive"
        )));
    }
    Ok(length)
}

/// Weight per unit length, keyed by gauge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WeightTable {
    pub unit: Unit,
    pub rates: BTreeMap<String, Decimal>,
}

impl WeightTable {
    pub fn new(unit: Unit) -> Self {
        Self {
            unit,
            rates: BTreeMap::new(),
        }
    }

    pub fn with_rate(mut self, gauge: impl Into<String>, per_unit: Decimal) -> Self {
        self.rates.insert(gauge.into(), per_unit);
        self
    }

    /// Weight of one full stock piece, or `None` for an unknown gauge.
    pub fn piece_weight(
        &self,
        gauge: &str,
        option: &StandardStockOption,
        converter: &impl UnitConverter,
    ) -> Result<Option<Decimal>, ConversionError> {
        let Some(rate) = self.rates.get(gauge) else {
            return Ok(None);
        };
        let length = converter.convert_decimal(option.nominal_length, option.unit, self.unit)?;
        let length = Decimal::from_f64(length).ok_or_else(|| ConversionError::NonFinite {
            value: length.to_string(),
            from: option.unit,
            to: self.unit,
        })?;
        Ok(Some((rate * length).round_dp(3)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::StandardConverter;

    fn batch(len: i64, unit: Unit, qty: u32, rate: &str) -> StockBatch {
        StockBatch {
            length: Decimal::from(len),
            unit,
            quantity: qty,
            unit_rate: rate.parse().unwrap(),
        }
    }

    struct BrokenConverter;

    impl UnitConverter for BrokenConverter {
        fn convert(&self, value: f64, from: Unit, to: Unit) -> Result<f64, ConversionError> {
            Err(ConversionError::NonFinite {
                value: value.to_string(),
                from,
                to,
            })
        }
    }

    #[test]
    fn test_consolidate_merges_same_length_and_unit() {
        let stock = consolidate(&[
            batch(144, Unit::Inch, 2, "10"),
            batch(120, Unit::Inch, 1, "8"),
            batch(144, Unit::Inch, 2, "12"),
        ]);
        assert_eq!(stock.len(), 2);
        assert_eq!(stock[0].quantity, 4);
        assert_eq!(stock[0].unit_rate, Decimal::from(11));
        assert_eq!(stock[1].option.nominal_length, Decimal::from(120));
    }

    #[test]
    fn test_consolidate_keeps_units_apart() {
        let stock = consolidate(&[batch(12, Unit::Foot, 1, "5"), batch(12, Unit::Inch, 1, "1")]);
        assert_eq!(stock.len(), 2);
    }

    #[test]
    fn test_legacy_and_current_normalize_alike() {
        let legacy: RawMaterial = serde_json::from_value(serde_json::json!({
            "shape": "legacy",
            "id": "pipe-1",
            "unit": "ft",
            "standard_lengths": ["12", "10"],
            "batches": [{"length": "12", "unit": "ft", "quantity": 3, "unit_rate": "20.5"}]
        }))
        .unwrap();
        let current: RawMaterial = serde_json::from_value(serde_json::json!({
            "shape": "current",
            "id": "pipe-1",
            "stock_options": [
                {"nominal_length": "12", "unit": "ft"},
                {"nominal_length": "10", "unit": "ft"}
            ],
            "batches": [{"length": "12", "unit": "ft", "quantity": 3, "unit_rate": "20.5"}]
        }))
        .unwrap();
        assert_eq!(Material::from(legacy), Material::from(current));
    }

    #[test]
    fn test_catalog_merges_units_and_sorts_descending() {
        let mut material = Material::new(
            "tube",
            &[batch(144, Unit::Inch, 2, "10"), batch(10, Unit::Foot, 1, "9")],
        );
        material.stock_options = vec![
            StandardStockOption::new(Decimal::from(12), Unit::Foot),
            StandardStockOption::new(Decimal::from(20), Unit::Foot),
        ];
        let catalog = StockCatalog::build(&material, &StandardConverter, 0.001).unwrap();
        let lengths: Vec<f64> = catalog.entries().iter().map(|e| e.length).collect();
        assert_eq!(lengths, vec![240.0, 144.0, 120.0]);
        assert_eq!(catalog.entries()[0].quantity, 0);
        assert_eq!(catalog.entries()[1].quantity, 2);
        assert_eq!(catalog.entries()[1].unit_rate, Decimal::from(10));
        assert_eq!(catalog.available(), 3);
        assert_eq!(catalog.largest_length(), 240.0);
    }

    #[test]
    fn test_catalog_without_lengths_is_invalid() {
        let material = Material::new("empty", &[]);
        let err = StockCatalog::build(&material, &StandardConverter, 0.001).unwrap_err();
        assert!(matches!(err, OptimizeError::InvalidStockConfiguration(_)));
    }

    #[test]
    fn test_catalog_conversion_failure_is_invalid_configuration() {
        let material = Material::new("pipe", &[batch(144, Unit::Inch, 1, "1")]);
        let err = StockCatalog::build(&material, &BrokenConverter, 0.001).unwrap_err();
        assert!(matches!(err, OptimizeError::InvalidStockConfiguration(_)));
    }

    #[test]
    fn test_catalog_rejects_area_unit_lengths() {
        let material = Material::new("sheet", &[batch(10, Unit::SquareFoot, 1, "1")]);
        assert!(StockCatalog::build(&material, &StandardConverter, 0.001).is_err());
    }

    #[test]
    fn test_take_never_goes_negative() {
        let material = Material::new("pipe", &[batch(144, Unit::Inch, 1, "1")]);
        let mut catalog = StockCatalog::build(&material, &StandardConverter, 0.001).unwrap();
        assert!(catalog.take(0));
        assert!(!catalog.take(0));
        assert!(!catalog.take(5));
        assert_eq!(catalog.entries()[0].quantity, 0);
    }

    #[test]
    fn test_piece_weight() {
        let table = WeightTable::new(Unit::Foot).with_rate("16ga", "0.85".parse().unwrap());
        let option = StandardStockOption::new(Decimal::from(240), Unit::Inch);
        let weight = table.piece_weight("16ga", &option, &StandardConverter).unwrap();
        assert_eq!(weight, Some("17.000".parse().unwrap()));
        assert_eq!(table.piece_weight("14ga", &option, &StandardConverter).unwrap(), None);
    }

    #[test]
    fn test_weight_table_from_json() {
        let table: WeightTable =
            serde_json::from_str(r#"{"unit": "ft", "rates": {"14ga": "1.25"}}"#).unwrap();
        assert_eq!(table, WeightTable::new(Unit::Foot).with_rate("14ga", "1.25".parse().unwrap()));
    }
}
