//! Ingredient stock models and consumption rules

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ProductionBatch;
use crate::error::{DomainError, DomainResult};
use crate::validation::{validate_name, validate_positive_quantity, MAX_QUANTITY};

/// Default reorder threshold as a fraction of the par level
const DEFAULT_THRESHOLD_RATIO: Decimal = Decimal::from_parts(1, 0, 0, false, 1); // 0.1

/// Current level of one ingredient
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockItem {
    pub ingredient: String,
    pub quantity: Decimal,
    /// At or below this level automatic procurement is triggered
    pub reorder_threshold: Decimal,
    /// Baseline level used to size replenishment
    pub par_level: Decimal,
    pub unit: String,
    pub updated_at: DateTime<Utc>,
}

impl StockItem {
    pub fn needs_reorder(&self) -> bool {
        self.quantity <= self.reorder_threshold
    }

    /// Quantity to request when restocking: back up to par, but never less than
    /// half of par.
    pub fn replenishment_quantity(&self) -> Decimal {
        let base = if self.par_level > Decimal::ZERO {
            self.par_level
        } else {
            self.reorder_threshold * Decimal::TWO
        };
        (base - self.quantity)
            .max(base / Decimal::TWO)
            .max(Decimal::ONE)
    }
}

/// Initial stock definition, loaded from configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockSeed {
    pub ingredient: String,
    pub quantity: Decimal,
    pub unit: String,
    #[serde(default)]
    pub par_level: Option<Decimal>,
    #[serde(default)]
    pub reorder_threshold: Option<Decimal>,
}

impl StockSeed {
    pub fn new(ingredient: &str, quantity: i64, unit: &str) -> Self {
        Self {
            ingredient: ingredient.to_string(),
            quantity: Decimal::from(quantity),
            unit: unit.to_string(),
            par_level: None,
            reorder_threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: Decimal) -> Self {
        self.reorder_threshold = Some(threshold);
        self
    }

    pub fn with_par_level(mut self, par_level: Decimal) -> Self {
        self.par_level = Some(par_level);
        self
    }

    pub fn into_item(self, now: DateTime<Utc>) -> DomainResult<StockItem> {
        validate_name("ingredient", &self.ingredient)?;
        if self.quantity < Decimal::ZERO {
            return Err(DomainError::validation("quantity", "must not be negative"));
        }
        if self.quantity > Decimal::from(MAX_QUANTITY) {
            return Err(DomainError::validation(
                "quantity",
                format!("must be at most {}", MAX_QUANTITY),
            ));
        }
        let par_level = self.par_level.unwrap_or(self.quantity);
        validate_positive_quantity("par_level", par_level)?;
        let reorder_threshold = self
            .reorder_threshold
            .unwrap_or(par_level * DEFAULT_THRESHOLD_RATIO);
        if reorder_threshold < Decimal::ZERO || reorder_threshold > Decimal::from(MAX_QUANTITY) {
            return Err(DomainError::validation(
                "reorder_threshold",
                format!("must be between 0 and {}", MAX_QUANTITY),
            ));
        }

        Ok(StockItem {
            ingredient: self.ingredient.trim().to_string(),
            quantity: self.quantity,
            reorder_threshold,
            par_level,
            unit: self.unit,
            updated_at: now,
        })
    }
}

/// The house seed stock: 10 kg of beans and 100 l of milk
pub fn default_seed_stock() -> Vec<StockSeed> {
    vec![
        StockSeed::new("beans", 10_000, "g"),
        StockSeed::new("milk", 100_000, "ml"),
    ]
}

/// An ingredient the stock cannot cover
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Shortfall {
    pub ingredient: String,
    pub required: Decimal,
    pub available: Decimal,
    pub unit: String,
}

/// Every ingredient of the batch whose requirement exceeds the stock, in
/// ingredient order. Ingredients without a stock row count as zero.
pub fn find_shortfalls(stock: &[StockItem], batch: &ProductionBatch) -> Vec<Shortfall> {
    let levels: BTreeMap<&str, Decimal> = stock
        .iter()
        .map(|s| (s.ingredient.as_str(), s.quantity))
        .collect();

    batch
        .ingredients
        .iter()
        .filter_map(|(ingredient, req)| {
            let available = levels.get(ingredient.as_str()).copied().unwrap_or(Decimal::ZERO);
            (req.quantity > available).then(|| Shortfall {
                ingredient: ingredient.clone(),
                required: req.quantity,
                available,
                unit: req.unit.clone(),
            })
        })
        .collect()
}

/// Compute the stock levels after consuming the batch, all-or-nothing.
///
/// Returns the updated rows for the consumed ingredients, or the first
/// deficient ingredient. Nothing is mutated.
pub fn plan_consumption(
    stock: &[StockItem],
    batch: &ProductionBatch,
    now: DateTime<Utc>,
) -> DomainResult<Vec<StockItem>> {
    if let Some(short) = find_shortfalls(stock, batch).into_iter().next() {
        return Err(DomainError::InsufficientStock {
            ingredient: short.ingredient,
            required: short.required,
            available: short.available,
        });
    }

    let by_name: BTreeMap<&str, &StockItem> =
        stock.iter().map(|s| (s.ingredient.as_str(), s)).collect();

    Ok(batch
        .ingredients
        .iter()
        .filter(|(_, req)| req.quantity > Decimal::ZERO)
        .filter_map(|(ingredient, req)| {
            by_name.get(ingredient.as_str()).map(|item| StockItem {
                quantity: item.quantity - req.quantity,
                updated_at: now,
                ..(*item).clone()
            })
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::BatchIngredient;
    use chrono::NaiveDate;

    fn item(name: &str, qty: i64, threshold: i64) -> StockItem {
        StockItem {
            ingredient: name.to_string(),
            quantity: Decimal::from(qty),
            reorder_threshold: Decimal::from(threshold),
            par_level: Decimal::from(100),
            unit: "ml".to_string(),
            updated_at: Utc::now(),
        }
    }

    fn batch(reqs: &[(&str, i64)]) -> ProductionBatch {
        ProductionBatch {
            production_date: NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            week_start: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            items: Default::default(),
            ingredients: reqs
                .iter()
                .map(|(i, q)| {
                    (
                        i.to_string(),
                        BatchIngredient {
                            quantity: Decimal::from(*q),
                            unit: "ml".to_string(),
                        },
                    )
                })
                .collect(),
            planned_at: Utc::now(),
        }
    }

    #[test]
    fn test_consumption_decrements() {
        let updated =
            plan_consumption(&[item("milk", 25, 10)], &batch(&[("milk", 20)]), Utc::now()).unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].quantity, Decimal::from(5));
        assert!(updated[0].needs_reorder());
    }

    #[test]
    fn test_consumption_to_exactly_zero_is_allowed() {
        let updated =
            plan_consumption(&[item("milk", 20, 10)], &batch(&[("milk", 20)]), Utc::now()).unwrap();
        assert_eq!(updated[0].quantity, Decimal::ZERO);
    }

    #[test]
    fn test_consumption_insufficient() {
        let err =
            plan_consumption(&[item("milk", 3, 10)], &batch(&[("milk", 20)]), Utc::now()).unwrap_err();
        assert_eq!(
            err,
            DomainError::InsufficientStock {
                ingredient: "milk".to_string(),
                required: Decimal::from(20),
                available: Decimal::from(3),
            }
        );
    }

    #[test]
    fn test_consumption_names_first_deficient_ingredient() {
        let stock = [item("beans", 1, 0), item("milk", 1, 0)];
        let err = plan_consumption(&stock, &batch(&[("milk", 5), ("beans", 5)]), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::InsufficientStock { ref ingredient, .. } if ingredient == "beans"));
    }

    #[test]
    fn test_unknown_ingredient_counts_as_zero() {
        let shortfalls = find_shortfalls(&[item("milk", 50, 10)], &batch(&[("sugar", 1)]));
        assert_eq!(shortfalls.len(), 1);
        assert_eq!(shortfalls[0].available, Decimal::ZERO);
    }

    #[test]
    fn test_replenishment_quantity() {
        // Back to par
        assert_eq!(item("milk", 5, 10).replenishment_quantity(), Decimal::from(95));
        // Never less than half of par
        assert_eq!(item("milk", 80, 90).replenishment_quantity(), Decimal::from(50));
    }

    #[test]
    fn test_seed_defaults_threshold_to_ten_percent_of_par() {
        let item = StockSeed::new("milk", 100_000, "ml").into_item(Utc::now()).unwrap();
        assert_eq!(item.par_level, Decimal::from(100_000));
        assert_eq!(item.reorder_threshold, Decimal::from(10_000));
    }

    #[test]
    fn test_seed_rejects_negative_quantity() {
        assert!(StockSeed::new("milk", -1, "ml").into_item(Utc::now()).is_err());
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Consumption either fails untouched or leaves every level non-negative
            #[test]
            fn prop_consumption_never_goes_negative(
                milk in 0i64..500,
                beans in 0i64..500,
                need_milk in 0i64..500,
                need_beans in 0i64..500,
            ) {
                let stock = [item("beans", beans, 0), item("milk", milk, 0)];
                let reqs = batch(&[("milk", need_milk), ("beans", need_beans)]);

                match plan_consumption(&stock, &reqs, Utc::now()) {
                    Ok(updated) => {
                        prop_assert!(need_milk <= milk && need_beans <= beans);
                        prop_assert!(updated.iter().all(|i| i.quantity >= Decimal::ZERO));
                        let total: Decimal = updated.iter().map(|i| i.quantity).sum();
                        let untouched: i64 = [(need_milk, milk), (need_beans, beans)]
                            .iter()
                            .filter(|(need, _)| *need == 0)
                            .map(|(_, have)| have)
                            .sum();
                        prop_assert_eq!(
                            total + Decimal::from(untouched),
                            Decimal::from(milk + beans - need_milk - need_beans)
                        );
                    }
                    Err(DomainError::InsufficientStock { .. }) => {
                        prop_assert!(need_milk > milk || need_beans > beans);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {}", other),
                }
            }
        }
    }
}
