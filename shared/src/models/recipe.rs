//! Recipes (bill of materials) and production batches

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ItemTotals;
use crate::error::{DomainError, DomainResult};
use crate::types::week_start_of;
use crate::validation::{checked_product, checked_sum};

/// One ingredient line of a recipe, in base units
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecipeComponent {
    pub ingredient: String,
    pub qty_per_unit: Decimal,
    pub unit: String,
}

/// Ingredients needed to make one unit of a menu item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recipe {
    pub item: String,
    pub components: Vec<RecipeComponent>,
}

impl Recipe {
    pub fn new(item: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            components: Vec::new(),
        }
    }

    pub fn with(mut self, ingredient: &str, qty_per_unit: Decimal, unit: &str) -> Self {
        self.components.push(RecipeComponent {
            ingredient: ingredient.to_string(),
            qty_per_unit,
            unit: unit.to_string(),
        });
        self
    }
}

/// The kitchen's recipe set. Item lookup is case-insensitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Recipe>", into = "Vec<Recipe>")]
pub struct RecipeBook {
    recipes: BTreeMap<String, Recipe>,
}

fn recipe_key(item: &str) -> String {
    item.trim().to_lowercase()
}

impl RecipeBook {
    pub fn new(recipes: impl IntoIterator<Item = Recipe>) -> Self {
        Self {
            recipes: recipes
                .into_iter()
                .map(|r| (recipe_key(&r.item), r))
                .collect(),
        }
    }

    pub fn get(&self, item: &str) -> Option<&Recipe> {
        self.recipes.get(&recipe_key(item))
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> {
        self.recipes.values()
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

impl Default for RecipeBook {
    /// The house menu: cappuccino and latte
    fn default() -> Self {
        Self::new([
            Recipe::new("capucino")
                .with("beans", Decimal::from(10), "g")
                .with("milk", Decimal::from(150), "ml"),
            Recipe::new("Latte")
                .with("beans", Decimal::from(8), "g")
                .with("milk", Decimal::from(200), "ml"),
        ])
    }
}

impl From<Vec<Recipe>> for RecipeBook {
    fn from(recipes: Vec<Recipe>) -> Self {
        Self::new(recipes)
    }
}

impl From<RecipeBook> for Vec<Recipe> {
    fn from(book: RecipeBook) -> Self {
        book.recipes.into_values().collect()
    }
}

/// Required amount of one ingredient in a batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchIngredient {
    pub quantity: Decimal,
    pub unit: String,
}

/// Ingredient requirements for one production date
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionBatch {
    pub production_date: NaiveDate,
    pub week_start: NaiveDate,
    /// Menu items planned for the day
    pub items: ItemTotals,
    pub ingredients: BTreeMap<String, BatchIngredient>,
    pub planned_at: DateTime<Utc>,
}

impl ProductionBatch {
    pub fn required(&self, ingredient: &str) -> Decimal {
        self.ingredients
            .get(ingredient)
            .map(|i| i.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }

    /// Equality on the planned content, ignoring when it was planned
    pub fn same_content(&self, other: &ProductionBatch) -> bool {
        self.production_date == other.production_date
            && self.items == other.items
            && self.ingredients == other.ingredients
    }
}

/// Expand the day's ordered items into ingredient requirements.
///
/// Every ordered item must have a recipe; the first missing one (in item order)
/// is reported. Items with a zero quantity are ignored.
pub fn plan_production(
    production_date: NaiveDate,
    day_totals: &ItemTotals,
    book: &RecipeBook,
    planned_at: DateTime<Utc>,
) -> DomainResult<ProductionBatch> {
    let mut ingredients: BTreeMap<String, BatchIngredient> = BTreeMap::new();
    let mut items = ItemTotals::new();

    for (item, &quantity) in day_totals.iter().filter(|(_, q)| **q > 0) {
        let recipe = book
            .get(item)
            .ok_or_else(|| DomainError::RecipeMissing { item: item.clone() })?;
        items.insert(item.clone(), quantity);

        for component in &recipe.components {
            let field = format!("ingredients.{}", component.ingredient);
            let needed = checked_product(&field, Decimal::from(quantity), component.qty_per_unit)?;
            match ingredients.get_mut(&component.ingredient) {
                Some(existing) if existing.unit != component.unit => {
                    return Err(DomainError::validation(
                        format!("recipes.{}", recipe.item),
                        format!(
                            "ingredient '{}' measured in both {} and {}",
                            component.ingredient, existing.unit, component.unit
                        ),
                    ));
                }
                Some(existing) => {
                    existing.quantity = checked_sum(&field, existing.quantity, needed)?
                }
                None => {
                    ingredients.insert(
                        component.ingredient.clone(),
                        BatchIngredient {
                            quantity: needed,
                            unit: component.unit.clone(),
                        },
                    );
                }
            }
        }
    }

    Ok(ProductionBatch {
        production_date,
        week_start: week_start_of(production_date),
        items,
        ingredients,
        planned_at,
    })
}
