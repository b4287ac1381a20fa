//! Recipe pricing engine.
//!
//! Pure functions over a recipe's ingredient list. Every quantity on a
//! recipe row is the amount needed for `default_servings`, so costs and
//! nutrition scale linearly by `servings / default_servings`. Nothing here
//! rounds except [`round_money`] and [`floor_price`], which callers apply
//! right before a value is persisted or shown.

use crate::{
    entities::commerce::{IngredientModel, MeasurementUnit, RecipeIngredientModel},
    errors::ServiceError,
};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::BTreeSet;
use uuid::Uuid;

/// Lowest unit price a customized line can be sold for.
pub const MIN_LINE_PRICE: Decimal = dec!(0.01);

/// Nutritional totals for a recipe at a given serving count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Nutrition {
    pub calories: Decimal,
    pub protein_g: Decimal,
    pub fat_g: Decimal,
    pub carbs_g: Decimal,
}

impl Nutrition {
    fn scaled(&self, factor: Decimal) -> Self {
        Self {
            calories: self.calories * factor,
            protein_g: self.protein_g * factor,
            fat_g: self.fat_g * factor,
            carbs_g: self.carbs_g * factor,
        }
    }

    fn accumulate(&mut self, other: &Self) {
        self.calories += other.calories;
        self.protein_g += other.protein_g;
        self.fat_g += other.fat_g;
        self.carbs_g += other.carbs_g;
    }

    /// Whole calories, grams to one decimal place.
    pub fn rounded(&self) -> Self {
        Self {
            calories: self.calories.trunc(),
            protein_g: self.protein_g.round_dp(1),
            fat_g: self.fat_g.round_dp(1),
            carbs_g: self.carbs_g.round_dp(1),
        }
    }
}

/// One costed ingredient row of a recipe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedIngredient {
    pub recipe_ingredient_id: Uuid,
    pub ingredient_id: Uuid,
    pub name: String,
    pub unit: MeasurementUnit,
    /// Amount for the recipe's default servings
    pub quantity: Decimal,
    pub price_per_unit: Decimal,
    pub is_optional: bool,
    pub notes: Option<String>,
    /// Nutrition of one unit of the ingredient
    pub nutrition: Nutrition,
}

impl PricedIngredient {
    pub fn from_models(row: &RecipeIngredientModel, ingredient: &IngredientModel) -> Self {
        Self {
            recipe_ingredient_id: row.id,
            ingredient_id: ingredient.id,
            name: ingredient.name.clone(),
            unit: ingredient.default_unit,
            quantity: row.quantity.round_dp(3).normalize(),
            price_per_unit: ingredient.price_per_unit.round_dp(2).normalize(),
            is_optional: row.is_optional,
            notes: row.notes.clone(),
            nutrition: Nutrition {
                calories: ingredient.calories.round_dp(2),
                protein_g: ingredient.protein_g.round_dp(2),
                fat_g: ingredient.fat_g.round_dp(2),
                carbs_g: ingredient.carbs_g.round_dp(2),
            },
        }
    }

    fn cost_at_default(&self) -> Decimal {
        self.price_per_unit * self.quantity
    }
}

/// A recipe together with everything the engine needs to price it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PricedRecipe {
    pub recipe_id: Uuid,
    pub default_servings: i32,
    pub lines: Vec<PricedIngredient>,
}

/// Outcome of pricing a customization, rounded for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PriceBreakdown {
    pub original_price: Decimal,
    pub savings: Decimal,
    pub customized_price: Decimal,
}

impl PricedRecipe {
    fn scale_factor(&self, servings: i32) -> Result<Decimal, ServiceError> {
        if self.default_servings <= 0 {
            return Err(ServiceError::InvalidServings(format!(
                "recipe {} has default servings {}",
                self.recipe_id, self.default_servings
            )));
        }
        if servings <= 0 {
            return Err(ServiceError::InvalidServings(format!(
                "servings must be positive, got {}",
                servings
            )));
        }
        Ok(Decimal::from(servings) / Decimal::from(self.default_servings))
    }

    /// Full ingredient cost of the recipe at `servings`, unrounded.
    pub fn cost_for_servings(&self, servings: i32) -> Result<Decimal, ServiceError> {
        let factor = self.scale_factor(servings)?;
        Ok(self
            .lines
            .iter()
            .map(|line| line.cost_at_default() * factor)
            .sum())
    }

    /// Scaled cost of a single ingredient row at `servings`, unrounded.
    pub fn cost_of_excluded(
        &self,
        line: &PricedIngredient,
        servings: i32,
    ) -> Result<Decimal, ServiceError> {
        let factor = self.scale_factor(servings)?;
        Ok(line.cost_at_default() * factor)
    }

    /// Price of the recipe at `servings` with the given rows left out.
    ///
    /// Ids that are not rows of this recipe contribute nothing. The result is
    /// floored at [`MIN_LINE_PRICE`] even when exclusions exceed the cost.
    pub fn customized_price(
        &self,
        servings: i32,
        exclusions: &BTreeSet<Uuid>,
    ) -> Result<PriceBreakdown, ServiceError> {
        let original = self.cost_for_servings(servings)?;

        let mut excluded = Decimal::ZERO;
        for line in self
            .lines
            .iter()
            .filter(|line| exclusions.contains(&line.recipe_ingredient_id))
        {
            excluded += self.cost_of_excluded(line, servings)?;
        }

        let original_price = round_money(original);
        let customized_price = floor_price(original - excluded);
        Ok(PriceBreakdown {
            original_price,
            savings: (original_price - customized_price).max(Decimal::ZERO),
            customized_price,
        })
    }

    /// Nutritional totals at `servings`, unrounded.
    pub fn nutrition_for_servings(&self, servings: i32) -> Result<Nutrition, ServiceError> {
        let factor = self.scale_factor(servings)?;
        let mut total = Nutrition::default();
        for line in &self.lines {
            total.accumulate(&line.nutrition.scaled(line.quantity));
        }
        Ok(total.scaled(factor))
    }

    pub fn has_line(&self, recipe_ingredient_id: Uuid) -> bool {
        self.lines
            .iter()
            .any(|line| line.recipe_ingredient_id == recipe_ingredient_id)
    }

    /// Maps an id naming either a recipe row or its ingredient to the row id.
    pub fn resolve_line(&self, id: Uuid) -> Option<Uuid> {
        self.lines
            .iter()
            .find(|line| line.recipe_ingredient_id == id || line.ingredient_id == id)
            .map(|line| line.recipe_ingredient_id)
    }

    /// Keeps only the raw ids that parse and name a row of this recipe.
    pub fn sanitize_exclusions<S: AsRef<str>>(&self, raw: &[S]) -> BTreeSet<Uuid> {
        raw.iter()
            .filter_map(|value| Uuid::parse_str(value.as_ref().trim()).ok())
            .filter(|id| self.has_line(*id))
            .collect()
    }
}

/// Rounds to cents, half away from zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds to cents and applies the minimum line price.
pub fn floor_price(amount: Decimal) -> Decimal {
    round_money(amount).max(MIN_LINE_PRICE)
}
