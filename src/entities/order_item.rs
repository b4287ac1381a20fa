use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Frozen copy of a cart item taken at checkout
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,
    /// Null once the recipe is deleted; `recipe_name` keeps the label
    #[sea_orm(nullable)]
    pub recipe_id: Option<Uuid>,
    pub recipe_name: String,
    pub servings: i32,
    pub quantity: i32,
    /// Comma-separated recipe ingredient ids, empty when nothing was excluded
    #[sea_orm(column_type = "Text")]
    pub excluded_ingredients: String,
    /// Unit price charged
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,
}

impl Model {
    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }

    pub fn excluded_ids(&self) -> Vec<Uuid> {
        self.excluded_ingredients
            .split(',')
            .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
            .collect()
    }
}

/// Serializes exclusion ids the way they are stored on an order item
pub fn encode_exclusions<'a>(ids: impl IntoIterator<Item = &'a Uuid>) -> String {
    ids.into_iter()
        .map(Uuid::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::commerce::recipe::Entity",
        from = "Column::RecipeId",
        to = "super::commerce::recipe::Column::Id",
        on_delete = "SetNull"
    )]
    Recipe,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::commerce::recipe::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Recipe.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
