use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Costed reference ingredient
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ingredients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub default_unit: MeasurementUnit,
    /// Price of one `default_unit`
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price_per_unit: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub calories: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub protein_g: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub fat_g: Decimal,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub carbs_g: Decimal,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::recipe_ingredient::Entity")]
    RecipeIngredients,
}

impl Related<super::recipe_ingredient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeIngredients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Unit an ingredient is priced and measured in
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum MeasurementUnit {
    #[sea_orm(string_value = "g")]
    G,
    #[sea_orm(string_value = "kg")]
    Kg,
    #[sea_orm(string_value = "ml")]
    Ml,
    #[sea_orm(string_value = "l")]
    L,
    #[sea_orm(string_value = "cup")]
    Cup,
    #[sea_orm(string_value = "tbsp")]
    Tbsp,
    #[sea_orm(string_value = "tsp")]
    Tsp,
    #[sea_orm(string_value = "piece")]
    Piece,
    #[sea_orm(string_value = "slice")]
    Slice,
}
