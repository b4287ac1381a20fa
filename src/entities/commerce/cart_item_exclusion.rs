use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Join row: a recipe ingredient the customer left out of a cart item
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "cart_item_exclusions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub cart_item_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub recipe_ingredient_id: Uuid,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cart_item::Entity",
        from = "Column::CartItemId",
        to = "super::cart_item::Column::Id",
        on_delete = "Cascade"
    )]
    CartItem,
    #[sea_orm(
        belongs_to = "super::recipe_ingredient::Entity",
        from = "Column::RecipeIngredientId",
        to = "super::recipe_ingredient::Column::Id",
        on_delete = "Cascade"
    )]
    RecipeIngredient,
}

impl Related<super::cart_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItem.def()
    }
}

impl Related<super::recipe_ingredient::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::RecipeIngredient.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
