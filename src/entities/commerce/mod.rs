/// Catalog and cart entities
pub mod cart;
pub mod cart_item;
pub mod cart_item_exclusion;
pub mod ingredient;
pub mod recipe;
pub mod recipe_category;
pub mod recipe_ingredient;

// Re-export entities
pub use cart::{Entity as Cart, Model as CartModel};
pub use cart_item::{Entity as CartItem, Model as CartItemModel};
pub use cart_item_exclusion::{Entity as CartItemExclusion, Model as CartItemExclusionModel};
pub use ingredient::{Entity as Ingredient, MeasurementUnit, Model as IngredientModel};
pub use recipe::{Difficulty, Entity as Recipe, Model as RecipeModel};
pub use recipe_category::{Entity as RecipeCategory, Model as RecipeCategoryModel};
pub use recipe_ingredient::{Entity as RecipeIngredient, Model as RecipeIngredientModel};
