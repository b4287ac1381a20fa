use crate::{
    entities::commerce::{
        cart, cart_item, cart_item_exclusion, Cart, CartItem, CartItemExclusion, CartItemModel,
        CartModel, Recipe, RecipeModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::commerce::{
        catalog_service::{ensure_servings_in_range, load_priced_recipe, normalize_recipe},
        pricing_service::{round_money, PriceBreakdown, PricedRecipe},
    },
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr,
    EntityTrait, QueryFilter, QueryOrder, Set, SqlErr, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Most units of one recipe a single cart line may hold.
pub const MAX_ITEM_QUANTITY: i32 = 99;

/// Per-user shopping cart.
///
/// Every mutation runs in one transaction that first claims the cart by
/// bumping its version; a concurrent writer that read the same version fails
/// with [`ServiceError::ConcurrentModification`]. Item prices are only ever
/// written by [`persist_item`], which recomputes them from the recipe,
/// servings and exclusions.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// The user's cart with priced lines, created on first access.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, user_id: &str) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let (cart, created) = get_or_create_cart(&txn, user_id).await?;
        let lines = load_lines(&txn, cart.id).await?;
        txn.commit().await?;

        if created {
            self.publish_cart_created(&cart).await;
        }
        Ok(CartView::new(&cart, &lines))
    }

    /// Adds a recipe to the cart.
    ///
    /// Re-adding a recipe already in the cart increments its quantity and
    /// replaces its servings and exclusions; the merged quantity may not
    /// exceed [`MAX_ITEM_QUANTITY`]. Exclusion ids that do not parse or do
    /// not belong to the recipe are dropped.
    #[instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: &str,
        input: AddToCartInput,
    ) -> Result<CartItemView, ServiceError> {
        input.validate()?;
        let quantity = input.quantity.unwrap_or(1);

        let txn = self.db.begin().await?;
        let (cart, created) = get_or_create_cart(&txn, user_id).await?;
        let cart = claim_cart(&txn, &cart).await?;

        let recipe = Recipe::find_by_id(input.recipe_id)
            .one(&txn)
            .await?
            .filter(|recipe| recipe.is_published)
            .map(normalize_recipe)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Recipe {} not found", input.recipe_id))
            })?;

        if !recipe.is_available_on(Utc::now().date_naive()) {
            return Err(ServiceError::ValidationError(format!(
                "{} is not in season",
                recipe.name
            )));
        }

        let servings = input.servings.unwrap_or(recipe.default_servings);
        ensure_servings_in_range(&recipe, servings)?;

        let priced = load_priced_recipe(&txn, &recipe).await?;
        let exclusions = priced.sanitize_exclusions(&input.excluded_ingredients);

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::RecipeId.eq(recipe.id))
            .one(&txn)
            .await?;

        let (target, quantity) = match existing {
            Some(item) => {
                let total = item.quantity + quantity;
                if total > MAX_ITEM_QUANTITY {
                    return Err(ServiceError::ValidationError(format!(
                        "Cart already holds {} of {}; at most {} allowed",
                        item.quantity, recipe.name, MAX_ITEM_QUANTITY
                    )));
                }
                (ItemTarget::Existing(item), total)
            }
            None => (
                ItemTarget::New {
                    cart_id: cart.id,
                    recipe_id: recipe.id,
                },
                quantity,
            ),
        };

        let (item, breakdown) =
            persist_item(&txn, target, &priced, servings, quantity, &exclusions).await?;

        txn.commit().await?;

        if created {
            self.publish_cart_created(&cart).await;
        }
        self.event_sender
            .send_or_log(Event::CartItemAdded {
                cart_id: cart.id,
                item_id: item.id,
                recipe_id: recipe.id,
            })
            .await;

        info!(
            "Added {} x{} ({} servings) to cart {}",
            recipe.slug, item.quantity, item.servings, cart.id
        );
        Ok(CartItemView::build(
            &item,
            &recipe,
            exclusions.into_iter().collect(),
            breakdown.savings,
        ))
    }

    /// Replaces an item's quantity, servings and exclusions. A quantity of
    /// zero or less removes the item and returns `None`.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: &str,
        item_id: Uuid,
        input: UpdateCartItemInput,
    ) -> Result<Option<CartItemView>, ServiceError> {
        input.validate()?;

        let txn = self.db.begin().await?;
        let (item, cart) = owned_item(&txn, user_id, item_id).await?;
        let cart = claim_cart(&txn, &cart).await?;

        if input.quantity <= 0 {
            CartItem::delete_by_id(item.id).exec(&txn).await?;
            txn.commit().await?;

            self.event_sender
                .send_or_log(Event::CartItemRemoved {
                    cart_id: cart.id,
                    item_id,
                })
                .await;
            info!("Removed item {} from cart {}", item_id, cart.id);
            return Ok(None);
        }

        let recipe = Recipe::find_by_id(item.recipe_id)
            .one(&txn)
            .await?
            .map(normalize_recipe)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Recipe {} not found", item.recipe_id))
            })?;

        let servings = input.servings.unwrap_or(item.servings);
        ensure_servings_in_range(&recipe, servings)?;

        let priced = load_priced_recipe(&txn, &recipe).await?;
        let exclusions = priced.sanitize_exclusions(&input.excluded_ingredients);

        let (item, breakdown) = persist_item(
            &txn,
            ItemTarget::Existing(item),
            &priced,
            servings,
            input.quantity,
            &exclusions,
        )
        .await?;

        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemUpdated {
                cart_id: cart.id,
                item_id,
            })
            .await;

        info!("Updated item {} in cart {}", item_id, cart.id);
        Ok(Some(CartItemView::build(
            &item,
            &recipe,
            exclusions.into_iter().collect(),
            breakdown.savings,
        )))
    }

    #[instrument(skip(self))]
    pub async fn remove_item(&self, user_id: &str, item_id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;
        let (item, cart) = owned_item(&txn, user_id, item_id).await?;
        let cart = claim_cart(&txn, &cart).await?;

        CartItem::delete_by_id(item.id).exec(&txn).await?;
        txn.commit().await?;

        self.event_sender
            .send_or_log(Event::CartItemRemoved {
                cart_id: cart.id,
                item_id,
            })
            .await;

        info!("Removed item {} from cart {}", item_id, cart.id);
        Ok(())
    }

    async fn publish_cart_created(&self, cart: &CartModel) {
        self.event_sender
            .send_or_log(Event::CartCreated {
                cart_id: cart.id,
                user_id: cart.user_id.clone(),
            })
            .await;
    }
}

/// Finds the user's cart, inserting an empty one if there is none.
/// The flag is true when the cart was created by this call.
pub(crate) async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<(CartModel, bool), ServiceError> {
    if let Some(cart) = Cart::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        return Ok((cart, false));
    }

    let now = Utc::now();
    let inserted = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id.to_string()),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(conn)
    .await;

    match inserted {
        Ok(cart) => {
            info!("Created cart {} for user {}", cart.id, user_id);
            Ok((cart, true))
        }
        Err(err) if is_unique_violation(&err) => {
            warn!("Cart for user {} was created concurrently", user_id);
            Err(ServiceError::Conflict(
                "Cart was created concurrently; retry the request".to_string(),
            ))
        }
        Err(err) => Err(err.into()),
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Claims the cart for this transaction by advancing its version.
pub(crate) async fn claim_cart<C: ConnectionTrait>(
    conn: &C,
    cart: &CartModel,
) -> Result<CartModel, ServiceError> {
    let next_version = cart.version + 1;
    let now = Utc::now();

    let result = Cart::update_many()
        .col_expr(cart::Column::Version, Expr::value(next_version))
        .col_expr(cart::Column::UpdatedAt, Expr::value(now))
        .filter(cart::Column::Id.eq(cart.id))
        .filter(cart::Column::Version.eq(cart.version))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        return Err(ServiceError::ConcurrentModification(cart.id));
    }

    Ok(CartModel {
        version: next_version,
        updated_at: now,
        ..cart.clone()
    })
}

/// Loads an item and its cart, failing unless the cart belongs to `user_id`.
async fn owned_item<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
    item_id: Uuid,
) -> Result<(CartItemModel, CartModel), ServiceError> {
    let (item, cart) = CartItem::find_by_id(item_id)
        .find_also_related(Cart)
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Cart item {} not found", item_id)))?;

    let cart = cart.ok_or_else(|| {
        ServiceError::NotFound(format!("Cart for item {} not found", item_id))
    })?;

    if cart.user_id != user_id {
        return Err(ServiceError::AuthorizationError(format!(
            "Cart item {} belongs to another user",
            item_id
        )));
    }

    Ok((normalize_item(item), cart))
}

enum ItemTarget {
    New { cart_id: Uuid, recipe_id: Uuid },
    Existing(CartItemModel),
}

/// The only writer of cart item prices: prices the customization, stores
/// the item and replaces its exclusion rows.
async fn persist_item<C: ConnectionTrait>(
    conn: &C,
    target: ItemTarget,
    priced: &PricedRecipe,
    servings: i32,
    quantity: i32,
    exclusions: &BTreeSet<Uuid>,
) -> Result<(CartItemModel, PriceBreakdown), ServiceError> {
    let breakdown = priced.customized_price(servings, exclusions)?;
    let now = Utc::now();

    let item = match target {
        ItemTarget::New { cart_id, recipe_id } => {
            cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart_id),
                recipe_id: Set(recipe_id),
                servings: Set(servings),
                quantity: Set(quantity),
                original_price: Set(breakdown.original_price),
                customized_price: Set(breakdown.customized_price),
                added_at: Set(now),
                updated_at: Set(now),
            }
            .insert(conn)
            .await?
        }
        ItemTarget::Existing(item) => {
            let mut active: cart_item::ActiveModel = item.into();
            active.servings = Set(servings);
            active.quantity = Set(quantity);
            active.original_price = Set(breakdown.original_price);
            active.customized_price = Set(breakdown.customized_price);
            active.updated_at = Set(now);
            active.update(conn).await?
        }
    };

    CartItemExclusion::delete_many()
        .filter(cart_item_exclusion::Column::CartItemId.eq(item.id))
        .exec(conn)
        .await?;

    if !exclusions.is_empty() {
        let rows = exclusions
            .iter()
            .map(|recipe_ingredient_id| cart_item_exclusion::ActiveModel {
                cart_item_id: Set(item.id),
                recipe_ingredient_id: Set(*recipe_ingredient_id),
            });
        CartItemExclusion::insert_many(rows)
            .exec_without_returning(conn)
            .await?;
    }

    Ok((normalize_item(item), breakdown))
}

/// A cart item with its recipe and excluded recipe ingredient ids.
#[derive(Debug, Clone)]
pub(crate) struct CartLine {
    pub item: CartItemModel,
    pub recipe: RecipeModel,
    pub exclusions: Vec<Uuid>,
}

/// All lines of a cart, oldest first.
pub(crate) async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Vec<CartLine>, ServiceError> {
    let rows = CartItem::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .order_by_asc(cart_item::Column::AddedAt)
        .order_by_asc(cart_item::Column::Id)
        .find_also_related(Recipe)
        .all(conn)
        .await?;

    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let item_ids: Vec<Uuid> = rows.iter().map(|(item, _)| item.id).collect();
    let mut exclusions: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
    for row in CartItemExclusion::find()
        .filter(cart_item_exclusion::Column::CartItemId.is_in(item_ids))
        .all(conn)
        .await?
    {
        exclusions
            .entry(row.cart_item_id)
            .or_default()
            .push(row.recipe_ingredient_id);
    }

    rows.into_iter()
        .map(|(item, recipe)| {
            let recipe = recipe.ok_or_else(|| {
                ServiceError::InternalError(format!("Cart item {} has no recipe", item.id))
            })?;
            let mut excluded = exclusions.remove(&item.id).unwrap_or_default();
            excluded.sort();
            Ok(CartLine {
                item: normalize_item(item),
                recipe: normalize_recipe(recipe),
                exclusions: excluded,
            })
        })
        .collect()
}

fn normalize_item(mut item: CartItemModel) -> CartItemModel {
    item.original_price = round_money(item.original_price);
    item.customized_price = round_money(item.customized_price);
    item
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct AddToCartInput {
    pub recipe_id: Uuid,
    /// Defaults to the recipe's default servings
    pub servings: Option<i32>,
    /// Defaults to 1
    #[validate(range(min = 1, max = 99))]
    pub quantity: Option<i32>,
    /// Recipe ingredient ids to leave out
    #[serde(default)]
    pub excluded_ingredients: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct UpdateCartItemInput {
    /// Zero or less removes the item
    #[validate(range(max = 99))]
    pub quantity: i32,
    /// Keeps the current servings when absent
    pub servings: Option<i32>,
    /// Replaces the current exclusions
    #[serde(default)]
    pub excluded_ingredients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartItemView {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub recipe_slug: String,
    pub servings: i32,
    pub quantity: i32,
    pub original_price: Decimal,
    pub customized_price: Decimal,
    pub savings: Decimal,
    pub line_total: Decimal,
    pub excluded_ingredients: Vec<Uuid>,
}

impl CartItemView {
    fn build(
        item: &CartItemModel,
        recipe: &RecipeModel,
        excluded_ingredients: Vec<Uuid>,
        savings: Decimal,
    ) -> Self {
        Self {
            id: item.id,
            recipe_id: recipe.id,
            recipe_name: recipe.name.clone(),
            recipe_slug: recipe.slug.clone(),
            servings: item.servings,
            quantity: item.quantity,
            original_price: item.original_price,
            customized_price: item.customized_price,
            savings,
            line_total: item.line_total(),
            excluded_ingredients,
        }
    }

    fn from_line(line: &CartLine) -> Self {
        let savings = (line.item.original_price - line.item.customized_price).max(Decimal::ZERO);
        Self::build(&line.item, &line.recipe, line.exclusions.clone(), savings)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CartView {
    pub cart_id: Uuid,
    pub version: i32,
    pub items: Vec<CartItemView>,
    pub subtotal: Decimal,
    pub item_count: usize,
    pub total_units: i32,
}

impl CartView {
    pub(crate) fn new(cart: &CartModel, lines: &[CartLine]) -> Self {
        let items: Vec<CartItemView> = lines.iter().map(CartItemView::from_line).collect();
        Self {
            cart_id: cart.id,
            version: cart.version,
            subtotal: items.iter().map(|item| item.line_total).sum(),
            item_count: items.len(),
            total_units: items.iter().map(|item| item.quantity).sum(),
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::commerce::Difficulty;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, original: Decimal, customized: Decimal) -> CartLine {
        let recipe_id = Uuid::new_v4();
        CartLine {
            item: CartItemModel {
                id: Uuid::new_v4(),
                cart_id: Uuid::nil(),
                recipe_id,
                servings: 4,
                quantity,
                original_price: original,
                customized_price: customized,
                added_at: Utc::now(),
                updated_at: Utc::now(),
            },
            recipe: RecipeModel {
                id: recipe_id,
                category_id: None,
                name: "Palak Paneer".into(),
                slug: "palak-paneer".into(),
                description: String::new(),
                instructions: String::new(),
                difficulty: Difficulty::Easy,
                prep_time_minutes: 15,
                cook_time_minutes: 25,
                default_servings: 4,
                min_servings: 1,
                max_servings: 8,
                base_price: dec!(299),
                is_published: true,
                is_seasonal: false,
                available_from: None,
                available_until: None,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            exclusions: Vec::new(),
        }
    }

    #[test]
    fn view_totals_use_customized_prices() {
        let cart = CartModel {
            id: Uuid::new_v4(),
            user_id: "user-1".into(),
            version: 3,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let lines = vec![
            line(2, dec!(224), dec!(180.50)),
            line(1, dec!(120), dec!(120)),
        ];

        let view = CartView::new(&cart, &lines);
        assert_eq!(view.subtotal, dec!(481));
        assert_eq!(view.item_count, 2);
        assert_eq!(view.total_units, 3);
        assert_eq!(view.items[0].savings, dec!(43.50));
        assert_eq!(view.items[0].line_total, dec!(361));
        assert!(!view.is_empty());
    }

    #[test]
    fn add_input_rejects_zero_quantity() {
        let input = AddToCartInput {
            recipe_id: Uuid::new_v4(),
            servings: None,
            quantity: Some(0),
            excluded_ingredients: Vec::new(),
        };
        assert!(input.validate().is_err());

        let input = AddToCartInput {
            quantity: None,
            ..input
        };
        assert!(input.validate().is_ok());
    }

    #[test]
    fn update_input_caps_quantity() {
        let input = UpdateCartItemInput {
            quantity: MAX_ITEM_QUANTITY + 1,
            servings: None,
            excluded_ingredients: Vec::new(),
        };
        assert!(input.validate().is_err());

        for quantity in [-1, 0, MAX_ITEM_QUANTITY] {
            let input = UpdateCartItemInput {
                quantity,
                ..input.clone()
            };
            assert!(input.validate().is_ok());
        }
    }

    #[tokio::test]
    async fn stale_cart_version_cannot_be_claimed() {
        let config = crate::db::DbConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            ..Default::default()
        };
        let db = crate::db::establish_connection_with_config(&config)
            .await
            .unwrap();
        crate::db::run_migrations(&db).await.unwrap();

        let (cart, created) = get_or_create_cart(&db, "user-1").await.unwrap();
        assert!(created);
        assert_eq!(cart.version, 0);

        let claimed = claim_cart(&db, &cart).await.unwrap();
        assert_eq!(claimed.version, 1);

        // `cart` still carries version 0, as a second writer's read would
        let err = claim_cart(&db, &cart).await.unwrap_err();
        assert!(matches!(err, ServiceError::ConcurrentModification(id) if id == cart.id));

        let stored = Cart::find_by_id(cart.id).one(&db).await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        assert!(claim_cart(&db, &claimed).await.is_ok());
    }
}
