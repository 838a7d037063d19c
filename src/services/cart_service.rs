use crate::database::DbPool;
use crate::entities::{
    cart_entity as carts, cart_item_entity as cart_items, product_entity as products,
    seller_product_entity as listings,
};
use crate::error::{AppError, AppResult};
use crate::models::{AddCartItemRequest, CartItemResponse, CartResponse, CartSummary};
use crate::utils::{checked_sum_cents, line_total_cents, validate_qty};
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use std::collections::HashMap;
use uuid::Uuid;

/// Folds carts and their items into per-cart subtotals and an overall total.
pub fn summarize(
    cart_list: Vec<carts::Model>,
    items: Vec<cart_items::Model>,
) -> AppResult<CartSummary> {
    let mut by_cart: HashMap<Uuid, Vec<cart_items::Model>> = HashMap::new();
    for item in items {
        by_cart.entry(item.cart_id).or_default().push(item);
    }

    let mut responses = Vec::with_capacity(cart_list.len());
    for cart in cart_list {
        let mut lines = Vec::new();
        for item in by_cart.remove(&cart.id).unwrap_or_default() {
            let total_cents = line_total_cents(item.price_cents, item.qty)?;
            lines.push(CartItemResponse {
                id: item.id,
                product_id: item.product_id,
                title: item.title,
                price_cents: item.price_cents,
                qty: item.qty,
                total_cents,
            });
        }

        let subtotal_cents = checked_sum_cents(lines.iter().map(|l| l.total_cents))?;
        let item_count = lines.iter().map(|l| i64::from(l.qty)).sum();
        responses.push(CartResponse {
            id: cart.id,
            seller_id: cart.seller_id,
            items: lines,
            subtotal_cents,
            item_count,
        });
    }

    Ok(CartSummary {
        total_cents: checked_sum_cents(responses.iter().map(|c| c.subtotal_cents))?,
        item_count: responses.iter().map(|c| c.item_count).sum(),
        carts: responses,
    })
}

#[derive(Clone)]
pub struct CartService {
    pool: DbPool,
}

impl CartService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_cart_summary(&self, user_id: Uuid) -> AppResult<CartSummary> {
        let cart_list = carts::Entity::find()
            .filter(carts::Column::UserId.eq(user_id))
            .order_by_asc(carts::Column::CreatedAt)
            .all(self.pool.as_ref())
            .await?;

        if cart_list.is_empty() {
            return summarize(Vec::new(), Vec::new());
        }

        // one query for the items of every cart
        let cart_ids: Vec<Uuid> = cart_list.iter().map(|c| c.id).collect();
        let items = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.is_in(cart_ids))
            .order_by_asc(cart_items::Column::CreatedAt)
            .all(self.pool.as_ref())
            .await?;

        summarize(cart_list, items)
    }

    pub async fn add_item(&self, user_id: Uuid, req: &AddCartItemRequest) -> AppResult<CartSummary> {
        validate_qty(req.qty)?;
        if req.seller_id == user_id {
            return Err(AppError::ValidationError(
                "You cannot buy your own products".to_string(),
            ));
        }

        let listing = listings::Entity::find_by_id((req.seller_id, req.product_id))
            .one(self.pool.as_ref())
            .await?
            .filter(|l| l.is_visible())
            .ok_or_else(|| AppError::NotFound("Listing not found".to_string()))?;
        let product = products::Entity::find_by_id(req.product_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

        let now = Utc::now();
        let txn = self.pool.begin().await?;

        carts::Entity::insert(carts::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            seller_id: Set(req.seller_id),
            created_at: Set(now),
            updated_at: Set(now),
        })
        .on_conflict(
            OnConflict::columns([carts::Column::UserId, carts::Column::SellerId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

        let cart = carts::Entity::find()
            .filter(carts::Column::UserId.eq(user_id))
            .filter(carts::Column::SellerId.eq(req.seller_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::InternalError("Cart missing after upsert".to_string()))?;

        let existing = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.eq(cart.id))
            .filter(cart_items::Column::ProductId.eq(req.product_id))
            .one(&txn)
            .await?;

        let new_qty = match &existing {
            Some(item) => item
                .qty
                .checked_add(req.qty)
                .ok_or_else(|| AppError::ValidationError("Quantity is too large".to_string()))?,
            None => req.qty,
        };
        if let Some(remaining) = listing.remaining_units()
            && new_qty > remaining
        {
            return Err(AppError::Conflict(format!(
                "Only {remaining} units of '{}' are available",
                product.title
            )));
        }

        match existing {
            Some(item) => {
                let mut am: cart_items::ActiveModel = item.into();
                am.qty = Set(new_qty);
                am.update(&txn).await?;
            }
            None => {
                cart_items::Entity::insert(cart_items::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(req.product_id),
                    title: Set(product.title.clone()),
                    price_cents: Set(listing.effective_price_cents()),
                    qty: Set(new_qty),
                    created_at: Set(now),
                })
                .exec_without_returning(&txn)
                .await?;
            }
        }

        touch_cart(&txn, cart.id).await?;
        txn.commit().await?;

        self.get_cart_summary(user_id).await
    }

    /// `qty = 0` removes the line.
    pub async fn update_item(&self, user_id: Uuid, item_id: Uuid, qty: i32) -> AppResult<CartSummary> {
        if qty < 0 {
            return Err(AppError::ValidationError(
                "Quantity must not be negative".to_string(),
            ));
        }
        let (item, cart) = self.find_own_item(user_id, item_id).await?;

        if qty == 0 {
            item.delete(self.pool.as_ref()).await?;
        } else {
            let listing = listings::Entity::find_by_id((cart.seller_id, item.product_id))
                .one(self.pool.as_ref())
                .await?
                .filter(|l| l.is_visible())
                .ok_or_else(|| {
                    AppError::Conflict(format!("'{}' is no longer available", item.title))
                })?;
            if let Some(remaining) = listing.remaining_units()
                && qty > remaining
            {
                return Err(AppError::Conflict(format!(
                    "Only {remaining} units of '{}' are available",
                    item.title
                )));
            }

            let mut am: cart_items::ActiveModel = item.into();
            am.qty = Set(qty);
            am.update(self.pool.as_ref()).await?;
            touch_cart(self.pool.as_ref(), cart.id).await?;
        }

        self.get_cart_summary(user_id).await
    }

    pub async fn remove_item(&self, user_id: Uuid, item_id: Uuid) -> AppResult<CartSummary> {
        let (item, _) = self.find_own_item(user_id, item_id).await?;
        item.delete(self.pool.as_ref()).await?;
        self.get_cart_summary(user_id).await
    }

    /// Deletes the cart together with its items.
    pub async fn clear_cart(&self, user_id: Uuid, cart_id: Uuid) -> AppResult<()> {
        let cart = carts::Entity::find_by_id(cart_id)
            .filter(carts::Column::UserId.eq(user_id))
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;

        let txn = self.pool.begin().await?;
        cart_items::Entity::delete_many()
            .filter(cart_items::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        carts::Entity::delete_by_id(cart.id).exec(&txn).await?;
        txn.commit().await?;
        Ok(())
    }

    async fn find_own_item(
        &self,
        user_id: Uuid,
        item_id: Uuid,
    ) -> AppResult<(cart_items::Model, carts::Model)> {
        let item = cart_items::Entity::find_by_id(item_id)
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;

        let cart = carts::Entity::find_by_id(item.cart_id)
            .filter(carts::Column::UserId.eq(user_id))
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Cart item not found".to_string()))?;
        Ok((item, cart))
    }
}

async fn touch_cart<C: sea_orm::ConnectionTrait>(conn: &C, cart_id: Uuid) -> AppResult<()> {
    carts::Entity::update_many()
        .col_expr(carts::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(carts::Column::Id.eq(cart_id))
        .exec(conn)
        .await?;
    Ok(())
}
