use crate::database::DbPool;
use crate::entities::{
    InventoryMode, OrderStatus, PaymentMethod, cart_entity as carts,
    cart_item_entity as cart_items, order_entity as orders, order_item_entity as order_items,
    product_entity as products, seller_product_entity as listings,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    CheckoutRequest, ConfirmReceiptResponse, CreateOrderRequest, OrderDetailResponse,
    OrderLineRequest, OrderQuery, OrderResponse, PaginatedResponse, PaginationParams,
};
use crate::services::notification_service::{
    self, ORDER_PLACED, ORDER_STATUS_CHANGED, order_status_payload,
};
use crate::services::seller_service::ensure_seller_open;
use crate::services::RewardsService;
use crate::utils::{checked_sum_cents, line_total_cents, validate_qty};
use chrono::Utc;
use sea_orm::sea_query::{Alias, Expr, Func};
use sea_orm::{
    ColumnTrait, Condition, DatabaseTransaction, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::{Value, json};
use std::collections::HashSet;
use uuid::Uuid;

/// A priced line ready to be written as an order item.
#[derive(Debug, Clone)]
struct PricedLine {
    product_id: Uuid,
    title: String,
    price_cents: i64,
    qty: i32,
}

/// Validates line shape: at least one line, qty ≥ 1, no repeated product.
pub fn validate_lines(lines: &[OrderLineRequest]) -> AppResult<()> {
    if lines.is_empty() {
        return Err(AppError::ValidationError(
            "Order must contain at least one item".to_string(),
        ));
    }
    let mut seen = HashSet::with_capacity(lines.len());
    for line in lines {
        validate_qty(line.qty)?;
        if !seen.insert(line.product_id) {
            return Err(AppError::ValidationError(format!(
                "Product {} appears more than once",
                line.product_id
            )));
        }
    }
    Ok(())
}

pub fn validate_delivery_address(address: &Value) -> AppResult<()> {
    match address.as_object() {
        Some(map) if !map.is_empty() => Ok(()),
        _ => Err(AppError::ValidationError(
            "delivery_address must be a non-empty JSON object".to_string(),
        )),
    }
}

fn ensure_not_self_purchase(buyer_id: Uuid, seller_id: Uuid) -> AppResult<()> {
    if buyer_id == seller_id {
        return Err(AppError::ValidationError(
            "You cannot order from yourself".to_string(),
        ));
    }
    Ok(())
}

/// Reserves `qty` units with a conditional update; zero affected rows means not enough left.
async fn reserve(txn: &DatabaseTransaction, listing: &listings::Model, qty: i32, title: &str) -> AppResult<()> {
    let now = Utc::now();
    let base = listings::Entity::update_many()
        .col_expr(listings::Column::UpdatedAt, Expr::value(now))
        .filter(listings::Column::SellerId.eq(listing.seller_id))
        .filter(listings::Column::ProductId.eq(listing.product_id))
        .filter(listings::Column::Active.eq(true));

    let res = match listing.inventory_mode {
        InventoryMode::Count => {
            base.col_expr(
                listings::Column::Stock,
                Expr::col(listings::Column::Stock).sub(qty),
            )
            .filter(listings::Column::InventoryMode.eq(InventoryMode::Count))
            .filter(listings::Column::Stock.gte(qty))
            .exec(txn)
            .await?
        }
        InventoryMode::Availability => {
            // SET expressions read the pre-update row
            let reaches_limit = Expr::col(listings::Column::PortionLimit)
                .is_not_null()
                .and(
                    Expr::expr(Expr::col(listings::Column::PortionUsed).add(qty))
                        .gte(Expr::col(listings::Column::PortionLimit)),
                );
            base.col_expr(
                listings::Column::PortionUsed,
                Expr::col(listings::Column::PortionUsed).add(qty),
            )
            .col_expr(listings::Column::SoldOut, reaches_limit)
            .filter(listings::Column::InventoryMode.eq(InventoryMode::Availability))
            .filter(listings::Column::AvailableToday.eq(true))
            .filter(listings::Column::SoldOut.eq(false))
            .filter(
                Condition::any()
                    .add(listings::Column::PortionLimit.is_null())
                    .add(
                        Expr::expr(Expr::col(listings::Column::PortionUsed).add(qty))
                            .lte(Expr::col(listings::Column::PortionLimit)),
                    ),
            )
            .exec(txn)
            .await?
        }
    };

    if res.rows_affected == 0 {
        log::warn!(
            "Reservation of {qty} x {} at seller {} rejected",
            listing.product_id,
            listing.seller_id
        );
        return Err(AppError::Conflict(format!(
            "Not enough availability for '{title}'"
        )));
    }
    Ok(())
}

/// Puts the order's units back on the shelf.
async fn release(txn: &DatabaseTransaction, order: &orders::Model) -> AppResult<()> {
    let items = order_items::Entity::find()
        .filter(order_items::Column::OrderId.eq(order.id))
        .all(txn)
        .await?;

    for item in items {
        let Some(listing) = listings::Entity::find_by_id((order.seller_id, item.product_id))
            .one(txn)
            .await?
        else {
            log::warn!(
                "Listing {} of seller {} vanished; units of order {} not restored",
                item.product_id,
                order.seller_id,
                order.id
            );
            continue;
        };

        let update = listings::Entity::update_many()
            .col_expr(listings::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(listings::Column::SellerId.eq(listing.seller_id))
            .filter(listings::Column::ProductId.eq(listing.product_id));
        match listing.inventory_mode {
            InventoryMode::Count => {
                update
                    .col_expr(
                        listings::Column::Stock,
                        Expr::col(listings::Column::Stock).add(item.qty),
                    )
                    .exec(txn)
                    .await?;
            }
            InventoryMode::Availability => {
                // relative to the stored value, floored at zero
                let used = Func::cust(Alias::new("GREATEST"))
                    .arg(Expr::col(listings::Column::PortionUsed).sub(item.qty))
                    .arg(Expr::val(0));
                update
                    .col_expr(listings::Column::PortionUsed, used.into())
                    .col_expr(listings::Column::SoldOut, Expr::value(false))
                    .exec(txn)
                    .await?;
            }
        }
    }
    Ok(())
}

/// Moves an order to `next` if the transition is legal and nobody changed it meanwhile.
async fn transition(
    txn: &DatabaseTransaction,
    order: orders::Model,
    next: OrderStatus,
) -> AppResult<orders::Model> {
    if !order.status.can_transition_to(next) {
        return Err(AppError::Conflict(format!(
            "Cannot move order from {} to {}",
            order.status, next
        )));
    }

    let now = Utc::now();
    let res = orders::Entity::update_many()
        .set(orders::ActiveModel {
            status: Set(next),
            updated_at: Set(now),
            ..Default::default()
        })
        .filter(orders::Column::Id.eq(order.id))
        .filter(orders::Column::Status.eq(order.status))
        .exec(txn)
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::Conflict(
            "Order was modified concurrently".to_string(),
        ));
    }

    log::info!("Order {} moved from {} to {}", order.id, order.status, next);
    Ok(orders::Model {
        status: next,
        updated_at: now,
        ..order
    })
}

#[derive(Clone)]
pub struct OrderService {
    pool: DbPool,
}

impl OrderService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Direct order priced from the live listings.
    pub async fn place_order(
        &self,
        buyer_id: Uuid,
        req: &CreateOrderRequest,
    ) -> AppResult<OrderDetailResponse> {
        validate_lines(&req.items)?;
        validate_delivery_address(&req.delivery_address)?;
        ensure_not_self_purchase(buyer_id, req.seller_id)?;

        let txn = self.pool.begin().await?;
        ensure_seller_open(&txn, req.seller_id).await?;

        let mut lines = Vec::with_capacity(req.items.len());
        for line in &req.items {
            let listing = listings::Entity::find_by_id((req.seller_id, line.product_id))
                .one(&txn)
                .await?
                .filter(|l| l.active)
                .ok_or_else(|| {
                    AppError::NotFound(format!("Product {} is not sold here", line.product_id))
                })?;
            let product = products::Entity::find_by_id(line.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Product {} not found", line.product_id)))?;

            reserve(&txn, &listing, line.qty, &product.title).await?;
            lines.push(PricedLine {
                product_id: line.product_id,
                title: product.title,
                price_cents: listing.effective_price_cents(),
                qty: line.qty,
            });
        }

        let detail = create_order(
            &txn,
            buyer_id,
            req.seller_id,
            lines,
            req.payment_method,
            req.delivery_address.clone(),
            req.notes.clone(),
        )
        .await?;

        txn.commit().await?;
        Ok(detail)
    }

    /// Turns a cart into an order at its snapshot prices, then removes the cart.
    pub async fn checkout(
        &self,
        buyer_id: Uuid,
        req: &CheckoutRequest,
    ) -> AppResult<OrderDetailResponse> {
        validate_delivery_address(&req.delivery_address)?;

        let txn = self.pool.begin().await?;

        let cart = carts::Entity::find_by_id(req.cart_id)
            .filter(carts::Column::UserId.eq(buyer_id))
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::NotFound("Cart not found".to_string()))?;
        ensure_not_self_purchase(buyer_id, cart.seller_id)?;

        let items = cart_items::Entity::find()
            .filter(cart_items::Column::CartId.eq(cart.id))
            .order_by_asc(cart_items::Column::CreatedAt)
            .all(&txn)
            .await?;
        if items.is_empty() {
            return Err(AppError::ValidationError("Cart is empty".to_string()));
        }

        ensure_seller_open(&txn, cart.seller_id).await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            validate_qty(item.qty)?;
            let listing = listings::Entity::find_by_id((cart.seller_id, item.product_id))
                .one(&txn)
                .await?
                .ok_or_else(|| {
                    AppError::Conflict(format!("'{}' is no longer available", item.title))
                })?;

            reserve(&txn, &listing, item.qty, &item.title).await?;
            lines.push(PricedLine {
                product_id: item.product_id,
                title: item.title,
                price_cents: item.price_cents,
                qty: item.qty,
            });
        }

        let detail = create_order(
            &txn,
            buyer_id,
            cart.seller_id,
            lines,
            req.payment_method,
            req.delivery_address.clone(),
            req.notes.clone(),
        )
        .await?;

        cart_items::Entity::delete_many()
            .filter(cart_items::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        carts::Entity::delete_by_id(cart.id).exec(&txn).await?;

        txn.commit().await?;
        Ok(detail)
    }

    /// Seller side of the lifecycle: confirm, deliver or cancel.
    pub async fn update_status_as_seller(
        &self,
        seller_id: Uuid,
        order_id: Uuid,
        next: OrderStatus,
    ) -> AppResult<OrderResponse> {
        if !matches!(
            next,
            OrderStatus::SellerConfirmed | OrderStatus::Delivered | OrderStatus::Cancelled
        ) {
            return Err(AppError::ValidationError(format!(
                "Sellers cannot set status {next}"
            )));
        }

        let txn = self.pool.begin().await?;
        let order = find_order_for(&txn, order_id, |o| o.seller_id == seller_id).await?;

        // delivered goods have left the shelf; cancelling them restores nothing
        let restock = next == OrderStatus::Cancelled && order.status.holds_reservation();
        let updated = transition(&txn, order, next).await?;
        if restock {
            release(&txn, &updated).await?;
        }
        notification_service::enqueue(
            &txn,
            updated.user_id,
            ORDER_STATUS_CHANGED,
            order_status_payload(updated.id, next),
        )
        .await?;

        txn.commit().await?;
        Ok(updated.into())
    }

    /// Buyer confirms delivery; the order completes and earns points atomically.
    pub async fn confirm_receipt(
        &self,
        buyer_id: Uuid,
        order_id: Uuid,
    ) -> AppResult<ConfirmReceiptResponse> {
        let txn = self.pool.begin().await?;
        let order = find_order_for(&txn, order_id, |o| o.user_id == buyer_id).await?;

        let completed = transition(&txn, order, OrderStatus::Completed).await?;
        let award = RewardsService::award_in_txn(&txn, &completed).await?;
        notification_service::enqueue(
            &txn,
            completed.seller_id,
            ORDER_STATUS_CHANGED,
            order_status_payload(completed.id, OrderStatus::Completed),
        )
        .await?;

        txn.commit().await?;

        Ok(ConfirmReceiptResponse {
            order: completed.into(),
            points_awarded: award.points_awarded,
            tier_name: award.tier_name,
        })
    }

    pub async fn cancel_as_buyer(&self, buyer_id: Uuid, order_id: Uuid) -> AppResult<OrderResponse> {
        let txn = self.pool.begin().await?;
        let order = find_order_for(&txn, order_id, |o| o.user_id == buyer_id).await?;

        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(
                "Only pending orders can be cancelled by the buyer".to_string(),
            ));
        }

        let cancelled = transition(&txn, order, OrderStatus::Cancelled).await?;
        release(&txn, &cancelled).await?;
        notification_service::enqueue(
            &txn,
            cancelled.seller_id,
            ORDER_STATUS_CHANGED,
            order_status_payload(cancelled.id, OrderStatus::Cancelled),
        )
        .await?;

        txn.commit().await?;
        Ok(cancelled.into())
    }

    pub async fn list_buyer_orders(
        &self,
        buyer_id: Uuid,
        query: &OrderQuery,
    ) -> AppResult<PaginatedResponse<OrderResponse>> {
        self.list_orders(orders::Column::UserId.eq(buyer_id), query).await
    }

    pub async fn list_seller_orders(
        &self,
        seller_id: Uuid,
        query: &OrderQuery,
    ) -> AppResult<PaginatedResponse<OrderResponse>> {
        self.list_orders(orders::Column::SellerId.eq(seller_id), query).await
    }

    /// Visible to the order's buyer and seller only.
    pub async fn get_order(&self, user_id: Uuid, order_id: Uuid) -> AppResult<OrderDetailResponse> {
        let order = orders::Entity::find_by_id(order_id)
            .one(self.pool.as_ref())
            .await?
            .filter(|o| o.user_id == user_id || o.seller_id == user_id)
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        let items = order_items::Entity::find()
            .filter(order_items::Column::OrderId.eq(order.id))
            .all(self.pool.as_ref())
            .await?;

        Ok(OrderDetailResponse {
            order: order.into(),
            items: items.into_iter().map(Into::into).collect(),
        })
    }

    async fn list_orders(
        &self,
        owner: sea_orm::sea_query::SimpleExpr,
        query: &OrderQuery,
    ) -> AppResult<PaginatedResponse<OrderResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base = orders::Entity::find().filter(owner);
        if let Some(status) = query.status {
            base = base.filter(orders::Column::Status.eq(status));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_desc(orders::Column::CreatedAt)
            .limit(params.get_limit())
            .offset(params.get_offset())
            .all(self.pool.as_ref())
            .await?;

        Ok(PaginatedResponse::new(
            rows.into_iter().map(Into::into).collect(),
            &params,
            total,
        ))
    }
}

/// Loads an order under a row lock; orders failing `visible` are reported missing.
async fn find_order_for(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    visible: impl Fn(&orders::Model) -> bool,
) -> AppResult<orders::Model> {
    orders::Entity::find_by_id(order_id)
        .lock_exclusive()
        .one(txn)
        .await?
        .filter(|o| visible(o))
        .ok_or_else(|| AppError::NotFound("Order not found".to_string()))
}

/// Writes the order, its items and the seller's `order_placed` event.
async fn create_order(
    txn: &DatabaseTransaction,
    buyer_id: Uuid,
    seller_id: Uuid,
    lines: Vec<PricedLine>,
    payment_method: PaymentMethod,
    delivery_address: Value,
    notes: Option<String>,
) -> AppResult<OrderDetailResponse> {
    let order_id = Uuid::new_v4();
    let now = Utc::now();

    let mut items = Vec::with_capacity(lines.len());
    for line in lines {
        let subtotal_cents = line_total_cents(line.price_cents, line.qty)?;
        items.push(order_items::Model {
            id: Uuid::new_v4(),
            order_id,
            product_id: line.product_id,
            title: line.title,
            price_cents: line.price_cents,
            qty: line.qty,
            subtotal_cents,
        });
    }
    let total_cents = checked_sum_cents(items.iter().map(|i| i.subtotal_cents))?;

    let order = orders::Model {
        id: order_id,
        user_id: buyer_id,
        seller_id,
        total_cents,
        status: OrderStatus::Pending,
        payment_method,
        delivery_address,
        notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
        created_at: now,
        updated_at: now,
    };

    orders::Entity::insert(orders::ActiveModel {
        id: Set(order.id),
        user_id: Set(order.user_id),
        seller_id: Set(order.seller_id),
        total_cents: Set(order.total_cents),
        status: Set(order.status),
        payment_method: Set(order.payment_method),
        delivery_address: Set(order.delivery_address.clone()),
        notes: Set(order.notes.clone()),
        created_at: Set(now),
        updated_at: Set(now),
    })
    .exec_without_returning(txn)
    .await?;
    order_items::Entity::insert_many(items.iter().map(|i| order_items::ActiveModel {
        id: Set(i.id),
        order_id: Set(i.order_id),
        product_id: Set(i.product_id),
        title: Set(i.title.clone()),
        price_cents: Set(i.price_cents),
        qty: Set(i.qty),
        subtotal_cents: Set(i.subtotal_cents),
    }))
    .exec_without_returning(txn)
    .await?;

    notification_service::enqueue(
        txn,
        seller_id,
        ORDER_PLACED,
        json!({
            "order_id": order_id,
            "buyer_id": buyer_id,
            "total_cents": total_cents,
            "item_count": items.iter().map(|i| i64::from(i.qty)).sum::<i64>(),
        }),
    )
    .await?;

    log::info!(
        "Order {order_id} placed by {buyer_id} at seller {seller_id} for {total_cents} cents"
    );

    Ok(OrderDetailResponse {
        order: order.into(),
        items: items.into_iter().map(Into::into).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::database::connection::tests::{into_log, logged_sql};
    use crate::entities::seller_products::tests::listing;
    use crate::entities::{
        points_history_entity as history, reward_tier_entity as tiers,
        rewards_config_entity as rewards_config, seller_status_entity as seller_status,
    };
    use rstest::rstest;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn line(product_id: Uuid, qty: i32) -> OrderLineRequest {
        OrderLineRequest { product_id, qty }
    }

    fn order(status: OrderStatus) -> orders::Model {
        orders::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            seller_id: Uuid::new_v4(),
            total_cents: 9312,
            status,
            payment_method: PaymentMethod::Transfer,
            delivery_address: json!({"street": "Hidalgo 4"}),
            notes: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn exec_ok() -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        }
    }

    #[test]
    fn test_validate_lines() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(validate_lines(&[line(a, 2), line(b, 1)]).is_ok());
        assert!(validate_lines(&[]).is_err());
        assert!(validate_lines(&[line(a, 0)]).is_err());
        assert!(validate_lines(&[line(a, 1), line(a, 3)]).is_err());
    }

    #[rstest]
    #[case(json!({"street": "Morelos 8", "city": "Oaxaca"}), true)]
    #[case(json!({}), false)]
    #[case(json!("Morelos 8"), false)]
    #[case(json!(["Morelos 8"]), false)]
    #[case(Value::Null, false)]
    fn test_validate_delivery_address(#[case] address: Value, #[case] ok: bool) {
        assert_eq!(validate_delivery_address(&address).is_ok(), ok);
    }

    #[tokio::test]
    async fn test_place_order_rejects_self_purchase() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = OrderService::new(Arc::new(db));
        let me = Uuid::new_v4();

        let req = CreateOrderRequest {
            seller_id: me,
            items: vec![line(Uuid::new_v4(), 1)],
            payment_method: PaymentMethod::Cash,
            delivery_address: json!({"street": "Allende 1"}),
            notes: None,
        };
        let err = service.place_order(me, &req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_checkout_of_empty_cart() {
        let buyer = Uuid::new_v4();
        let cart = carts::Model {
            id: Uuid::new_v4(),
            user_id: buyer,
            seller_id: Uuid::new_v4(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![cart.clone()]])
            .append_query_results([Vec::<cart_items::Model>::new()])
            .into_connection();
        let service = OrderService::new(Arc::new(db));

        let req = CheckoutRequest {
            cart_id: cart.id,
            payment_method: PaymentMethod::Cash,
            delivery_address: json!({"street": "Allende 1"}),
            notes: None,
        };
        let err = service.checkout(buyer, &req).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(msg) if msg == "Cart is empty"));
    }

    #[tokio::test]
    async fn test_get_order_hides_other_users_orders() {
        let o = order(OrderStatus::Pending);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![o.clone()]])
            .into_connection();
        let service = OrderService::new(Arc::new(db));

        let err = service.get_order(Uuid::new_v4(), o.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_confirm_receipt_requires_delivery() {
        let o = order(OrderStatus::SellerConfirmed);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![o.clone()]])
            .into_connection();
        let service = OrderService::new(Arc::new(db));

        let err = service.confirm_receipt(o.user_id, o.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_buyer_cannot_cancel_confirmed_order() {
        let o = order(OrderStatus::SellerConfirmed);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![o.clone()]])
            .into_connection();
        let service = OrderService::new(Arc::new(db));

        let err = service.cancel_as_buyer(o.user_id, o.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_seller_cannot_complete_order() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let service = OrderService::new(Arc::new(db));

        let err = service
            .update_status_as_seller(Uuid::new_v4(), Uuid::new_v4(), OrderStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_seller_confirms_pending_order() {
        let o = order(OrderStatus::Pending);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![o.clone()]])
            .append_exec_results([exec_ok(), exec_ok()])
            .into_connection();
        let service = OrderService::new(Arc::new(db));

        let updated = service
            .update_status_as_seller(o.seller_id, o.id, OrderStatus::SellerConfirmed)
            .await
            .unwrap();
        assert_eq!(updated.status, OrderStatus::SellerConfirmed);
    }

    #[tokio::test]
    async fn test_concurrent_status_change_is_a_conflict() {
        let o = order(OrderStatus::Pending);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![o.clone()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let service = OrderService::new(Arc::new(db));

        let err = service
            .update_status_as_seller(o.seller_id, o.id, OrderStatus::SellerConfirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_place_order_rolls_back_when_stock_runs_out() {
        let seller_id = Uuid::new_v4();
        let mut listing = listing(InventoryMode::Count);
        listing.seller_id = seller_id;
        listing.product_id = Uuid::new_v4();
        let product = products::Model {
            id: listing.product_id,
            title: "Tlayuda".to_string(),
            description: String::new(),
            category: "comida".to_string(),
            image_url: None,
            created_by: Some(seller_id),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<seller_status::Model>::new()])
            .append_query_results([vec![listing.clone()]])
            .append_query_results([vec![product]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();
        let service = OrderService::new(Arc::new(db));

        let req = CreateOrderRequest {
            seller_id,
            items: vec![line(listing.product_id, 10)],
            payment_method: PaymentMethod::Cash,
            delivery_address: json!({"street": "Allende 1"}),
            notes: None,
        };
        let err = service.place_order(Uuid::new_v4(), &req).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("Tlayuda")));
    }

    fn product(id: Uuid, title: &str) -> products::Model {
        products::Model {
            id,
            title: title.to_string(),
            description: String::new(),
            category: "comida".to_string(),
            image_url: None,
            created_by: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn stocked(seller_id: Uuid, mode: InventoryMode, price_cents: i64) -> listings::Model {
        let mut l = listing(mode);
        l.seller_id = seller_id;
        l.product_id = Uuid::new_v4();
        l.price_cents = price_cents;
        l
    }

    fn execs(n: usize) -> Vec<MockExecResult> {
        (0..n).map(|_| exec_ok()).collect()
    }

    #[tokio::test]
    async fn test_place_order_commits_order_items_and_event_together() {
        let seller_id = Uuid::new_v4();
        let tamal = stocked(seller_id, InventoryMode::Count, 2693);

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<seller_status::Model>::new()])
            .append_query_results([vec![tamal.clone()]])
            .append_query_results([vec![product(tamal.product_id, "Tamal")]])
            // reserve, order, items, outbox
            .append_exec_results(execs(4))
            .into_connection();
        let pool = Arc::new(db);
        let service = OrderService::new(pool.clone());

        let req = CreateOrderRequest {
            seller_id,
            items: vec![line(tamal.product_id, 2)],
            payment_method: PaymentMethod::Cash,
            delivery_address: json!({"street": "Allende 1"}),
            notes: Some("  sin chile  ".to_string()),
        };
        let detail = service.place_order(Uuid::new_v4(), &req).await.unwrap();
        assert_eq!(detail.order.total_cents, 5386);
        assert_eq!(detail.order.status, OrderStatus::Pending);
        assert_eq!(detail.order.notes.as_deref(), Some("sin chile"));
        assert_eq!(detail.items.len(), 1);
        assert_eq!(detail.items[0].subtotal_cents, 5386);
        drop(service);

        let log = into_log(pool);
        assert_eq!(log.len(), 1);
        let sql = logged_sql(&log);
        assert!(sql.contains(r#""stock" - "#), "{sql}");
        assert!(sql.contains(r#"INSERT INTO "orders""#), "{sql}");
        assert!(sql.contains(r#"INSERT INTO "order_items""#), "{sql}");
        assert!(sql.contains(r#"INSERT INTO "notification_outbox""#), "{sql}");
        assert!(sql.contains("COMMIT"), "{sql}");
    }

    #[tokio::test]
    async fn test_checkout_uses_snapshots_and_removes_cart() {
        let buyer = Uuid::new_v4();
        let seller_id = Uuid::new_v4();
        let tamal = stocked(seller_id, InventoryMode::Count, 2693);
        let atole = stocked(seller_id, InventoryMode::Count, 3926);
        let cart = carts::Model {
            id: Uuid::new_v4(),
            user_id: buyer,
            seller_id,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let item = |product_id: Uuid, title: &str, price_cents: i64, qty: i32| cart_items::Model {
            id: Uuid::new_v4(),
            cart_id: cart.id,
            product_id,
            title: title.to_string(),
            price_cents,
            qty,
            created_at: Utc::now(),
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![cart.clone()]])
            .append_query_results([vec![
                item(tamal.product_id, "Tamal", 2693, 2),
                item(atole.product_id, "Atole", 3926, 1),
            ]])
            .append_query_results([Vec::<seller_status::Model>::new()])
            .append_query_results([vec![tamal.clone()]])
            .append_query_results([vec![atole.clone()]])
            // two reservations, order, items, outbox, cart items, cart
            .append_exec_results(execs(7))
            .into_connection();
        let pool = Arc::new(db);
        let service = OrderService::new(pool.clone());

        let req = CheckoutRequest {
            cart_id: cart.id,
            payment_method: PaymentMethod::Transfer,
            delivery_address: json!({"street": "Hidalgo 4"}),
            notes: None,
        };
        let detail = service.checkout(buyer, &req).await.unwrap();
        assert_eq!(detail.order.total_cents, 9312);
        assert_eq!(detail.items.len(), 2);
        drop(service);

        let log = into_log(pool);
        assert_eq!(log.len(), 1);
        let sql = logged_sql(&log);
        assert!(sql.contains(r#"INSERT INTO "notification_outbox""#), "{sql}");
        assert!(sql.contains(r#"DELETE FROM "cart_items""#), "{sql}");
        assert!(sql.contains(r#"DELETE FROM "carts""#), "{sql}");
    }

    #[tokio::test]
    async fn test_reserving_last_portion_flags_sold_out() {
        let seller_id = Uuid::new_v4();
        let mut pozole = stocked(seller_id, InventoryMode::Availability, 8000);
        pozole.portion_limit = Some(10);
        pozole.portion_used = 9;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<seller_status::Model>::new()])
            .append_query_results([vec![pozole.clone()]])
            .append_query_results([vec![product(pozole.product_id, "Pozole")]])
            .append_exec_results(execs(4))
            .into_connection();
        let pool = Arc::new(db);
        let service = OrderService::new(pool.clone());

        let req = CreateOrderRequest {
            seller_id,
            items: vec![line(pozole.product_id, 1)],
            payment_method: PaymentMethod::Cash,
            delivery_address: json!({"street": "Allende 1"}),
            notes: None,
        };
        service.place_order(Uuid::new_v4(), &req).await.unwrap();
        drop(service);

        let sql = logged_sql(&into_log(pool));
        let update = &sql[sql.find(r#"UPDATE "seller_products" SET"#).unwrap()..];
        let set_clause = &update[..update.find("WHERE").unwrap()];
        assert!(set_clause.contains(r#""portion_used" = "portion_used" + "#), "{set_clause}");
        assert!(set_clause.contains(r#""sold_out" = "#), "{set_clause}");
        assert!(!set_clause.contains(r#""stock""#), "{set_clause}");
        let filter = &update[update.find("WHERE").unwrap()..];
        assert!(filter.contains(r#"<= "portion_limit""#), "{filter}");
        assert!(filter.contains(r#""sold_out" = "#), "{filter}");
    }

    #[tokio::test]
    async fn test_confirm_receipt_awards_points_in_same_transaction() {
        let o = orders::Model {
            total_cents: 1_000_000,
            ..order(OrderStatus::Delivered)
        };
        let tier = |name: &str, minimum_purchase_cents: i64, multiplier_bp: i32| tiers::Model {
            id: Uuid::new_v4(),
            seller_id: o.seller_id,
            name: name.to_string(),
            minimum_purchase_cents,
            multiplier_bp,
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![o.clone()]])
            .append_query_results([Vec::<history::Model>::new()])
            .append_query_results([vec![rewards_config::Model {
                seller_id: o.seller_id,
                is_active: true,
                minimum_purchase_cents: 500_000,
                cents_per_point: 100_000,
                updated_at: Utc::now(),
            }]])
            .append_query_results([vec![
                tier("Gold", 2_000_000, 15_000),
                tier("Silver", 1_000_000, 12_000),
                tier("Bronze", 500_000, 10_000),
            ]])
            // status, ledger, balance row, balance, points event, status event
            .append_exec_results(execs(6))
            .into_connection();
        let pool = Arc::new(db);
        let service = OrderService::new(pool.clone());

        let confirmed = service.confirm_receipt(o.user_id, o.id).await.unwrap();
        assert_eq!(confirmed.order.status, OrderStatus::Completed);
        assert_eq!(confirmed.points_awarded, 12);
        assert_eq!(confirmed.tier_name.as_deref(), Some("Silver"));
        drop(service);

        let log = into_log(pool);
        assert_eq!(log.len(), 1);
        let sql = logged_sql(&log);
        assert!(sql.contains(r#"INSERT INTO "points_history""#), "{sql}");
        assert!(sql.contains(r#"UPDATE "user_points""#), "{sql}");
        assert!(sql.contains("COMMIT"), "{sql}");
    }

    #[tokio::test]
    async fn test_cancelling_availability_order_decrements_in_sql() {
        let o = order(OrderStatus::Pending);
        let mut pozole = stocked(o.seller_id, InventoryMode::Availability, 8000);
        pozole.portion_limit = Some(4);
        pozole.portion_used = 4;
        pozole.sold_out = true;
        let item = order_items::Model {
            id: Uuid::new_v4(),
            order_id: o.id,
            product_id: pozole.product_id,
            title: "Pozole".to_string(),
            price_cents: 8000,
            qty: 1,
            subtotal_cents: 8000,
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![o.clone()]])
            .append_query_results([vec![item]])
            .append_query_results([vec![pozole]])
            // status, release, event
            .append_exec_results(execs(3))
            .into_connection();
        let pool = Arc::new(db);
        let service = OrderService::new(pool.clone());

        let cancelled = service.cancel_as_buyer(o.user_id, o.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        drop(service);

        let sql = logged_sql(&into_log(pool));
        assert!(sql.contains(r#"GREATEST("portion_used" - "#), "{sql}");
    }

    #[tokio::test]
    async fn test_seller_cancelling_delivered_order_keeps_inventory() {
        let o = order(OrderStatus::Delivered);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![o.clone()]])
            // status, event
            .append_exec_results(execs(2))
            .into_connection();
        let pool = Arc::new(db);
        let service = OrderService::new(pool.clone());

        let cancelled = service
            .update_status_as_seller(o.seller_id, o.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        drop(service);

        let sql = logged_sql(&into_log(pool));
        assert!(!sql.contains(r#""order_items""#), "{sql}");
        assert!(!sql.contains(r#"UPDATE "seller_products""#), "{sql}");
    }
}
