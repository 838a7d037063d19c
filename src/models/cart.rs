use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct AddCartItemRequest {
    pub seller_id: Uuid,
    pub product_id: Uuid,
    #[schema(example = 1)]
    pub qty: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateCartItemRequest {
    /// 0 removes the item
    pub qty: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub price_cents: i64,
    pub qty: i32,
    pub total_cents: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartResponse {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub items: Vec<CartItemResponse>,
    pub subtotal_cents: i64,
    pub item_count: i64,
}

/// All carts of one buyer.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartSummary {
    pub carts: Vec<CartResponse>,
    pub total_cents: i64,
    pub item_count: i64,
}
