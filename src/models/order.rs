use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{
    OrderStatus, PaymentMethod, order_entity as orders, order_item_entity as order_items,
};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct OrderLineRequest {
    pub product_id: Uuid,
    pub qty: i32,
}

/// Direct order; lines are priced from the live listings.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateOrderRequest {
    pub seller_id: Uuid,
    pub items: Vec<OrderLineRequest>,
    pub payment_method: PaymentMethod,
    #[schema(value_type = Object)]
    pub delivery_address: serde_json::Value,
    pub notes: Option<String>,
}

/// Order from a cart; lines use the cart's price snapshots.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CheckoutRequest {
    pub cart_id: Uuid,
    pub payment_method: PaymentMethod,
    #[schema(value_type = Object)]
    pub delivery_address: serde_json::Value,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct OrderQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub status: Option<OrderStatus>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct ConfirmReceiptRequest {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub seller_id: Uuid,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    #[schema(value_type = Object)]
    pub delivery_address: serde_json::Value,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<orders::Model> for OrderResponse {
    fn from(m: orders::Model) -> Self {
        Self {
            id: m.id,
            user_id: m.user_id,
            seller_id: m.seller_id,
            total_cents: m.total_cents,
            status: m.status,
            payment_method: m.payment_method,
            delivery_address: m.delivery_address,
            notes: m.notes,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub price_cents: i64,
    pub qty: i32,
    pub subtotal_cents: i64,
}

impl From<order_items::Model> for OrderItemResponse {
    fn from(m: order_items::Model) -> Self {
        Self {
            id: m.id,
            product_id: m.product_id,
            title: m.title,
            price_cents: m.price_cents,
            qty: m.qty,
            subtotal_cents: m.subtotal_cents,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderDetailResponse {
    pub order: OrderResponse,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ConfirmReceiptResponse {
    pub order: OrderResponse,
    pub points_awarded: i64,
    pub tier_name: Option<String>,
}
