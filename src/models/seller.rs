use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{InventoryMode, seller_status_entity as seller_status};

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct CreateProductRequest {
    #[schema(example = "Tamales de rajas")]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[schema(example = "comida")]
    pub category: String,
    pub image_url: Option<String>,
    #[schema(example = 3500)]
    pub price_cents: i64,
    pub offer_price_cents: Option<i64>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub stock: i32,
    pub inventory_mode: InventoryMode,
    #[serde(default)]
    pub available_today: bool,
    pub portion_limit: Option<i32>,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdateListingRequest {
    pub price_cents: Option<i64>,
    /// Some(None) clears the offer
    #[serde(default, with = "double_option")]
    #[schema(value_type = Option<i64>)]
    pub offer_price_cents: Option<Option<i64>>,
    pub featured: Option<bool>,
    pub stock: Option<i32>,
    pub active: Option<bool>,
    pub inventory_mode: Option<InventoryMode>,
    pub available_today: Option<bool>,
    #[serde(default, with = "double_option")]
    #[schema(value_type = Option<i32>)]
    pub portion_limit: Option<Option<i32>>,
    /// Resets daily portion usage and the sold-out flag
    pub reset_portions: Option<bool>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SetSellerStatusRequest {
    pub is_open: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SellerStatusResponse {
    pub seller_id: Uuid,
    pub is_open: bool,
    pub updated_at: DateTime<Utc>,
}

impl From<seller_status::Model> for SellerStatusResponse {
    fn from(m: seller_status::Model) -> Self {
        Self {
            seller_id: m.seller_id,
            is_open: m.is_open,
            updated_at: m.updated_at,
        }
    }
}

/// Distinguishes a missing field (None) from an explicit null (Some(None)).
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}
