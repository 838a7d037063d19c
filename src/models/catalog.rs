use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{
    InventoryMode, product_entity as products, profile_entity as profiles,
    seller_product_entity as listings,
};

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct FeedQuery {
    pub category: Option<String>,
    /// Only featured listings
    pub featured: Option<bool>,
    /// Only listings with an active offer price
    pub offer: Option<bool>,
    /// Max rows (default 20, max 100)
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct SearchQuery {
    /// Matched against title and description, case-insensitive
    pub q: String,
    pub category: Option<String>,
    pub limit: Option<u64>,
}

/// A visible listing joined with its product and seller.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ListingResponse {
    pub product_id: Uuid,
    pub seller_id: Uuid,
    pub seller_name: Option<String>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub image_url: Option<String>,
    pub price_cents: i64,
    pub offer_price_cents: Option<i64>,
    pub effective_price_cents: i64,
    pub featured: bool,
    pub active: bool,
    pub inventory_mode: InventoryMode,
    /// None = no fixed cap
    pub remaining_units: Option<i32>,
    pub created_at: DateTime<Utc>,
}

impl ListingResponse {
    pub fn build(
        listing: listings::Model,
        product: &products::Model,
        seller: Option<&profiles::Model>,
    ) -> Self {
        Self {
            product_id: listing.product_id,
            seller_id: listing.seller_id,
            seller_name: seller.map(|s| s.display_name.clone()),
            title: product.title.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            image_url: product.image_url.clone(),
            price_cents: listing.price_cents,
            offer_price_cents: listing.offer_price_cents,
            effective_price_cents: listing.effective_price_cents(),
            featured: listing.featured,
            active: listing.active,
            inventory_mode: listing.inventory_mode,
            remaining_units: listing.remaining_units(),
            created_at: listing.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryResponse {
    pub category: String,
    pub listing_count: i64,
}
