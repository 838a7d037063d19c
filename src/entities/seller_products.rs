use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How a listing tracks inventory:
/// - count: a plain unit counter (`stock`)
/// - availability: a daily on/off switch with optional portion cap (`portion_limit`)
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    ToSchema,
    DeriveActiveEnum,
    EnumIter,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "inventory_mode")]
#[serde(rename_all = "snake_case")]
pub enum InventoryMode {
    #[sea_orm(string_value = "count")]
    Count,
    #[sea_orm(string_value = "availability")]
    Availability,
}

impl std::fmt::Display for InventoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InventoryMode::Count => write!(f, "count"),
            InventoryMode::Availability => write!(f, "availability"),
        }
    }
}

/// Seller-specific listing wrapped around a shared product.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "seller_products")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub seller_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: Uuid,
    pub price_cents: i64,
    pub offer_price_cents: Option<i64>,
    pub featured: bool,
    pub stock: i32,
    pub active: bool,
    pub inventory_mode: InventoryMode,
    pub available_today: bool,
    /// None = unlimited portions
    pub portion_limit: Option<i32>,
    pub portion_used: i32,
    pub sold_out: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Whether the listing may appear in feeds and be added to carts.
    pub fn is_visible(&self) -> bool {
        if !self.active {
            return false;
        }
        match self.inventory_mode {
            InventoryMode::Count => self.stock > 0,
            InventoryMode::Availability => self.available_today && !self.sold_out,
        }
    }

    pub fn has_offer(&self) -> bool {
        matches!(self.offer_price_cents, Some(offer) if offer < self.price_cents)
    }

    /// Price charged to buyers: the offer price when it undercuts the list price.
    pub fn effective_price_cents(&self) -> i64 {
        match self.offer_price_cents {
            Some(offer) if offer < self.price_cents => offer,
            _ => self.price_cents,
        }
    }

    /// Units that can still be sold right now; None when unbounded.
    pub fn remaining_units(&self) -> Option<i32> {
        match self.inventory_mode {
            InventoryMode::Count => Some(self.stock.max(0)),
            InventoryMode::Availability => {
                if !self.available_today || self.sold_out {
                    return Some(0);
                }
                self.portion_limit
                    .map(|limit| (limit - self.portion_used).max(0))
            }
        }
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rstest::rstest;

    pub(crate) fn listing(mode: InventoryMode) -> Model {
        Model {
            seller_id: Uuid::nil(),
            product_id: Uuid::nil(),
            price_cents: 2693,
            offer_price_cents: None,
            featured: false,
            stock: 5,
            active: true,
            inventory_mode: mode,
            available_today: true,
            portion_limit: None,
            portion_used: 0,
            sold_out: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[rstest]
    #[case(true, 5, true)]
    #[case(true, 0, false)]
    #[case(false, 5, false)]
    fn test_count_mode_visibility(#[case] active: bool, #[case] stock: i32, #[case] visible: bool) {
        let mut l = listing(InventoryMode::Count);
        l.active = active;
        l.stock = stock;
        assert_eq!(l.is_visible(), visible);
    }

    #[rstest]
    #[case(true, false, true)]
    #[case(false, false, false)]
    #[case(true, true, false)]
    fn test_availability_mode_visibility(
        #[case] available_today: bool,
        #[case] sold_out: bool,
        #[case] visible: bool,
    ) {
        let mut l = listing(InventoryMode::Availability);
        // stock is irrelevant in availability mode
        l.stock = 0;
        l.available_today = available_today;
        l.sold_out = sold_out;
        assert_eq!(l.is_visible(), visible);
    }

    #[test]
    fn test_effective_price_uses_lower_offer_only() {
        let mut l = listing(InventoryMode::Count);
        assert_eq!(l.effective_price_cents(), 2693);
        assert!(!l.has_offer());

        l.offer_price_cents = Some(2000);
        assert_eq!(l.effective_price_cents(), 2000);
        assert!(l.has_offer());

        l.offer_price_cents = Some(3000);
        assert_eq!(l.effective_price_cents(), 2693);
        assert!(!l.has_offer());
    }

    #[test]
    fn test_remaining_units() {
        let l = listing(InventoryMode::Count);
        assert_eq!(l.remaining_units(), Some(5));

        let mut a = listing(InventoryMode::Availability);
        assert_eq!(a.remaining_units(), None);
        a.portion_limit = Some(10);
        a.portion_used = 7;
        assert_eq!(a.remaining_units(), Some(3));
        a.sold_out = true;
        assert_eq!(a.remaining_units(), Some(0));
    }
}
