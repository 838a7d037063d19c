use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Per-seller loyalty settings.
/// - minimum_purchase_cents: orders below this earn nothing
/// - cents_per_point: spend needed for one point at 1.0x (100000 = 1 point per $1,000)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "seller_rewards_config")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub seller_id: Uuid,
    pub is_active: bool,
    pub minimum_purchase_cents: i64,
    pub cents_per_point: i64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
