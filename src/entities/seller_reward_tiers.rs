use sea_orm::entity::prelude::*;

/// Reward bracket. `multiplier_bp` is in basis points: 10000 = 1.0x, 12000 = 1.2x.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "seller_reward_tiers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub seller_id: Uuid,
    pub name: String,
    pub minimum_purchase_cents: i64,
    pub multiplier_bp: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
