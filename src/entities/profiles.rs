use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;

/// Mirrors the Supabase `profiles` table; `id` equals the auth user id (JWT `sub`).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "profiles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub display_name: String,
    pub phone: Option<String>,
    pub is_seller: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
