use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::{
    PointsEntryKind, points_history_entity as history, reward_tier_entity as tiers,
    rewards_config_entity as rewards_config, user_points_entity as user_points,
};

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PointsBalanceResponse {
    pub seller_id: Uuid,
    pub points: i64,
    pub updated_at: DateTime<Utc>,
}

impl From<user_points::Model> for PointsBalanceResponse {
    fn from(m: user_points::Model) -> Self {
        Self {
            seller_id: m.seller_id,
            points: m.points,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct PointsHistoryQuery {
    pub seller_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PointsHistoryResponse {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub order_id: Option<Uuid>,
    pub kind: PointsEntryKind,
    pub points_earned: i64,
    pub points_spent: i64,
    pub tier_name: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<history::Model> for PointsHistoryResponse {
    fn from(m: history::Model) -> Self {
        Self {
            id: m.id,
            seller_id: m.seller_id,
            order_id: m.order_id,
            kind: m.kind,
            points_earned: m.points_earned,
            points_spent: m.points_spent,
            tier_name: m.tier_name,
            description: m.description,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct AwardPointsRequest {
    pub order_id: Uuid,
}

/// Result of awarding points for one order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AwardOutcome {
    pub order_id: Uuid,
    pub points_awarded: i64,
    pub tier_name: Option<String>,
    /// True when the order had already been awarded; nothing was written.
    pub already_awarded: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RedeemPointsRequest {
    pub seller_id: Uuid,
    pub points: i64,
    pub order_id: Option<Uuid>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RedeemPointsResponse {
    pub seller_id: Uuid,
    pub points_spent: i64,
    pub balance: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReconcileResponse {
    pub seller_id: Uuid,
    pub stored_balance: i64,
    pub ledger_balance: i64,
    pub consistent: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct QuoteQuery {
    pub seller_id: Uuid,
    pub total_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct PointsQuote {
    pub points: i64,
    pub tier_name: Option<String>,
    pub multiplier_bp: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RewardTierInput {
    #[schema(example = "Silver")]
    pub name: String,
    #[schema(example = 1000000)]
    pub minimum_purchase_cents: i64,
    /// 10000 = 1.0x
    #[schema(example = 12000)]
    pub multiplier_bp: i32,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct RewardsConfigRequest {
    pub is_active: bool,
    #[schema(example = 500000)]
    pub minimum_purchase_cents: i64,
    #[schema(example = 100000)]
    pub cents_per_point: i64,
    #[serde(default)]
    pub tiers: Vec<RewardTierInput>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RewardTierResponse {
    pub id: Uuid,
    pub name: String,
    pub minimum_purchase_cents: i64,
    pub multiplier_bp: i32,
}

impl From<tiers::Model> for RewardTierResponse {
    fn from(m: tiers::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            minimum_purchase_cents: m.minimum_purchase_cents,
            multiplier_bp: m.multiplier_bp,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RewardsConfigResponse {
    pub seller_id: Uuid,
    pub is_active: bool,
    pub minimum_purchase_cents: i64,
    pub cents_per_point: i64,
    /// Highest threshold first
    pub tiers: Vec<RewardTierResponse>,
}

impl RewardsConfigResponse {
    pub fn build(config: rewards_config::Model, tiers: Vec<tiers::Model>) -> Self {
        Self {
            seller_id: config.seller_id,
            is_active: config.is_active,
            minimum_purchase_cents: config.minimum_purchase_cents,
            cents_per_point: config.cents_per_point,
            tiers: tiers.into_iter().map(Into::into).collect(),
        }
    }
}
