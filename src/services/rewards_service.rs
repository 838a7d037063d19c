use crate::database::DbPool;
use crate::entities::{
    OrderStatus, PointsEntryKind, order_entity as orders, points_history_entity as history,
    reward_tier_entity as tiers, rewards_config_entity as rewards_config,
    user_points_entity as user_points,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    AwardOutcome, PaginatedResponse, PaginationParams, PointsBalanceResponse,
    PointsHistoryQuery, PointsHistoryResponse, PointsQuote, ReconcileResponse,
    RedeemPointsRequest, RedeemPointsResponse, RewardsConfigRequest, RewardsConfigResponse,
};
use crate::services::notification_service::{self, POINTS_EARNED, POINTS_REDEEMED};
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

/// 1.0x multiplier in basis points.
pub const BASE_MULTIPLIER_BP: i32 = 10_000;
pub const DEFAULT_CENTS_PER_POINT: i64 = 100_000;

#[derive(Clone)]
pub struct RewardsService {
    pool: DbPool,
}

impl RewardsService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Highest qualifying threshold wins; ties go to the larger multiplier,
    /// then to the alphabetically first name.
    pub fn select_tier(tiers: &[tiers::Model], total_cents: i64) -> Option<&tiers::Model> {
        tiers
            .iter()
            .filter(|t| t.minimum_purchase_cents <= total_cents)
            .max_by(|a, b| {
                a.minimum_purchase_cents
                    .cmp(&b.minimum_purchase_cents)
                    .then(a.multiplier_bp.cmp(&b.multiplier_bp))
                    .then(b.name.cmp(&a.name))
            })
    }

    /// points = floor(total × multiplier_bp / (10000 × cents_per_point))
    pub fn calculate_points(
        config: Option<&rewards_config::Model>,
        tiers: &[tiers::Model],
        total_cents: i64,
    ) -> PointsQuote {
        let none = PointsQuote {
            points: 0,
            tier_name: None,
            multiplier_bp: 0,
        };

        let Some(config) = config else {
            return none;
        };
        if !config.is_active
            || config.cents_per_point <= 0
            || total_cents <= 0
            || total_cents < config.minimum_purchase_cents
        {
            return none;
        }

        let tier = Self::select_tier(tiers, total_cents);
        let multiplier_bp = tier.map_or(BASE_MULTIPLIER_BP, |t| t.multiplier_bp);

        let numerator = i128::from(total_cents) * i128::from(multiplier_bp.max(0));
        let denominator = i128::from(BASE_MULTIPLIER_BP) * i128::from(config.cents_per_point);
        let points = i64::try_from(numerator / denominator).unwrap_or(i64::MAX);

        PointsQuote {
            points,
            tier_name: tier.map(|t| t.name.clone()),
            multiplier_bp,
        }
    }

    pub async fn quote(&self, seller_id: Uuid, total_cents: i64) -> AppResult<PointsQuote> {
        if total_cents < 0 {
            return Err(AppError::ValidationError(
                "Amount must not be negative".to_string(),
            ));
        }
        let (config, tier_list) = load_rules(self.pool.as_ref(), seller_id).await?;
        Ok(Self::calculate_points(config.as_ref(), &tier_list, total_cents))
    }

    /// Awards points for a completed order. The caller must be its buyer or seller.
    pub async fn award_for_order(&self, actor_id: Uuid, order_id: Uuid) -> AppResult<AwardOutcome> {
        let txn = self.pool.begin().await?;

        let order = orders::Entity::find_by_id(order_id)
            .one(&txn)
            .await?
            .filter(|o| o.user_id == actor_id || o.seller_id == actor_id)
            .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;

        let outcome = Self::award_in_txn(&txn, &order).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    /// Idempotent per order: the (order_id, kind) unique index admits one earn row.
    pub async fn award_in_txn(
        txn: &DatabaseTransaction,
        order: &orders::Model,
    ) -> AppResult<AwardOutcome> {
        if order.status != OrderStatus::Completed {
            return Err(AppError::ValidationError(
                "Points are only awarded for completed orders".to_string(),
            ));
        }

        if let Some(existing) = history::Entity::find()
            .filter(history::Column::OrderId.eq(order.id))
            .filter(history::Column::Kind.eq(PointsEntryKind::Earn))
            .one(txn)
            .await?
        {
            return Ok(AwardOutcome {
                order_id: order.id,
                points_awarded: existing.points_earned,
                tier_name: existing.tier_name,
                already_awarded: true,
            });
        }

        let (config, tier_list) = load_rules(txn, order.seller_id).await?;
        let quote = Self::calculate_points(config.as_ref(), &tier_list, order.total_cents);

        if quote.points == 0 {
            return Ok(AwardOutcome {
                order_id: order.id,
                points_awarded: 0,
                tier_name: quote.tier_name,
                already_awarded: false,
            });
        }

        let entry = history::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(order.user_id),
            seller_id: Set(order.seller_id),
            order_id: Set(Some(order.id)),
            kind: Set(PointsEntryKind::Earn),
            points_earned: Set(quote.points),
            points_spent: Set(0),
            tier_name: Set(quote.tier_name.clone()),
            description: Set(Some(format!("Order {}", order.id))),
            created_at: Set(Utc::now()),
        };
        let inserted = history::Entity::insert(entry)
            .on_conflict(
                OnConflict::columns([history::Column::OrderId, history::Column::Kind])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(txn)
            .await?;

        if inserted == 0 {
            // lost a race with a concurrent award
            return Ok(AwardOutcome {
                order_id: order.id,
                points_awarded: 0,
                tier_name: None,
                already_awarded: true,
            });
        }

        ensure_balance_row(txn, order.user_id, order.seller_id).await?;
        user_points::Entity::update_many()
            .col_expr(
                user_points::Column::Points,
                Expr::col(user_points::Column::Points).add(quote.points),
            )
            .col_expr(user_points::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user_points::Column::UserId.eq(order.user_id))
            .filter(user_points::Column::SellerId.eq(order.seller_id))
            .exec(txn)
            .await?;

        notification_service::enqueue(
            txn,
            order.user_id,
            POINTS_EARNED,
            json!({
                "order_id": order.id,
                "seller_id": order.seller_id,
                "points": quote.points,
                "tier_name": quote.tier_name,
            }),
        )
        .await?;

        log::info!(
            "Awarded {} points to user {} for order {}",
            quote.points,
            order.user_id,
            order.id
        );

        Ok(AwardOutcome {
            order_id: order.id,
            points_awarded: quote.points,
            tier_name: quote.tier_name,
            already_awarded: false,
        })
    }

    pub async fn redeem(
        &self,
        user_id: Uuid,
        req: &RedeemPointsRequest,
    ) -> AppResult<RedeemPointsResponse> {
        if req.points <= 0 {
            return Err(AppError::ValidationError(
                "Points to redeem must be positive".to_string(),
            ));
        }

        let txn = self.pool.begin().await?;

        if let Some(order_id) = req.order_id {
            // redemptions may only reference the buyer's own order at this seller
            orders::Entity::find_by_id(order_id)
                .one(&txn)
                .await?
                .filter(|o| o.user_id == user_id && o.seller_id == req.seller_id)
                .ok_or_else(|| AppError::NotFound("Order not found".to_string()))?;
        }

        let res = user_points::Entity::update_many()
            .col_expr(
                user_points::Column::Points,
                Expr::col(user_points::Column::Points).sub(req.points),
            )
            .col_expr(user_points::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(user_points::Column::UserId.eq(user_id))
            .filter(user_points::Column::SellerId.eq(req.seller_id))
            .filter(user_points::Column::Points.gte(req.points))
            .exec(&txn)
            .await?;

        if res.rows_affected == 0 {
            log::warn!(
                "Rejected redemption of {} points by user {} at seller {}",
                req.points,
                user_id,
                req.seller_id
            );
            return Err(AppError::ValidationError("Insufficient points".to_string()));
        }

        let entry = history::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            seller_id: Set(req.seller_id),
            order_id: Set(req.order_id),
            kind: Set(PointsEntryKind::Redeem),
            points_earned: Set(0),
            points_spent: Set(req.points),
            tier_name: Set(None),
            description: Set(req.description.clone()),
            created_at: Set(Utc::now()),
        };
        let inserted = history::Entity::insert(entry)
            .on_conflict(
                OnConflict::columns([history::Column::OrderId, history::Column::Kind])
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;
        if inserted == 0 {
            return Err(AppError::Conflict(
                "Points were already redeemed for this order".to_string(),
            ));
        }

        let balance = user_points::Entity::find_by_id((user_id, req.seller_id))
            .one(&txn)
            .await?
            .map_or(0, |b| b.points);

        notification_service::enqueue(
            &txn,
            user_id,
            POINTS_REDEEMED,
            json!({ "seller_id": req.seller_id, "points": req.points, "balance": balance }),
        )
        .await?;

        txn.commit().await?;

        Ok(RedeemPointsResponse {
            seller_id: req.seller_id,
            points_spent: req.points,
            balance,
        })
    }

    pub async fn balances(&self, user_id: Uuid) -> AppResult<Vec<PointsBalanceResponse>> {
        let rows = user_points::Entity::find()
            .filter(user_points::Column::UserId.eq(user_id))
            .order_by_desc(user_points::Column::UpdatedAt)
            .all(self.pool.as_ref())
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn history(
        &self,
        user_id: Uuid,
        query: &PointsHistoryQuery,
    ) -> AppResult<PaginatedResponse<PointsHistoryResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base = history::Entity::find().filter(history::Column::UserId.eq(user_id));
        if let Some(seller_id) = query.seller_id {
            base = base.filter(history::Column::SellerId.eq(seller_id));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_desc(history::Column::CreatedAt)
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

    /// Compares the stored balance with the ledger sum.
    pub async fn reconcile(&self, user_id: Uuid, seller_id: Uuid) -> AppResult<ReconcileResponse> {
        let stored_balance = user_points::Entity::find_by_id((user_id, seller_id))
            .one(self.pool.as_ref())
            .await?
            .map_or(0, |b| b.points);

        let entries: Vec<(i64, i64)> = history::Entity::find()
            .select_only()
            .column(history::Column::PointsEarned)
            .column(history::Column::PointsSpent)
            .filter(history::Column::UserId.eq(user_id))
            .filter(history::Column::SellerId.eq(seller_id))
            .into_tuple()
            .all(self.pool.as_ref())
            .await?;
        let ledger_balance = ledger_balance(&entries)?;

        if stored_balance != ledger_balance {
            log::warn!(
                "Points mismatch for user {user_id} at seller {seller_id}: stored={stored_balance}, ledger={ledger_balance}"
            );
        }

        Ok(ReconcileResponse {
            seller_id,
            stored_balance,
            ledger_balance,
            consistent: stored_balance == ledger_balance,
        })
    }

    pub async fn get_config(&self, seller_id: Uuid) -> AppResult<RewardsConfigResponse> {
        let (config, tier_list) = load_rules(self.pool.as_ref(), seller_id).await?;
        let config = config.unwrap_or_else(|| default_config(seller_id));
        Ok(RewardsConfigResponse::build(config, tier_list))
    }

    /// Replaces the seller's config and tier set in one transaction.
    pub async fn put_config(
        &self,
        seller_id: Uuid,
        req: &RewardsConfigRequest,
    ) -> AppResult<RewardsConfigResponse> {
        validate_config(req)?;
        let now = Utc::now();

        let txn = self.pool.begin().await?;

        let config = rewards_config::ActiveModel {
            seller_id: Set(seller_id),
            is_active: Set(req.is_active),
            minimum_purchase_cents: Set(req.minimum_purchase_cents),
            cents_per_point: Set(req.cents_per_point),
            updated_at: Set(now),
        };
        rewards_config::Entity::insert(config)
            .on_conflict(
                OnConflict::column(rewards_config::Column::SellerId)
                    .update_columns([
                        rewards_config::Column::IsActive,
                        rewards_config::Column::MinimumPurchaseCents,
                        rewards_config::Column::CentsPerPoint,
                        rewards_config::Column::UpdatedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        tiers::Entity::delete_many()
            .filter(tiers::Column::SellerId.eq(seller_id))
            .exec(&txn)
            .await?;

        if !req.tiers.is_empty() {
            let rows = req.tiers.iter().map(|t| tiers::ActiveModel {
                id: Set(Uuid::new_v4()),
                seller_id: Set(seller_id),
                name: Set(t.name.trim().to_string()),
                minimum_purchase_cents: Set(t.minimum_purchase_cents),
                multiplier_bp: Set(t.multiplier_bp),
            });
            tiers::Entity::insert_many(rows)
                .exec_without_returning(&txn)
                .await?;
        }

        txn.commit().await?;
        log::info!(
            "Rewards config updated for seller {seller_id} ({} tiers)",
            req.tiers.len()
        );

        self.get_config(seller_id).await
    }
}

fn default_config(seller_id: Uuid) -> rewards_config::Model {
    rewards_config::Model {
        seller_id,
        is_active: false,
        minimum_purchase_cents: 0,
        cents_per_point: DEFAULT_CENTS_PER_POINT,
        updated_at: Utc::now(),
    }
}

/// Config plus tiers, highest threshold first.
async fn load_rules<C: ConnectionTrait>(
    conn: &C,
    seller_id: Uuid,
) -> Result<(Option<rewards_config::Model>, Vec<tiers::Model>), DbErr> {
    let config = rewards_config::Entity::find_by_id(seller_id).one(conn).await?;
    let tier_list = tiers::Entity::find()
        .filter(tiers::Column::SellerId.eq(seller_id))
        .order_by_desc(tiers::Column::MinimumPurchaseCents)
        .all(conn)
        .await?;
    Ok((config, tier_list))
}

async fn ensure_balance_row<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    seller_id: Uuid,
) -> Result<(), DbErr> {
    let row = user_points::ActiveModel {
        user_id: Set(user_id),
        seller_id: Set(seller_id),
        points: Set(0),
        updated_at: Set(Utc::now()),
    };
    user_points::Entity::insert(row)
        .on_conflict(
            OnConflict::columns([user_points::Column::UserId, user_points::Column::SellerId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(conn)
        .await?;
    Ok(())
}

fn ledger_balance(entries: &[(i64, i64)]) -> AppResult<i64> {
    entries
        .iter()
        .try_fold(0i64, |acc, (earned, spent)| {
            acc.checked_add(*earned)?.checked_sub(*spent)
        })
        .ok_or_else(|| AppError::InternalError("Points ledger overflow".to_string()))
}

fn validate_config(req: &RewardsConfigRequest) -> AppResult<()> {
    if req.cents_per_point <= 0 {
        return Err(AppError::ValidationError(
            "cents_per_point must be positive".to_string(),
        ));
    }
    if req.minimum_purchase_cents < 0 {
        return Err(AppError::ValidationError(
            "minimum_purchase_cents must not be negative".to_string(),
        ));
    }

    let mut names = HashSet::new();
    for tier in &req.tiers {
        let name = tier.name.trim();
        if name.is_empty() {
            return Err(AppError::ValidationError(
                "Tier name must not be empty".to_string(),
            ));
        }
        if tier.multiplier_bp <= 0 {
            return Err(AppError::ValidationError(format!(
                "Tier '{name}' multiplier must be positive"
            )));
        }
        if tier.minimum_purchase_cents < 0 {
            return Err(AppError::ValidationError(format!(
                "Tier '{name}' threshold must not be negative"
            )));
        }
        if !names.insert(name.to_lowercase()) {
            return Err(AppError::ValidationError(format!(
                "Duplicate tier name '{name}'"
            )));
        }
    }
    Ok(())
}
