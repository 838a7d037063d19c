use crate::config::NotifierConfig;
use crate::database::DbPool;
use crate::entities::{
    OutboxStatus, notification_entity as notifications, outbox_entity as outbox,
};
use crate::error::{AppError, AppResult};
use crate::models::{
    MarkReadResponse, NotificationQuery, NotificationResponse, PaginatedResponse,
    PaginationParams,
};
use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::{Expr, LockBehavior, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseTransaction,
    DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde_json::{Value, json};
use uuid::Uuid;

pub const ORDER_PLACED: &str = "order_placed";
pub const ORDER_STATUS_CHANGED: &str = "order_status_changed";
pub const POINTS_EARNED: &str = "points_earned";
pub const POINTS_REDEEMED: &str = "points_redeemed";

const MAX_BACKOFF_SECS: i64 = 3600;

/// Writes an outbox event on the caller's connection, usually the business transaction.
pub async fn enqueue<C: ConnectionTrait>(
    conn: &C,
    recipient_id: Uuid,
    event_type: &str,
    payload: Value,
) -> Result<(), DbErr> {
    let now = Utc::now();
    let row = outbox::ActiveModel {
        id: Set(Uuid::new_v4()),
        recipient_id: Set(recipient_id),
        event_type: Set(event_type.to_string()),
        payload: Set(payload),
        status: Set(OutboxStatus::Pending),
        attempts: Set(0),
        last_error: Set(None),
        available_at: Set(now),
        created_at: Set(now),
        delivered_at: Set(None),
    };
    outbox::Entity::insert(row).exec_without_returning(conn).await?;
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedNotification {
    pub title: String,
    pub body: String,
}

pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}${}.{:02}", abs / 100, abs % 100)
}

fn short_id(payload: &Value, key: &str) -> String {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.chars().take(8).collect())
        .unwrap_or_else(|| "?".to_string())
}

fn int_field(payload: &Value, key: &str) -> i64 {
    payload.get(key).and_then(Value::as_i64).unwrap_or(0)
}

/// Turns an outbox event into the text shown in the in-app inbox.
pub fn render(event_type: &str, payload: &Value) -> RenderedNotification {
    match event_type {
        ORDER_PLACED => RenderedNotification {
            title: "New order".to_string(),
            body: format!(
                "Order #{} for {} is waiting for your confirmation.",
                short_id(payload, "order_id"),
                format_cents(int_field(payload, "total_cents"))
            ),
        },
        ORDER_STATUS_CHANGED => {
            let status = payload
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("updated");
            let phrase = match status {
                "seller_confirmed" => "was confirmed by the seller",
                "delivered" => "was delivered",
                "completed" => "was completed",
                "cancelled" => "was cancelled",
                _ => "was updated",
            };
            RenderedNotification {
                title: "Order update".to_string(),
                body: format!("Order #{} {phrase}.", short_id(payload, "order_id")),
            }
        }
        POINTS_EARNED => {
            let points = int_field(payload, "points");
            let tier = payload
                .get("tier_name")
                .and_then(Value::as_str)
                .map(|t| format!(" ({t} tier)"))
                .unwrap_or_default();
            RenderedNotification {
                title: "Points earned".to_string(),
                body: format!(
                    "You earned {points} points{tier} for order #{}.",
                    short_id(payload, "order_id")
                ),
            }
        }
        POINTS_REDEEMED => RenderedNotification {
            title: "Points redeemed".to_string(),
            body: format!(
                "You redeemed {} points. Remaining balance: {}.",
                int_field(payload, "points"),
                int_field(payload, "balance")
            ),
        },
        _ => RenderedNotification {
            title: "Notification".to_string(),
            body: "You have a new update.".to_string(),
        },
    }
}

/// Delay before the next attempt after `attempts` failures: base × 2^(attempts−1), capped at one hour.
pub fn backoff_delay(base_secs: i64, attempts: i32) -> Duration {
    let exp = u32::try_from(attempts.saturating_sub(1)).unwrap_or(0).min(30);
    let secs = base_secs
        .max(1)
        .saturating_mul(1i64 << exp)
        .min(MAX_BACKOFF_SECS);
    Duration::seconds(secs)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub delivered: usize,
    pub retried: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct NotificationService {
    pool: DbPool,
    settings: NotifierConfig,
}

impl NotificationService {
    pub fn new(pool: DbPool, settings: NotifierConfig) -> Self {
        Self { pool, settings }
    }

    pub fn settings(&self) -> &NotifierConfig {
        &self.settings
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        query: &NotificationQuery,
    ) -> AppResult<PaginatedResponse<NotificationResponse>> {
        let params = PaginationParams::new(query.page, query.per_page);

        let mut base = notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id));
        if query.unread_only.unwrap_or(false) {
            base = base.filter(notifications::Column::IsRead.eq(false));
        }

        let total = base.clone().count(self.pool.as_ref()).await?;
        let rows = base
            .order_by_desc(notifications::Column::CreatedAt)
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

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> AppResult<NotificationResponse> {
        let row = notifications::Entity::find_by_id(id)
            .filter(notifications::Column::UserId.eq(user_id))
            .one(self.pool.as_ref())
            .await?
            .ok_or_else(|| AppError::NotFound("Notification not found".to_string()))?;

        if row.is_read {
            return Ok(row.into());
        }

        let mut am: notifications::ActiveModel = row.into();
        am.is_read = Set(true);
        let updated = am.update(self.pool.as_ref()).await?;
        Ok(updated.into())
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<MarkReadResponse> {
        let res = notifications::Entity::update_many()
            .col_expr(notifications::Column::IsRead, Expr::value(true))
            .filter(notifications::Column::UserId.eq(user_id))
            .filter(notifications::Column::IsRead.eq(false))
            .exec(self.pool.as_ref())
            .await?;
        Ok(MarkReadResponse {
            updated: res.rows_affected,
        })
    }

    /// Claims one batch of due outbox rows and delivers them as in-app notifications.
    pub async fn dispatch_pending(&self) -> AppResult<DispatchStats> {
        let now = Utc::now();
        let txn = self.pool.begin().await?;

        let batch = outbox::Entity::find()
            .filter(outbox::Column::Status.eq(OutboxStatus::Pending))
            .filter(outbox::Column::AvailableAt.lte(now))
            .order_by_asc(outbox::Column::AvailableAt)
            .limit(self.settings.batch_size.max(1))
            .lock_with_behavior(LockType::Update, LockBehavior::SkipLocked)
            .all(&txn)
            .await?;

        let mut stats = DispatchStats::default();
        for event in batch {
            // savepoint per event so one failure does not abort the batch
            let sp = txn.begin().await?;
            match deliver(&sp, &event, now).await {
                Ok(()) => {
                    sp.commit().await?;
                    stats.delivered += 1;
                }
                Err(e) => {
                    sp.rollback().await?;
                    let failed = self.record_failure(&txn, event, &e.to_string(), now).await?;
                    if failed {
                        stats.failed += 1;
                    } else {
                        stats.retried += 1;
                    }
                }
            }
        }

        txn.commit().await?;

        if stats != DispatchStats::default() {
            log::info!(
                "Outbox dispatch: delivered={}, retried={}, failed={}",
                stats.delivered,
                stats.retried,
                stats.failed
            );
        }
        Ok(stats)
    }

    /// Returns true when the event has exhausted its attempts.
    async fn record_failure(
        &self,
        txn: &DatabaseTransaction,
        event: outbox::Model,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DbErr> {
        let attempts = event.attempts.saturating_add(1);
        let exhausted = attempts >= self.settings.max_attempts;
        let event_id = event.id;

        let mut am: outbox::ActiveModel = event.into();
        am.attempts = Set(attempts);
        am.last_error = Set(Some(error.to_string()));
        if exhausted {
            am.status = Set(OutboxStatus::Failed);
        } else {
            am.available_at = Set(now + backoff_delay(self.settings.base_backoff_secs, attempts));
        }
        am.update(txn).await?;

        if exhausted {
            log::error!("Outbox event {event_id} failed after {attempts} attempts: {error}");
        } else {
            log::warn!("Outbox event {event_id} attempt {attempts} failed: {error}");
        }
        Ok(exhausted)
    }
}

async fn deliver(
    conn: &DatabaseTransaction,
    event: &outbox::Model,
    now: DateTime<Utc>,
) -> Result<(), DbErr> {
    let rendered = render(&event.event_type, &event.payload);

    let row = notifications::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(event.recipient_id),
        kind: Set(event.event_type.clone()),
        title: Set(rendered.title),
        body: Set(rendered.body),
        data: Set(event.payload.clone()),
        is_read: Set(false),
        created_at: Set(now),
    };
    notifications::Entity::insert(row)
        .exec_without_returning(conn)
        .await?;

    outbox::Entity::update_many()
        .col_expr(outbox::Column::Attempts, Expr::col(outbox::Column::Attempts).add(1))
        .set(outbox::ActiveModel {
            status: Set(OutboxStatus::Delivered),
            delivered_at: Set(Some(now)),
            ..Default::default()
        })
        .filter(outbox::Column::Id.eq(event.id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Payload for an order status event.
pub fn order_status_payload(order_id: Uuid, status: impl std::fmt::Display) -> Value {
    json!({ "order_id": order_id, "status": status.to_string() })
}
