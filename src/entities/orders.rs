use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{DeriveActiveEnum, EnumIter};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Order lifecycle: pending -> seller_confirmed -> delivered -> completed,
/// plus cancelled from any non-terminal state.
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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "order_status")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "seller_confirmed")]
    SellerConfirmed,
    #[sea_orm(string_value = "delivered")]
    Delivered,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Units are still reserved for the order and go back on cancellation.
    pub fn holds_reservation(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::SellerConfirmed)
    }

    /// Central transition table; every status change goes through here.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        match (self, next) {
            (OrderStatus::Pending, OrderStatus::SellerConfirmed)
            | (OrderStatus::SellerConfirmed, OrderStatus::Delivered)
            | (OrderStatus::Delivered, OrderStatus::Completed) => true,
            (from, OrderStatus::Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::SellerConfirmed => write!(f, "seller_confirmed"),
            OrderStatus::Delivered => write!(f, "delivered"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_method")]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[sea_orm(string_value = "cash")]
    Cash,
    #[sea_orm(string_value = "transfer")]
    Transfer,
    #[sea_orm(string_value = "card")]
    Card,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::Transfer => write!(f, "transfer"),
            PaymentMethod::Card => write!(f, "card"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub seller_id: Uuid,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub payment_method: PaymentMethod,
    pub delivery_address: Json,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::SellerConfirmed)]
    #[case(OrderStatus::SellerConfirmed, OrderStatus::Delivered)]
    #[case(OrderStatus::Delivered, OrderStatus::Completed)]
    #[case(OrderStatus::Pending, OrderStatus::Cancelled)]
    #[case(OrderStatus::SellerConfirmed, OrderStatus::Cancelled)]
    #[case(OrderStatus::Delivered, OrderStatus::Cancelled)]
    fn test_allowed_transitions(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert!(from.can_transition_to(to), "{from} -> {to} should be allowed");
    }

    #[rstest]
    #[case(OrderStatus::Pending, OrderStatus::Delivered)]
    #[case(OrderStatus::Pending, OrderStatus::Completed)]
    #[case(OrderStatus::Delivered, OrderStatus::SellerConfirmed)]
    #[case(OrderStatus::Completed, OrderStatus::Cancelled)]
    #[case(OrderStatus::Cancelled, OrderStatus::Pending)]
    #[case(OrderStatus::Cancelled, OrderStatus::Cancelled)]
    #[case(OrderStatus::Pending, OrderStatus::Pending)]
    fn test_rejected_transitions(#[case] from: OrderStatus, #[case] to: OrderStatus) {
        assert!(!from.can_transition_to(to), "{from} -> {to} should be rejected");
    }

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Delivered.is_terminal());
    }

    #[rstest]
    #[case(OrderStatus::Pending, true)]
    #[case(OrderStatus::SellerConfirmed, true)]
    #[case(OrderStatus::Delivered, false)]
    #[case(OrderStatus::Completed, false)]
    #[case(OrderStatus::Cancelled, false)]
    fn test_holds_reservation(#[case] status: OrderStatus, #[case] held: bool) {
        assert_eq!(status.holds_reservation(), held);
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let s = serde_json::to_string(&OrderStatus::SellerConfirmed).unwrap();
        assert_eq!(s, "\"seller_confirmed\"");
        assert_eq!(OrderStatus::SellerConfirmed.to_string(), "seller_confirmed");
    }
}
