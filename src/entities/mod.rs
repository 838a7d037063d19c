pub mod cart_items;
pub mod carts;
pub mod notification_outbox;
pub mod notifications;
pub mod order_items;
pub mod orders;
pub mod points_history;
pub mod products;
pub mod profiles;
pub mod seller_products;
pub mod seller_reward_tiers;
pub mod seller_rewards_config;
pub mod seller_status;
pub mod user_points;

pub use cart_items as cart_item_entity;
pub use carts as cart_entity;
pub use notification_outbox as outbox_entity;
pub use notifications as notification_entity;
pub use order_items as order_item_entity;
pub use orders as order_entity;
pub use points_history as points_history_entity;
pub use products as product_entity;
pub use profiles as profile_entity;
pub use seller_products as seller_product_entity;
pub use seller_reward_tiers as reward_tier_entity;
pub use seller_rewards_config as rewards_config_entity;
pub use seller_status as seller_status_entity;
pub use user_points as user_points_entity;

pub use notification_outbox::OutboxStatus;
pub use orders::{OrderStatus, PaymentMethod};
pub use points_history::PointsEntryKind;
pub use seller_products::InventoryMode;
