pub mod cart_service;
pub mod catalog_service;
pub mod notification_service;
pub mod order_service;
pub mod rewards_service;
pub mod seller_service;

pub use cart_service::*;
pub use catalog_service::*;
pub use notification_service::NotificationService;
pub use order_service::*;
pub use rewards_service::*;
pub use seller_service::*;
