pub mod cart;
pub mod feed;
pub mod notification;
pub mod order;
pub mod points;
pub mod search;
pub mod seller;

pub use cart::cart_config;
pub use feed::feed_config;
pub use notification::notification_config;
pub use order::order_config;
pub use points::points_config;
pub use search::search_config;
pub use seller::seller_config;

use crate::error::{AppError, AppResult};
use actix_web::{HttpMessage, HttpRequest};
use uuid::Uuid;

/// User id placed in the request extensions by the auth middleware.
pub(crate) fn current_user_id(req: &HttpRequest) -> AppResult<Uuid> {
    req.extensions()
        .get::<Uuid>()
        .copied()
        .ok_or_else(|| AppError::AuthError("Missing access token".to_string()))
}

/// Registers every API route; mounted under `/api`.
pub fn api_config(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.configure(feed_config)
        .configure(search_config)
        .configure(cart_config)
        .configure(order_config)
        .configure(seller_config)
        .configure(points_config)
        .configure(notification_config);
}
