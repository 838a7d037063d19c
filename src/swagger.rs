use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::entities::{InventoryMode, OrderStatus, PaymentMethod, PointsEntryKind};
use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
            )
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::feed::get_feed,
        handlers::feed::get_categories,
        handlers::search::search,
        handlers::cart::get_cart,
        handlers::cart::add_item,
        handlers::cart::update_item,
        handlers::cart::remove_item,
        handlers::cart::clear_cart,
        handlers::order::get_orders,
        handlers::order::create_order,
        handlers::order::checkout,
        handlers::order::get_order,
        handlers::order::confirm_receipt,
        handlers::order::cancel_order,
        handlers::seller::get_seller_orders,
        handlers::seller::update_order_status,
        handlers::seller::get_products,
        handlers::seller::create_product,
        handlers::seller::update_product,
        handlers::seller::set_status,
        handlers::seller::get_rewards_config,
        handlers::seller::put_rewards_config,
        handlers::points::get_balances,
        handlers::points::get_history,
        handlers::points::reconcile,
        handlers::points::quote,
        handlers::points::award,
        handlers::points::redeem,
        handlers::notification::get_notifications,
        handlers::notification::mark_read,
        handlers::notification::mark_all_read,
    ),
    components(
        schemas(
            ApiError,
            InventoryMode,
            OrderStatus,
            PaymentMethod,
            PointsEntryKind,
            FeedQuery,
            SearchQuery,
            ListingResponse,
            CategoryResponse,
            AddCartItemRequest,
            UpdateCartItemRequest,
            CartItemResponse,
            CartResponse,
            CartSummary,
            OrderLineRequest,
            CreateOrderRequest,
            CheckoutRequest,
            OrderQuery,
            UpdateOrderStatusRequest,
            ConfirmReceiptRequest,
            OrderResponse,
            OrderItemResponse,
            OrderDetailResponse,
            ConfirmReceiptResponse,
            CreateProductRequest,
            UpdateListingRequest,
            SetSellerStatusRequest,
            SellerStatusResponse,
            PointsBalanceResponse,
            PointsHistoryQuery,
            PointsHistoryResponse,
            AwardPointsRequest,
            AwardOutcome,
            RedeemPointsRequest,
            RedeemPointsResponse,
            ReconcileResponse,
            QuoteQuery,
            PointsQuote,
            RewardTierInput,
            RewardsConfigRequest,
            RewardTierResponse,
            RewardsConfigResponse,
            NotificationQuery,
            NotificationResponse,
            MarkReadResponse,
            PaginationParams,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "catalog", description = "Public feed and search"),
        (name = "cart", description = "Per-seller carts"),
        (name = "order", description = "Buyer orders"),
        (name = "seller", description = "Seller back office"),
        (name = "points", description = "Loyalty points"),
        (name = "notification", description = "In-app notifications"),
    ),
    info(
        title = "Marketplace Backend API",
        version = "0.1.0",
        description = "Local marketplace storefront REST API"
    ),
    servers(
        (url = "/api", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
    .route(
        "/swagger-ui",
        web::get().to(|| async {
            actix_web::HttpResponse::Found()
                .append_header(("Location", "/swagger-ui/"))
                .finish()
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_marketplace_routes() {
        let doc = ApiDoc::openapi();
        for path in ["/feed", "/cart/items/{id}", "/orders/confirm-receipt", "/points/quote"] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
