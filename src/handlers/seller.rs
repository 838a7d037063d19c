//! Seller back office: incoming orders, listings, store status and rewards setup.
//! Every route requires a profile with `is_seller`.

use super::current_user_id;
use crate::models::*;
use crate::services::{OrderService, RewardsService, SellerService};
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/seller/orders",
    tag = "seller",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("per_page" = Option<u64>, Query, description = "Page size (default 20)"),
        ("status" = Option<OrderStatus>, Query, description = "Only this status")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Orders received by the seller"),
        (status = 403, description = "Not a seller")
    )
)]
pub async fn get_seller_orders(
    seller_service: web::Data<SellerService>,
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    seller_service.ensure_seller(user_id).await?;
    match order_service.list_seller_orders(user_id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/seller/orders/{id}/status",
    tag = "seller",
    params(
        ("id" = Uuid, Path, description = "Order id")
    ),
    request_body = UpdateOrderStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Status changed", body = OrderResponse),
        (status = 400, description = "Status not settable by sellers"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Illegal transition")
    )
)]
pub async fn update_order_status(
    seller_service: web::Data<SellerService>,
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateOrderStatusRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    seller_service.ensure_seller(user_id).await?;
    match order_service
        .update_status_as_seller(user_id, path.into_inner(), payload.status)
        .await
    {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": order }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/seller/products",
    tag = "seller",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "All listings of the seller", body = [ListingResponse]),
        (status = 403, description = "Not a seller")
    )
)]
pub async fn get_products(
    seller_service: web::Data<SellerService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match seller_service.list_products(user_id).await {
        Ok(listings) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": listings }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/seller/products",
    tag = "seller",
    request_body = CreateProductRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Product listed", body = ListingResponse),
        (status = 400, description = "Invalid product"),
        (status = 403, description = "Not a seller")
    )
)]
pub async fn create_product(
    seller_service: web::Data<SellerService>,
    req: HttpRequest,
    payload: web::Json<CreateProductRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match seller_service.create_product(user_id, &payload).await {
        Ok(listing) => Ok(HttpResponse::Created().json(json!({ "success": true, "data": listing }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/seller/products/{product_id}",
    tag = "seller",
    params(
        ("product_id" = Uuid, Path, description = "Product id")
    ),
    request_body = UpdateListingRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Listing updated", body = ListingResponse),
        (status = 404, description = "Listing not found")
    )
)]
pub async fn update_product(
    seller_service: web::Data<SellerService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateListingRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match seller_service
        .update_listing(user_id, path.into_inner(), &payload)
        .await
    {
        Ok(listing) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": listing }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/seller/status",
    tag = "seller",
    request_body = SetSellerStatusRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Store opened or closed", body = SellerStatusResponse),
        (status = 403, description = "Not a seller")
    )
)]
pub async fn set_status(
    seller_service: web::Data<SellerService>,
    req: HttpRequest,
    payload: web::Json<SetSellerStatusRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match seller_service.set_status(user_id, payload.is_open).await {
        Ok(status) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": status }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/seller/rewards",
    tag = "seller",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Rewards program and tiers", body = RewardsConfigResponse),
        (status = 403, description = "Not a seller")
    )
)]
pub async fn get_rewards_config(
    seller_service: web::Data<SellerService>,
    rewards_service: web::Data<RewardsService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    seller_service.ensure_seller(user_id).await?;
    match rewards_service.get_config(user_id).await {
        Ok(config) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": config }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/seller/rewards",
    tag = "seller",
    request_body = RewardsConfigRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Rewards program replaced", body = RewardsConfigResponse),
        (status = 400, description = "Invalid configuration"),
        (status = 403, description = "Not a seller")
    )
)]
pub async fn put_rewards_config(
    seller_service: web::Data<SellerService>,
    rewards_service: web::Data<RewardsService>,
    req: HttpRequest,
    payload: web::Json<RewardsConfigRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    seller_service.ensure_seller(user_id).await?;
    match rewards_service.put_config(user_id, &payload).await {
        Ok(config) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": config }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn seller_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/seller")
            .route("/orders", web::get().to(get_seller_orders))
            .route("/orders/{id}/status", web::post().to(update_order_status))
            .route("/products", web::get().to(get_products))
            .route("/products", web::post().to(create_product))
            .route("/products/{product_id}", web::put().to(update_product))
            .route("/status", web::put().to(set_status))
            .route("/rewards", web::get().to(get_rewards_config))
            .route("/rewards", web::put().to(put_rewards_config)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::entities::profile_entity as profiles;
    use crate::services::CatalogService;
    use actix_web::{App, HttpMessage, http::StatusCode, test};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn test_buyer_cannot_read_seller_orders() {
        let buyer = profiles::Model {
            id: Uuid::new_v4(),
            display_name: "Mario".to_string(),
            phone: None,
            is_seller: false,
            created_at: Utc::now(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![buyer.clone()]])
            .into_connection();
        let pool = Arc::new(db);
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(SellerService::new(
                    pool.clone(),
                    CatalogService::new(pool.clone()),
                )))
                .app_data(web::Data::new(OrderService::new(pool)))
                .configure(seller_config),
        )
        .await;

        let req = test::TestRequest::get().uri("/seller/orders").to_request();
        req.extensions_mut().insert(buyer.id);

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "FORBIDDEN");
    }
}
