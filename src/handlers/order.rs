use super::current_user_id;
use crate::models::*;
use crate::services::OrderService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/orders",
    tag = "order",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("per_page" = Option<u64>, Query, description = "Page size (default 20)"),
        ("status" = Option<OrderStatus>, Query, description = "Only this status")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "The buyer's orders, newest first"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_orders(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    query: web::Query<OrderQuery>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match order_service.list_buyer_orders(user_id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders",
    tag = "order",
    request_body = CreateOrderRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Order placed", body = OrderDetailResponse),
        (status = 400, description = "Invalid lines or address"),
        (status = 404, description = "Product not sold by this seller"),
        (status = 409, description = "Seller closed or not enough units")
    )
)]
pub async fn create_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    payload: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match order_service.place_order(user_id, &payload).await {
        Ok(detail) => Ok(HttpResponse::Created().json(json!({ "success": true, "data": detail }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/checkout",
    tag = "order",
    request_body = CheckoutRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 201, description = "Cart turned into an order", body = OrderDetailResponse),
        (status = 400, description = "Empty cart or invalid address"),
        (status = 404, description = "Cart not found"),
        (status = 409, description = "Seller closed or not enough units")
    )
)]
pub async fn checkout(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    payload: web::Json<CheckoutRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match order_service.checkout(user_id, &payload).await {
        Ok(detail) => Ok(HttpResponse::Created().json(json!({ "success": true, "data": detail }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "order",
    params(
        ("id" = Uuid, Path, description = "Order id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Order with its items", body = OrderDetailResponse),
        (status = 404, description = "Order not found")
    )
)]
pub async fn get_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match order_service.get_order(user_id, path.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": detail }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/confirm-receipt",
    tag = "order",
    request_body = ConfirmReceiptRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Order completed and points awarded", body = ConfirmReceiptResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is not delivered")
    )
)]
pub async fn confirm_receipt(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    payload: web::Json<ConfirmReceiptRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match order_service.confirm_receipt(user_id, payload.order_id).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/cancel",
    tag = "order",
    params(
        ("id" = Uuid, Path, description = "Order id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Order cancelled", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order is no longer pending")
    )
)]
pub async fn cancel_order(
    order_service: web::Data<OrderService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match order_service.cancel_as_buyer(user_id, path.into_inner()).await {
        Ok(order) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": order }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn order_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(get_orders))
            .route("", web::post().to(create_order))
            .route("/checkout", web::post().to(checkout))
            .route("/confirm-receipt", web::post().to(confirm_receipt))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/cancel", web::post().to(cancel_order)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use actix_web::{App, HttpMessage, http::StatusCode, test};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn test_order_with_duplicate_lines_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(OrderService::new(Arc::new(db))))
                .configure(order_config),
        )
        .await;

        let product_id = Uuid::new_v4();
        let req = test::TestRequest::post()
            .uri("/orders")
            .set_json(json!({
                "seller_id": Uuid::new_v4(),
                "items": [
                    {"product_id": product_id, "qty": 1},
                    {"product_id": product_id, "qty": 2}
                ],
                "payment_method": "cash",
                "delivery_address": {"street": "Reforma 10"}
            }))
            .to_request();
        req.extensions_mut().insert(Uuid::new_v4());

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_unknown_order_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<crate::entities::order_entity::Model>::new()])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(OrderService::new(Arc::new(db))))
                .configure(order_config),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/orders/{}", Uuid::new_v4()))
            .to_request();
        req.extensions_mut().insert(Uuid::new_v4());

        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
