use super::current_user_id;
use crate::models::*;
use crate::services::CartService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/cart",
    tag = "cart",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "All carts of the buyer with totals", body = CartSummary),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_cart(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match cart_service.get_cart_summary(user_id).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": summary }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/cart/items",
    tag = "cart",
    request_body = AddCartItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Item added", body = CartSummary),
        (status = 400, description = "Invalid quantity"),
        (status = 404, description = "Listing not found or hidden"),
        (status = 409, description = "Not enough units")
    )
)]
pub async fn add_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    payload: web::Json<AddCartItemRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match cart_service.add_item(user_id, &payload).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": summary }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/cart/items/{id}",
    tag = "cart",
    params(
        ("id" = Uuid, Path, description = "Cart item id")
    ),
    request_body = UpdateCartItemRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Quantity changed; 0 removes the item", body = CartSummary),
        (status = 404, description = "Cart item not found")
    )
)]
pub async fn update_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    payload: web::Json<UpdateCartItemRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match cart_service
        .update_item(user_id, path.into_inner(), payload.qty)
        .await
    {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": summary }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/cart/items/{id}",
    tag = "cart",
    params(
        ("id" = Uuid, Path, description = "Cart item id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Item removed", body = CartSummary),
        (status = 404, description = "Cart item not found")
    )
)]
pub async fn remove_item(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match cart_service.remove_item(user_id, path.into_inner()).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": summary }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/cart/{cart_id}",
    tag = "cart",
    params(
        ("cart_id" = Uuid, Path, description = "Cart id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Cart and its items deleted"),
        (status = 404, description = "Cart not found")
    )
)]
pub async fn clear_cart(
    cart_service: web::Data<CartService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match cart_service.clear_cart(user_id, path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": null }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn cart_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cart")
            .route("", web::get().to(get_cart))
            .route("/items", web::post().to(add_item))
            .route("/items/{id}", web::put().to(update_item))
            .route("/items/{id}", web::delete().to(remove_item))
            .route("/{cart_id}", web::delete().to(clear_cart)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use actix_web::{App, HttpMessage, http::StatusCode, test};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn test_cart_requires_user() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(CartService::new(Arc::new(db))))
                .configure(cart_config),
        )
        .await;

        let req = test::TestRequest::get().uri("/cart").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_empty_cart_summary() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<crate::entities::cart_entity::Model>::new()])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(CartService::new(Arc::new(db))))
                .configure(cart_config),
        )
        .await;

        let req = test::TestRequest::get().uri("/cart").to_request();
        req.extensions_mut().insert(Uuid::new_v4());
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["total_cents"], 0);
        assert_eq!(body["data"]["item_count"], 0);
    }
}
