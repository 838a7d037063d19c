use crate::models::*;
use crate::services::CatalogService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/feed",
    tag = "catalog",
    params(
        ("category" = Option<String>, Query, description = "Only this category"),
        ("featured" = Option<bool>, Query, description = "Only featured listings"),
        ("offer" = Option<bool>, Query, description = "Only listings on offer"),
        ("limit" = Option<u64>, Query, description = "Max results (default 20, max 100)")
    ),
    responses(
        (status = 200, description = "Visible listings, newest first", body = [ListingResponse])
    )
)]
pub async fn get_feed(
    catalog_service: web::Data<CatalogService>,
    query: web::Query<FeedQuery>,
) -> Result<HttpResponse> {
    match catalog_service.feed(&query).await {
        Ok(listings) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": listings }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/feed/categories",
    tag = "catalog",
    responses(
        (status = 200, description = "Categories with visible listings", body = [CategoryResponse])
    )
)]
pub async fn get_categories(catalog_service: web::Data<CatalogService>) -> Result<HttpResponse> {
    match catalog_service.categories().await {
        Ok(categories) => {
            Ok(HttpResponse::Ok().json(json!({ "success": true, "data": categories })))
        }
        Err(e) => Ok(e.error_response()),
    }
}

pub fn feed_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/feed")
            .route("", web::get().to(get_feed))
            .route("/categories", web::get().to(get_categories)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use actix_web::{App, http::StatusCode, test};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn test_feed_with_nothing_listed() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<crate::entities::seller_status_entity::Model>::new()])
            .append_query_results([Vec::<crate::entities::seller_product_entity::Model>::new()])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(CatalogService::new(Arc::new(db))))
                .configure(feed_config),
        )
        .await;

        let req = test::TestRequest::get().uri("/feed?featured=true").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], json!([]));
    }
}
