use crate::models::*;
use crate::services::CatalogService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/search",
    tag = "catalog",
    params(
        ("q" = String, Query, description = "Text matched against title and description"),
        ("category" = Option<String>, Query, description = "Only this category"),
        ("limit" = Option<u64>, Query, description = "Max results (default 20, max 100)")
    ),
    responses(
        (status = 200, description = "Matching visible listings", body = [ListingResponse]),
        (status = 400, description = "Empty query")
    )
)]
pub async fn search(
    catalog_service: web::Data<CatalogService>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse> {
    match catalog_service.search(&query).await {
        Ok(listings) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": listings }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn search_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/search", web::get().to(search));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use actix_web::{App, http::StatusCode, test};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn test_blank_search_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(CatalogService::new(Arc::new(db))))
                .configure(search_config),
        )
        .await;

        let req = test::TestRequest::get().uri("/search?q=%20%20").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}
