use super::current_user_id;
use crate::models::*;
use crate::services::NotificationService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/notifications",
    tag = "notification",
    params(
        ("unread_only" = Option<bool>, Query, description = "Only unread notifications"),
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("per_page" = Option<u64>, Query, description = "Page size (default 20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "In-app notifications, newest first"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_notifications(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match notification_service.list(user_id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/notifications/{id}/read",
    tag = "notification",
    params(
        ("id" = Uuid, Path, description = "Notification id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Marked as read", body = NotificationResponse),
        (status = 404, description = "Notification not found")
    )
)]
pub async fn mark_read(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match notification_service.mark_read(user_id, path.into_inner()).await {
        Ok(n) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": n }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/notifications/read-all",
    tag = "notification",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "All notifications marked as read", body = MarkReadResponse)
    )
)]
pub async fn mark_all_read(
    notification_service: web::Data<NotificationService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match notification_service.mark_all_read(user_id).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn notification_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .route("", web::get().to(get_notifications))
            .route("/read-all", web::post().to(mark_all_read))
            .route("/{id}/read", web::post().to(mark_read)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::config::NotifierConfig;
    use crate::entities::notification_entity as notifications;
    use actix_web::{App, HttpMessage, http::StatusCode, test};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[actix_web::test]
    async fn test_mark_all_read_reports_count() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 3,
            }])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(NotificationService::new(
                    Arc::new(db),
                    NotifierConfig::default(),
                )))
                .configure(notification_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/notifications/read-all")
            .to_request();
        req.extensions_mut().insert(Uuid::new_v4());
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["updated"], 3);
    }

    #[actix_web::test]
    async fn test_mark_read_of_unknown_notification() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<notifications::Model>::new()])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(NotificationService::new(
                    Arc::new(db),
                    NotifierConfig::default(),
                )))
                .configure(notification_config),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/notifications/{}/read", Uuid::new_v4()))
            .to_request();
        req.extensions_mut().insert(Uuid::new_v4());
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
