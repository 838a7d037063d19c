use super::current_user_id;
use crate::models::*;
use crate::services::RewardsService;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

#[utoipa::path(
    get,
    path = "/points",
    tag = "points",
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Point balances per seller", body = [PointsBalanceResponse]),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_balances(
    rewards_service: web::Data<RewardsService>,
    req: HttpRequest,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match rewards_service.balances(user_id).await {
        Ok(balances) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": balances }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/points/history",
    tag = "points",
    params(
        ("seller_id" = Option<Uuid>, Query, description = "Only this seller"),
        ("page" = Option<u64>, Query, description = "Page number (default 1)"),
        ("per_page" = Option<u64>, Query, description = "Page size (default 20)")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Points ledger, newest first"),
        (status = 401, description = "Unauthorized")
    )
)]
pub async fn get_history(
    rewards_service: web::Data<RewardsService>,
    req: HttpRequest,
    query: web::Query<PointsHistoryQuery>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match rewards_service.history(user_id, &query).await {
        Ok(page) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": page }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/points/{seller_id}/reconcile",
    tag = "points",
    params(
        ("seller_id" = Uuid, Path, description = "Seller id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Stored balance compared with the ledger", body = ReconcileResponse)
    )
)]
pub async fn reconcile(
    rewards_service: web::Data<RewardsService>,
    req: HttpRequest,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match rewards_service.reconcile(user_id, path.into_inner()).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/points/quote",
    tag = "points",
    params(
        ("seller_id" = Uuid, Query, description = "Seller id"),
        ("total_cents" = i64, Query, description = "Purchase amount in cents")
    ),
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Points this amount would earn", body = PointsQuote)
    )
)]
pub async fn quote(
    rewards_service: web::Data<RewardsService>,
    query: web::Query<QuoteQuery>,
) -> Result<HttpResponse> {
    match rewards_service.quote(query.seller_id, query.total_cents).await {
        Ok(quote) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": quote }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/points/award",
    tag = "points",
    request_body = AwardPointsRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Points awarded, or the earlier award when already done", body = AwardOutcome),
        (status = 400, description = "Order not completed"),
        (status = 404, description = "Order not found")
    )
)]
pub async fn award(
    rewards_service: web::Data<RewardsService>,
    req: HttpRequest,
    payload: web::Json<AwardPointsRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match rewards_service.award_for_order(user_id, payload.order_id).await {
        Ok(outcome) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": outcome }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/points/redeem",
    tag = "points",
    request_body = RedeemPointsRequest,
    security(
        ("bearer_auth" = [])
    ),
    responses(
        (status = 200, description = "Points spent", body = RedeemPointsResponse),
        (status = 400, description = "Insufficient points"),
        (status = 409, description = "Already redeemed for this order")
    )
)]
pub async fn redeem(
    rewards_service: web::Data<RewardsService>,
    req: HttpRequest,
    payload: web::Json<RedeemPointsRequest>,
) -> Result<HttpResponse> {
    let user_id = current_user_id(&req)?;
    match rewards_service.redeem(user_id, &payload).await {
        Ok(result) => Ok(HttpResponse::Ok().json(json!({ "success": true, "data": result }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn points_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/points")
            .route("", web::get().to(get_balances))
            .route("/history", web::get().to(get_history))
            .route("/quote", web::get().to(quote))
            .route("/award", web::post().to(award))
            .route("/redeem", web::post().to(redeem))
            .route("/{seller_id}/reconcile", web::get().to(reconcile)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::entities::{reward_tier_entity as tiers, rewards_config_entity as rewards_config};
    use actix_web::{App, http::StatusCode, test};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn test_quote_uses_seller_tiers() {
        let seller_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![rewards_config::Model {
                seller_id,
                is_active: true,
                minimum_purchase_cents: 500_000,
                cents_per_point: 100_000,
                updated_at: Utc::now(),
            }]])
            .append_query_results([vec![tiers::Model {
                id: Uuid::new_v4(),
                seller_id,
                name: "Silver".to_string(),
                minimum_purchase_cents: 1_000_000,
                multiplier_bp: 12_000,
            }]])
            .into_connection();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(RewardsService::new(Arc::new(db))))
                .configure(points_config),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/points/quote?seller_id={seller_id}&total_cents=1000000"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["data"]["points"], 12);
        assert_eq!(body["data"]["tier_name"], "Silver");
    }
}
