//! Commission balances for customers and tier administration.

use axum::{
    extract::{Path, Query, State},
    routing::{get, put},
    Json, Router,
};
use domain::models::commission::{
    AccountFlow, CommissionDetail, CommissionOverview, CommissionTier, TierRequest,
};
use shared::pagination::{PageRequest, PageResult};

use crate::app::AppState;
use crate::extractors::{ProjectOperator, WebUser};
use crate::response::{ApiResponse, ApiResult};
use crate::services::CommissionService;

pub fn web_router() -> Router<AppState> {
    Router::new()
        .route("/commission", get(my_commission))
        .route("/commission/details", get(my_details))
        .route("/commission/flows", get(my_flows))
}

pub fn project_router() -> Router<AppState> {
    Router::new()
        .route("/commission/tiers", get(list_tiers).post(create_tier))
        .route("/commission/tiers/:id", put(update_tier).delete(delete_tier))
}

/// GET /web/commission
async fn my_commission(
    State(state): State<AppState>,
    user: WebUser,
) -> ApiResult<CommissionOverview> {
    let overview = CommissionService::new(state.pool.clone())
        .overview(user.id())
        .await?;
    Ok(ApiResponse::ok(overview))
}

async fn my_details(
    State(state): State<AppState>,
    user: WebUser,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<CommissionDetail>> {
    let result = CommissionService::new(state.pool.clone())
        .list_details(user.id(), &page)
        .await?;
    Ok(ApiResponse::ok(result))
}

async fn my_flows(
    State(state): State<AppState>,
    user: WebUser,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<AccountFlow>> {
    let result = CommissionService::new(state.pool.clone())
        .list_flows(user.id(), &page)
        .await?;
    Ok(ApiResponse::ok(result))
}

async fn list_tiers(
    State(state): State<AppState>,
    _op: ProjectOperator,
) -> ApiResult<Vec<CommissionTier>> {
    let tiers = CommissionService::new(state.pool.clone()).list_tiers().await?;
    Ok(ApiResponse::ok(tiers))
}

/// POST /project/commission/tiers
///
/// Every change must leave exactly one enabled fallback tier.
async fn create_tier(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Json(request): Json<TierRequest>,
) -> ApiResult<CommissionTier> {
    let tier = CommissionService::new(state.pool.clone())
        .create_tier(&request)
        .await?;
    Ok(ApiResponse::with_msg(tier, "创建成功"))
}

async fn update_tier(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
    Json(request): Json<TierRequest>,
) -> ApiResult<CommissionTier> {
    let tier = CommissionService::new(state.pool.clone())
        .update_tier(id, &request)
        .await?;
    Ok(ApiResponse::with_msg(tier, "更新成功"))
}

async fn delete_tier(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    CommissionService::new(state.pool.clone())
        .delete_tier(id)
        .await?;
    Ok(ApiResponse::with_msg((), "删除成功"))
}
