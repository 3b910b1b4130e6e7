//! Membership plan catalog.

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use domain::models::membership_plan::{MembershipPlan, PlanDraft, PlanFilter, UpdatePlanRequest};
use shared::pagination::{PageRequest, PageResult};

use crate::app::AppState;
use crate::extractors::{ProjectOperator, WebUser};
use crate::response::{ApiResponse, ApiResult};
use crate::services::CatalogService;

/// Customer-facing plan list.
pub fn web_router() -> Router<AppState> {
    Router::new().route("/plans", get(list_active_plans))
}

pub fn project_router() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans).post(create_plan))
        .route(
            "/plans/:id",
            get(get_plan).put(update_plan).delete(delete_plan),
        )
}

async fn list_active_plans(State(state): State<AppState>, _user: WebUser) -> ApiResult<Vec<MembershipPlan>> {
    let plans = CatalogService::new(state.pool.clone()).list_active_plans().await?;
    Ok(ApiResponse::ok(plans))
}

/// GET /project/plans
async fn list_plans(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Query(filter): Query<PlanFilter>,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<MembershipPlan>> {
    let result = CatalogService::new(state.pool.clone())
        .list_plans(&filter, &page)
        .await?;
    Ok(ApiResponse::ok(result))
}

/// POST /project/plans
async fn create_plan(
    State(state): State<AppState>,
    op: ProjectOperator,
    Json(draft): Json<PlanDraft>,
) -> ApiResult<MembershipPlan> {
    let plan = CatalogService::new(state.pool.clone()).create_plan(draft).await?;
    tracing::info!(operator_id = op.operator.id, plan_id = plan.id, "Plan created by operator");
    Ok(ApiResponse::with_msg(plan, "创建成功"))
}

async fn get_plan(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<MembershipPlan> {
    let plan = CatalogService::new(state.pool.clone()).get_plan(id).await?;
    Ok(ApiResponse::ok(plan))
}

/// PUT /project/plans/:id
async fn update_plan(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
    Json(patch): Json<UpdatePlanRequest>,
) -> ApiResult<MembershipPlan> {
    let plan = CatalogService::new(state.pool.clone())
        .update_plan(id, patch)
        .await?;
    Ok(ApiResponse::with_msg(plan, "更新成功"))
}

/// DELETE /project/plans/:id
async fn delete_plan(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    CatalogService::new(state.pool.clone()).delete_plan(id).await?;
    Ok(ApiResponse::with_msg((), "删除成功"))
}
