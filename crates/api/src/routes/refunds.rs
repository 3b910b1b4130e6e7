//! Refund workflow endpoints (admin).

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use domain::models::refund::{
    ApplyRefundRequest, CompleteRefundRequest, ReasonRequest, Refund, RefundStatus,
};
use serde::Deserialize;
use shared::pagination::{PageRequest, PageResult};

use crate::app::AppState;
use crate::extractors::ProjectOperator;
use crate::response::{ApiResponse, ApiResult};
use crate::services::RefundService;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundQuery {
    pub status: Option<RefundStatus>,
    pub order_id: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/refunds", get(list_refunds).post(apply_refund))
        .route("/refunds/:id", get(get_refund))
        .route("/refunds/:id/dispatch", post(dispatch_refund))
        .route("/refunds/:id/complete", post(complete_refund))
        .route("/refunds/:id/retry", post(retry_refund))
        .route("/refunds/:id/cancel", post(cancel_refund))
}

/// POST /project/refunds
///
/// Requires the operator's TOTP code.
async fn apply_refund(
    State(state): State<AppState>,
    op: ProjectOperator,
    Json(request): Json<ApplyRefundRequest>,
) -> ApiResult<Refund> {
    let refund = RefundService::new(&state)
        .apply(&op.operator, &request)
        .await?;
    Ok(ApiResponse::with_msg(refund, "退款申请成功"))
}

async fn list_refunds(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Query(query): Query<RefundQuery>,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<Refund>> {
    let result = RefundService::new(&state)
        .list(query.status, query.order_id, &page)
        .await?;
    Ok(ApiResponse::ok(result))
}

async fn get_refund(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<Refund> {
    let refund = RefundService::new(&state).get(id).await?;
    Ok(ApiResponse::ok(refund))
}

async fn dispatch_refund(
    State(state): State<AppState>,
    op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<Refund> {
    let refund = RefundService::new(&state).dispatch(&op.operator, id).await?;
    Ok(ApiResponse::ok(refund))
}

/// POST /project/refunds/:id/complete
async fn complete_refund(
    State(state): State<AppState>,
    op: ProjectOperator,
    Path(id): Path<i64>,
    Json(request): Json<CompleteRefundRequest>,
) -> ApiResult<Refund> {
    let refund = RefundService::new(&state)
        .complete(&op.operator, id, &request)
        .await?;
    Ok(ApiResponse::ok(refund))
}

async fn retry_refund(
    State(state): State<AppState>,
    op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<Refund> {
    let refund = RefundService::new(&state).retry(&op.operator, id).await?;
    Ok(ApiResponse::ok(refund))
}

async fn cancel_refund(
    State(state): State<AppState>,
    op: ProjectOperator,
    Path(id): Path<i64>,
    Json(request): Json<ReasonRequest>,
) -> ApiResult<Refund> {
    let refund = RefundService::new(&state)
        .cancel(&op.operator, id, &request)
        .await?;
    Ok(ApiResponse::with_msg(refund, "退款已取消"))
}
