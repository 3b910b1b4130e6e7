//! Withdrawal requests and their review.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use domain::models::refund::ReasonRequest;
use domain::models::withdraw::{WithdrawFilter, WithdrawRecord, WithdrawRequest};
use shared::pagination::{PageRequest, PageResult};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::extractors::{ProjectOperator, WebUser};
use crate::response::{ApiResponse, ApiResult};
use crate::services::WithdrawService;

pub fn web_router() -> Router<AppState> {
    Router::new()
        .route("/withdrawals", get(list_my_withdrawals).post(request_withdrawal))
        .route("/withdrawals/:id/cancel", post(cancel_my_withdrawal))
}

pub fn project_router() -> Router<AppState> {
    Router::new()
        .route("/withdrawals", get(list_withdrawals))
        .route("/withdrawals/:id/approve", post(approve_withdrawal))
        .route("/withdrawals/:id/complete", post(complete_withdrawal))
        .route("/withdrawals/:id/reject", post(reject_withdrawal))
}

fn service(state: &AppState) -> WithdrawService {
    WithdrawService::new(state.pool.clone(), state.calendar)
}

/// POST /web/withdrawals
///
/// Freezes the amount until the request is completed, rejected or cancelled.
async fn request_withdrawal(
    State(state): State<AppState>,
    user: WebUser,
    Json(request): Json<WithdrawRequest>,
) -> ApiResult<WithdrawRecord> {
    let record = service(&state).request(user.id(), &request).await?;
    Ok(ApiResponse::with_msg(record, "提现申请已提交"))
}

async fn list_my_withdrawals(
    State(state): State<AppState>,
    user: WebUser,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<WithdrawRecord>> {
    let result = service(&state).list_own(user.id(), &page).await?;
    Ok(ApiResponse::ok(result))
}

async fn cancel_my_withdrawal(
    State(state): State<AppState>,
    user: WebUser,
    Path(id): Path<i64>,
) -> ApiResult<WithdrawRecord> {
    let record = service(&state).cancel_own(user.id(), id).await?;
    Ok(ApiResponse::with_msg(record, "提现已取消"))
}

async fn list_withdrawals(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Query(filter): Query<WithdrawFilter>,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<WithdrawRecord>> {
    let result = service(&state).list(&filter, &page).await?;
    Ok(ApiResponse::ok(result))
}

async fn approve_withdrawal(
    State(state): State<AppState>,
    op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<WithdrawRecord> {
    let record = service(&state).approve(id).await?;
    info!(withdraw_no = %record.withdraw_no, operator_id = op.operator.id, "Withdrawal reviewed");
    Ok(ApiResponse::ok(record))
}

async fn complete_withdrawal(
    State(state): State<AppState>,
    op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<WithdrawRecord> {
    let record = service(&state).complete(id).await?;
    info!(withdraw_no = %record.withdraw_no, operator_id = op.operator.id, "Withdrawal paid out");
    Ok(ApiResponse::ok(record))
}

async fn reject_withdrawal(
    State(state): State<AppState>,
    op: ProjectOperator,
    Path(id): Path<i64>,
    Json(request): Json<ReasonRequest>,
) -> ApiResult<WithdrawRecord> {
    request.validate()?;
    let record = service(&state).reject(id, &request.reason).await?;
    info!(withdraw_no = %record.withdraw_no, operator_id = op.operator.id, "Withdrawal rejected by operator");
    Ok(ApiResponse::ok(record))
}
