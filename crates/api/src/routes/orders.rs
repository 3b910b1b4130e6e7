//! Order endpoints for customers and operators.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use domain::models::order::{ManualProcessRequest, Order, OrderFilter, PlaceOrderRequest};
use domain::models::refund::ReasonRequest;
use serde::Deserialize;
use shared::pagination::{PageRequest, PageResult};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::extractors::{ProjectOperator, WebUser};
use crate::response::{ApiResponse, ApiResult};
use crate::services::OrderService;

/// Body of the batch cancel endpoint.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct BatchCancelRequest {
    #[validate(length(min = 1, max = 200, message = "Select 1-200 orders"))]
    pub ids: Vec<i64>,
    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    pub reason: String,
}

pub fn web_router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_my_orders).post(place_order))
        .route("/orders/:id", get(get_my_order))
        .route("/orders/:id/cancel", post(cancel_my_order))
}

pub fn project_router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders))
        .route("/orders/batch-cancel", post(batch_cancel))
        .route("/orders/manual-process", post(manual_process))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/cancel", post(cancel_order))
}

/// POST /web/orders
async fn place_order(
    State(state): State<AppState>,
    user: WebUser,
    Json(request): Json<PlaceOrderRequest>,
) -> ApiResult<Order> {
    let order = OrderService::new(&state)
        .place_order(user.id(), &request)
        .await?;
    Ok(ApiResponse::with_msg(order, "下单成功"))
}

async fn list_my_orders(
    State(state): State<AppState>,
    user: WebUser,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<Order>> {
    let result = OrderService::new(&state).list_own(user.id(), &page).await?;
    Ok(ApiResponse::ok(result))
}

async fn get_my_order(
    State(state): State<AppState>,
    user: WebUser,
    Path(id): Path<i64>,
) -> ApiResult<Order> {
    let order = OrderService::new(&state).get_own(user.id(), id).await?;
    Ok(ApiResponse::ok(order))
}

async fn cancel_my_order(
    State(state): State<AppState>,
    user: WebUser,
    Path(id): Path<i64>,
) -> ApiResult<Order> {
    let order = OrderService::new(&state).cancel_own(user.id(), id).await?;
    Ok(ApiResponse::with_msg(order, "订单已取消"))
}

/// GET /project/orders
async fn list_orders(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Query(filter): Query<OrderFilter>,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<Order>> {
    let result = OrderService::new(&state).list(&filter, &page).await?;
    Ok(ApiResponse::ok(result))
}

async fn get_order(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<Order> {
    let order = OrderService::new(&state).get(id).await?;
    Ok(ApiResponse::ok(order))
}

/// POST /project/orders/:id/cancel
///
/// Only pending orders can be cancelled.
async fn cancel_order(
    State(state): State<AppState>,
    op: ProjectOperator,
    Path(id): Path<i64>,
    Json(request): Json<ReasonRequest>,
) -> ApiResult<Order> {
    request.validate()?;
    let order = OrderService::new(&state).cancel(id, &request.reason).await?;
    info!(order_no = %order.order_no, operator_id = op.operator.id, "Order cancelled by operator");
    Ok(ApiResponse::with_msg(order, "订单已取消"))
}

/// POST /project/orders/batch-cancel
///
/// All-or-nothing: one non-pending order fails the whole batch.
async fn batch_cancel(
    State(state): State<AppState>,
    op: ProjectOperator,
    Json(request): Json<BatchCancelRequest>,
) -> ApiResult<Vec<Order>> {
    request.validate()?;
    let orders = OrderService::new(&state)
        .batch_cancel(&request.ids, &request.reason)
        .await?;
    info!(count = orders.len(), operator_id = op.operator.id, "Orders batch cancelled");
    Ok(ApiResponse::with_msg(orders, "批量取消成功"))
}

/// POST /project/orders/manual-process
///
/// Requires the operator's TOTP code.
async fn manual_process(
    State(state): State<AppState>,
    op: ProjectOperator,
    Json(request): Json<ManualProcessRequest>,
) -> ApiResult<Order> {
    let order = OrderService::new(&state)
        .manual_process(&op.operator, &request)
        .await?;
    Ok(ApiResponse::with_msg(order, "处理成功"))
}
