//! Shared app-account pool (admin).
//!
//! Credentials are sealed and opened inside the repository; handlers only
//! ever see cleartext.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use domain::models::app_account::{AppAccount, CreateAppAccountRequest, UpdateAppAccountRequest};
use persistence::repositories::{AppAccountFilter, AppAccountRepository};
use serde::Deserialize;
use shared::pagination::{PageRequest, PageResult};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ProjectOperator;
use crate::response::{ApiResponse, ApiResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellRequest {
    pub app_id: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/app-accounts", get(list_accounts).post(create_account))
        .route("/app-accounts/sell", post(sell_account))
        .route("/app-accounts/:id", get(get_account).put(update_account))
}

fn repo(state: &AppState) -> AppAccountRepository {
    AppAccountRepository::new(state.pool.clone(), state.cipher.clone())
}

/// POST /project/app-accounts
async fn create_account(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Json(request): Json<CreateAppAccountRequest>,
) -> ApiResult<AppAccount> {
    request.validate()?;
    let account = repo(&state).create(&request).await?;
    info!(account_id = account.id, account_no = %account.account_no, app_id = %account.app_id, "App account created");
    Ok(ApiResponse::with_msg(account, "创建成功"))
}

async fn list_accounts(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Query(filter): Query<AppAccountFilter>,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<AppAccount>> {
    let (accounts, total) = repo(&state).list(&filter, &page).await?;
    Ok(ApiResponse::ok(PageResult::new(accounts, total, &page)))
}

async fn get_account(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<AppAccount> {
    let account = repo(&state)
        .find_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("App account {} not found", id)))?;
    Ok(ApiResponse::ok(account))
}

/// PUT /project/app-accounts/:id
///
/// Sold accounts are immutable.
async fn update_account(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
    Json(request): Json<UpdateAppAccountRequest>,
) -> ApiResult<AppAccount> {
    request.validate()?;
    let account = repo(&state)
        .update(id, &request)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("App account {} not found", id)))?;
    Ok(ApiResponse::with_msg(account, "更新成功"))
}

/// POST /project/app-accounts/sell
///
/// Takes one `normal` account for the app out of the pool.
async fn sell_account(
    State(state): State<AppState>,
    op: ProjectOperator,
    Json(request): Json<SellRequest>,
) -> ApiResult<AppAccount> {
    let account = repo(&state)
        .sell(&request.app_id)
        .await?
        .ok_or_else(|| {
            ApiError::PreconditionFailed(format!("No account available for {}", request.app_id))
        })?;
    info!(
        account_no = %account.account_no,
        app_id = %account.app_id,
        operator_id = op.operator.id,
        "App account sold"
    );
    Ok(ApiResponse::ok(account))
}
