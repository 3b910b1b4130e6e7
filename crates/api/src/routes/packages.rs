//! App packages and their plan links (admin).

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use domain::models::app_package::{
    AppPackage, CreatePackageRequest, SetPackagePlansRequest, UpdatePackageRequest,
};

use crate::app::AppState;
use crate::extractors::ProjectOperator;
use crate::response::{ApiResponse, ApiResult};
use crate::services::CatalogService;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/packages", post(create_package))
        .route("/packages/:id", put(update_package).delete(delete_package))
        .route(
            "/packages/:id/plans",
            get(package_plans).put(set_package_plans).post(add_package_plans),
        )
        .route("/applications/:app_id/packages", get(list_packages))
}

/// POST /project/packages
async fn create_package(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Json(request): Json<CreatePackageRequest>,
) -> ApiResult<AppPackage> {
    let package = CatalogService::new(state.pool.clone())
        .create_package(&request)
        .await?;
    Ok(ApiResponse::with_msg(package, "创建成功"))
}

async fn update_package(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
    Json(request): Json<UpdatePackageRequest>,
) -> ApiResult<AppPackage> {
    let package = CatalogService::new(state.pool.clone())
        .update_package(id, &request)
        .await?;
    Ok(ApiResponse::with_msg(package, "更新成功"))
}

/// DELETE /project/packages/:id
///
/// Removes the package together with its plan links.
async fn delete_package(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<()> {
    CatalogService::new(state.pool.clone()).delete_package(id).await?;
    Ok(ApiResponse::with_msg((), "删除成功"))
}

async fn list_packages(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(app_id): Path<String>,
) -> ApiResult<Vec<AppPackage>> {
    let packages = CatalogService::new(state.pool.clone())
        .list_packages(&app_id)
        .await?;
    Ok(ApiResponse::ok(packages))
}

async fn package_plans(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
) -> ApiResult<Vec<i64>> {
    let ids = CatalogService::new(state.pool.clone()).package_plans(id).await?;
    Ok(ApiResponse::ok(ids))
}

/// PUT /project/packages/:id/plans replaces the links.
async fn set_package_plans(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
    Json(request): Json<SetPackagePlansRequest>,
) -> ApiResult<Vec<i64>> {
    let ids = CatalogService::new(state.pool.clone())
        .link_plans(id, &request.plan_ids, true)
        .await?;
    Ok(ApiResponse::ok(ids))
}

/// POST /project/packages/:id/plans adds to the links.
async fn add_package_plans(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(id): Path<i64>,
    Json(request): Json<SetPackagePlansRequest>,
) -> ApiResult<Vec<i64>> {
    let ids = CatalogService::new(state.pool.clone())
        .link_plans(id, &request.plan_ids, false)
        .await?;
    Ok(ApiResponse::ok(ids))
}
