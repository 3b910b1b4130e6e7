//! Application catalog (admin).

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use domain::models::application::{Application, CreateApplicationRequest};
use serde::Deserialize;
use shared::pagination::{PageRequest, PageResult};

use crate::app::AppState;
use crate::extractors::ProjectOperator;
use crate::response::{ApiResponse, ApiResult};
use crate::services::CatalogService;

#[derive(Debug, Default, Deserialize)]
pub struct ApplicationQuery {
    pub keyword: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/applications", get(list_applications).post(create_application))
        .route("/applications/:app_id", get(get_application))
}

async fn list_applications(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Query(query): Query<ApplicationQuery>,
    Query(page): Query<PageRequest>,
) -> ApiResult<PageResult<Application>> {
    let result = CatalogService::new(state.pool.clone())
        .list_applications(query.keyword.as_deref(), &page)
        .await?;
    Ok(ApiResponse::ok(result))
}

/// POST /project/applications
///
/// A category with a parent is stored as `(parent, leaf)`.
async fn create_application(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Json(request): Json<CreateApplicationRequest>,
) -> ApiResult<Application> {
    let app = CatalogService::new(state.pool.clone())
        .create_application(&request)
        .await?;
    Ok(ApiResponse::with_msg(app, "创建成功"))
}

async fn get_application(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Path(app_id): Path<String>,
) -> ApiResult<Application> {
    let app = CatalogService::new(state.pool.clone())
        .get_application(&app_id)
        .await?;
    Ok(ApiResponse::ok(app))
}
