//! Customer download endpoint.

use axum::{
    extract::{Query, State},
    routing::get,
    Router,
};
use domain::models::download::{DownloadDecision, DownloadQuery};

use crate::app::AppState;
use crate::extractors::{ClientMeta, WebUser};
use crate::response::{ApiResponse, ApiResult};
use crate::services::DownloadService;

pub fn router() -> Router<AppState> {
    Router::new().route("/download", get(download))
}

/// GET /web/download?appId=...&platform=...
///
/// A denial is still a successful response; the decision carries the reason.
async fn download(
    State(state): State<AppState>,
    user: WebUser,
    client: ClientMeta,
    Query(query): Query<DownloadQuery>,
) -> ApiResult<DownloadDecision> {
    let decision = DownloadService::new(&state)
        .decide(user.id(), &query.app_id, query.platform, &client)
        .await?;
    Ok(ApiResponse::ok(decision))
}
