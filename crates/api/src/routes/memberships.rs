//! Customer view of their memberships.

use axum::{extract::State, routing::get, Router};
use domain::models::user_membership::MembershipSummary;

use crate::app::AppState;
use crate::extractors::WebUser;
use crate::response::{ApiResponse, ApiResult};
use crate::services::MembershipService;

pub fn router() -> Router<AppState> {
    Router::new().route("/memberships", get(list_my_memberships))
}

/// GET /web/memberships
///
/// Effective memberships with today's remaining quota.
async fn list_my_memberships(
    State(state): State<AppState>,
    user: WebUser,
) -> ApiResult<Vec<MembershipSummary>> {
    let summaries = MembershipService::new(state.pool.clone(), state.calendar)
        .summaries(user.id())
        .await?;
    Ok(ApiResponse::ok(summaries))
}
