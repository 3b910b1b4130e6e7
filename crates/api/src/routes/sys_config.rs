//! Runtime tunables stored in `sys_configs`.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use domain::models::sys_config::{CommissionSettings, SysConfigEntry, SCOPE_COMMISSION};
use persistence::repositories::SysConfigRepository;
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::extractors::ProjectOperator;
use crate::response::{ApiResponse, ApiResult};

#[derive(Debug, Default, Deserialize)]
pub struct ScopeQuery {
    pub scope: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/sys-config", get(list_entries).put(upsert_entry))
}

async fn list_entries(
    State(state): State<AppState>,
    _op: ProjectOperator,
    Query(query): Query<ScopeQuery>,
) -> ApiResult<Vec<SysConfigEntry>> {
    let entries = SysConfigRepository::new(state.pool.clone())
        .list(query.scope.as_deref())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(ApiResponse::ok(entries))
}

/// PUT /project/sys-config
///
/// Commission values are parsed before they are stored, so a typo cannot
/// break emission or withdrawals later.
async fn upsert_entry(
    State(state): State<AppState>,
    op: ProjectOperator,
    Json(entry): Json<SysConfigEntry>,
) -> ApiResult<SysConfigEntry> {
    entry.validate()?;
    let repo = SysConfigRepository::new(state.pool.clone());

    if entry.scope == SCOPE_COMMISSION {
        let mut values = repo.scope_map(SCOPE_COMMISSION).await?;
        values.insert(entry.key.clone(), entry.value.clone());
        CommissionSettings::from_entries(&values)?;
    }

    let saved: SysConfigEntry = repo.upsert(&entry.scope, &entry.key, &entry.value).await?.into();
    info!(scope = %saved.scope, key = %saved.key, operator_id = op.operator.id, "Config entry updated");
    Ok(ApiResponse::with_msg(saved, "保存成功"))
}
