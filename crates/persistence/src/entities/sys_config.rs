//! System configuration entity.

use chrono::{DateTime, Utc};
use domain::models::sys_config::SysConfigEntry;
use sqlx::FromRow;

/// Database row mapping for the sys_configs table.
#[derive(Debug, Clone, FromRow)]
pub struct SysConfigEntity {
    pub id: i64,
    pub scope: String,
    pub key: String,
    pub value: String,
    pub updated_at: DateTime<Utc>,
}

impl From<SysConfigEntity> for SysConfigEntry {
    fn from(entity: SysConfigEntity) -> Self {
        Self {
            scope: entity.scope,
            key: entity.key,
            value: entity.value,
        }
    }
}
