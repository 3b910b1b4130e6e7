//! Runtime configuration rows, grouped by scope.

use std::collections::HashMap;

use sqlx::PgPool;

use crate::entities::SysConfigEntity;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct SysConfigRepository {
    pool: PgPool,
}

impl SysConfigRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, scope: &str, key: &str) -> Result<Option<String>, sqlx::Error> {
        let timer = QueryTimer::new("get_sys_config");
        let result = sqlx::query_scalar::<_, String>(
            "SELECT value FROM sys_configs WHERE scope = $1 AND key = $2",
        )
        .bind(scope)
        .bind(key)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// All keys of a scope as a map.
    pub async fn scope_map(&self, scope: &str) -> Result<HashMap<String, String>, sqlx::Error> {
        let timer = QueryTimer::new("get_sys_config_scope");
        let result = sqlx::query_as::<_, (String, String)>(
            "SELECT key, value FROM sys_configs WHERE scope = $1",
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result.map(|rows| rows.into_iter().collect())
    }

    pub async fn list(&self, scope: Option<&str>) -> Result<Vec<SysConfigEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_sys_configs");
        let result = sqlx::query_as::<_, SysConfigEntity>(
            r#"
            SELECT id, scope, key, value, updated_at
            FROM sys_configs
            WHERE ($1::TEXT IS NULL OR scope = $1)
            ORDER BY scope, key
            "#,
        )
        .bind(scope)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn upsert(&self, scope: &str, key: &str, value: &str) -> Result<SysConfigEntity, sqlx::Error> {
        let timer = QueryTimer::new("upsert_sys_config");
        let result = sqlx::query_as::<_, SysConfigEntity>(
            r#"
            INSERT INTO sys_configs (scope, key, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (scope, key) DO UPDATE SET value = EXCLUDED.value, updated_at = NOW()
            RETURNING id, scope, key, value, updated_at
            "#,
        )
        .bind(scope)
        .bind(key)
        .bind(value)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
