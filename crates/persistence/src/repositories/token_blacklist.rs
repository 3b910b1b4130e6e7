//! Revoked `x-token` identifiers.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct TokenBlacklistRepository {
    pool: PgPool,
}

impl TokenBlacklistRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Revokes `jti` until the token would have expired anyway.
    pub async fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("revoke_token");
        let result = sqlx::query(
            "INSERT INTO jwt_blacklist (jti, expires_at) VALUES ($1, $2) ON CONFLICT (jti) DO NOTHING",
        )
        .bind(jti)
        .bind(expires_at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn is_revoked(&self, jti: &str) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("is_token_revoked");
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM jwt_blacklist WHERE jti = $1 AND expires_at > NOW())",
        )
        .bind(jti)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Deletes entries for tokens that have expired. Returns the count removed.
    pub async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("purge_expired_tokens");
        let result = sqlx::query("DELETE FROM jwt_blacklist WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }
}
