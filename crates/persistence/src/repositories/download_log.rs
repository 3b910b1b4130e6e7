//! Download log writes.

use domain::models::download::DownloadLog;
use sqlx::PgPool;

use crate::entities::PlatformDb;
use crate::metrics::QueryTimer;

#[derive(Clone)]
pub struct DownloadLogRepository {
    pool: PgPool,
}

impl DownloadLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, log: &DownloadLog) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("insert_download_log");
        let result = sqlx::query(
            r#"
            INSERT INTO download_logs (user_id, app_id, platform, success, ip, user_agent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.user_id)
        .bind(&log.app_id)
        .bind(PlatformDb::from(log.platform))
        .bind(log.success)
        .bind(log.ip.as_deref())
        .bind(log.user_agent.as_deref())
        .bind(log.created_at)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }
}
