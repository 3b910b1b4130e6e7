//! Withdrawal record repository.

use chrono::{DateTime, Utc};
use domain::models::withdraw::{WithdrawFilter, WithdrawQuote, WithdrawRecord, WithdrawRequest};
use shared::pagination::PageRequest;
use sqlx::{PgConnection, PgPool};

use crate::entities::{WithdrawRecordEntity, WithdrawStatusDb, WithdrawTypeDb};
use crate::metrics::QueryTimer;

macro_rules! withdraw_columns {
    () => {
        "id, user_id, withdraw_no, amount, fee, actual_amount, withdraw_type, account_name, account_no, \
         status, reject_reason, audit_time, complete_time, created_at, updated_at"
    };
}

#[derive(Clone)]
pub struct WithdrawRepository {
    pool: PgPool,
}

impl WithdrawRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        withdraw_no: &str,
        quote: &WithdrawQuote,
        request: &WithdrawRequest,
    ) -> Result<WithdrawRecordEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_withdraw");
        let result = sqlx::query_as::<_, WithdrawRecordEntity>(concat!(
            "INSERT INTO withdraw_records (user_id, withdraw_no, amount, fee, actual_amount, withdraw_type, \
             account_name, account_no) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING ",
            withdraw_columns!()
        ))
        .bind(user_id)
        .bind(withdraw_no)
        .bind(quote.amount)
        .bind(quote.fee)
        .bind(quote.actual_amount)
        .bind(WithdrawTypeDb::from(request.withdraw_type))
        .bind(&request.account_name)
        .bind(&request.account_no)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<WithdrawRecordEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_withdraw_by_id");
        let result = sqlx::query_as::<_, WithdrawRecordEntity>(concat!(
            "SELECT ",
            withdraw_columns!(),
            " FROM withdraw_records WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn lock(&self, conn: &mut PgConnection, id: i64) -> Result<Option<WithdrawRecordEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_withdraw");
        let result = sqlx::query_as::<_, WithdrawRecordEntity>(concat!(
            "SELECT ",
            withdraw_columns!(),
            " FROM withdraw_records WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Requests since `since` that count toward the daily cap.
    pub async fn count_since(&self, conn: &mut PgConnection, user_id: i64, since: DateTime<Utc>) -> Result<i64, sqlx::Error> {
        let timer = QueryTimer::new("count_withdraws_since");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM withdraw_records
            WHERE user_id = $1 AND created_at >= $2 AND status IN ('pending', 'approved', 'completed')
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn save(&self, conn: &mut PgConnection, record: &WithdrawRecord) -> Result<WithdrawRecordEntity, sqlx::Error> {
        let timer = QueryTimer::new("save_withdraw");
        let result = sqlx::query_as::<_, WithdrawRecordEntity>(concat!(
            "UPDATE withdraw_records SET status = $2, reject_reason = $3, audit_time = $4, complete_time = $5, \
             updated_at = NOW() WHERE id = $1 RETURNING ",
            withdraw_columns!()
        ))
        .bind(record.id)
        .bind(WithdrawStatusDb::from(record.status))
        .bind(record.reject_reason.as_deref())
        .bind(record.audit_time)
        .bind(record.complete_time)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn list(&self, filter: &WithdrawFilter, page: &PageRequest) -> Result<(Vec<WithdrawRecordEntity>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_withdraws");
        let status = filter.status.map(WithdrawStatusDb::from);
        let rows = sqlx::query_as::<_, WithdrawRecordEntity>(concat!(
            "SELECT ",
            withdraw_columns!(),
            " FROM withdraw_records WHERE ($1::withdraw_status IS NULL OR status = $1) \
             AND ($2::BIGINT IS NULL OR user_id = $2) \
             AND ($3::TEXT IS NULL OR withdraw_no = $3) \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        ))
        .bind(status)
        .bind(filter.user_id)
        .bind(filter.withdraw_no.as_deref())
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM withdraw_records
            WHERE ($1::withdraw_status IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR user_id = $2)
              AND ($3::TEXT IS NULL OR withdraw_no = $3)
            "#,
        )
        .bind(status)
        .bind(filter.user_id)
        .bind(filter.withdraw_no.as_deref())
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok((rows, total))
    }
}
