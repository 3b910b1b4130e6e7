//! Refund repository.

use domain::models::refund::{Refund, RefundStatus, RefundType};
use rust_decimal::Decimal;
use shared::pagination::PageRequest;
use sqlx::{PgConnection, PgPool};

use crate::entities::{RefundEntity, RefundStatusDb, RefundTypeDb};
use crate::metrics::QueryTimer;

macro_rules! refund_columns {
    () => {
        "id, refund_no, order_id, refund_amount, refund_type, reason, status, third_party_refund_id, \
         operator_id, operator_name, processed_at, completed_at, failure_reason, created_at, updated_at"
    };
}

/// Input for a new refund row.
#[derive(Debug, Clone)]
pub struct NewRefund<'a> {
    pub refund_no: &'a str,
    pub order_id: i64,
    pub amount: Decimal,
    pub refund_type: RefundType,
    pub reason: &'a str,
    pub status: RefundStatus,
    pub operator_id: Option<i64>,
    pub operator_name: Option<&'a str>,
}

/// Name of the partial unique index guarding one in-flight refund per order.
pub const IN_FLIGHT_INDEX: &str = "ux_refunds_in_flight";

#[derive(Clone)]
pub struct RefundRepository {
    pool: PgPool,
}

impl RefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, conn: &mut PgConnection, refund: &NewRefund<'_>) -> Result<RefundEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_refund");
        let result = sqlx::query_as::<_, RefundEntity>(concat!(
            "INSERT INTO refunds (refund_no, order_id, refund_amount, refund_type, reason, status, \
             operator_id, operator_name, processed_at, completed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, \
                     CASE WHEN $6 = 'success'::refund_status THEN NOW() END, \
                     CASE WHEN $6 = 'success'::refund_status THEN NOW() END) RETURNING ",
            refund_columns!()
        ))
        .bind(refund.refund_no)
        .bind(refund.order_id)
        .bind(refund.amount)
        .bind(RefundTypeDb::from(refund.refund_type))
        .bind(refund.reason)
        .bind(RefundStatusDb::from(refund.status))
        .bind(refund.operator_id)
        .bind(refund.operator_name)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<RefundEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_refund_by_id");
        let result = sqlx::query_as::<_, RefundEntity>(concat!(
            "SELECT ",
            refund_columns!(),
            " FROM refunds WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn lock(&self, conn: &mut PgConnection, id: i64) -> Result<Option<RefundEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_refund");
        let result = sqlx::query_as::<_, RefundEntity>(concat!(
            "SELECT ",
            refund_columns!(),
            " FROM refunds WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Whether the order has a pending or processing refund.
    pub async fn has_in_flight(&self, conn: &mut PgConnection, order_id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("has_in_flight_refund");
        let result = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM refunds WHERE order_id = $1 AND status IN ('pending', 'processing'))",
        )
        .bind(order_id)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Writes back the mutable fields of a refund.
    pub async fn save(&self, conn: &mut PgConnection, refund: &Refund) -> Result<RefundEntity, sqlx::Error> {
        let timer = QueryTimer::new("save_refund");
        let result = sqlx::query_as::<_, RefundEntity>(concat!(
            "UPDATE refunds SET status = $2, reason = $3, third_party_refund_id = $4, operator_id = $5, \
             operator_name = $6, processed_at = $7, completed_at = $8, failure_reason = $9, updated_at = NOW() \
             WHERE id = $1 RETURNING ",
            refund_columns!()
        ))
        .bind(refund.id)
        .bind(RefundStatusDb::from(refund.status))
        .bind(refund.reason.as_deref())
        .bind(refund.third_party_refund_id.as_deref())
        .bind(refund.operator_id)
        .bind(refund.operator_name.as_deref())
        .bind(refund.processed_at)
        .bind(refund.completed_at)
        .bind(refund.failure_reason.as_deref())
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn list(
        &self,
        status: Option<RefundStatus>,
        order_id: Option<i64>,
        page: &PageRequest,
    ) -> Result<(Vec<RefundEntity>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_refunds");
        let status = status.map(RefundStatusDb::from);
        let rows = sqlx::query_as::<_, RefundEntity>(concat!(
            "SELECT ",
            refund_columns!(),
            " FROM refunds WHERE ($1::refund_status IS NULL OR status = $1) \
             AND ($2::BIGINT IS NULL OR order_id = $2) \
             ORDER BY id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(status)
        .bind(order_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM refunds WHERE ($1::refund_status IS NULL OR status = $1) \
             AND ($2::BIGINT IS NULL OR order_id = $2)",
        )
        .bind(status)
        .bind(order_id)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok((rows, total))
    }
}
