//! Order repository.

use chrono::{DateTime, Utc};
use domain::models::order::{NewOrder, OrderFilter, OrderStatus};
use shared::pagination::PageRequest;
use sqlx::{PgConnection, PgPool};

use crate::entities::{OrderEntity, OrderStatusDb, OrderTypeDb, PlatformDb};
use crate::metrics::QueryTimer;

/// Partial unique index allowing one pending upgrade per membership.
pub const PENDING_UPGRADE_CONSTRAINT: &str = "ux_orders_pending_upgrade";

macro_rules! order_columns {
    () => {
        "id, order_no, user_id, plan_id, plan_code, plan_name, platform, order_type, original_price, \
         discount_amount, upgrade_credit, final_amount, currency, payment_method, payment_id, status, \
         fail_reason, paid_at, expires_at, previous_membership_id, metadata, created_at, updated_at"
    };
}

#[derive(Clone)]
pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, order: &NewOrder) -> Result<OrderEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_order");
        let result = sqlx::query_as::<_, OrderEntity>(concat!(
            "INSERT INTO orders (order_no, user_id, plan_id, plan_code, plan_name, platform, order_type, \
             original_price, discount_amount, upgrade_credit, final_amount, currency, payment_method, \
             expires_at, previous_membership_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) RETURNING ",
            order_columns!()
        ))
        .bind(&order.order_no)
        .bind(order.user_id)
        .bind(order.plan_id)
        .bind(&order.plan_code)
        .bind(&order.plan_name)
        .bind(PlatformDb::from(order.platform))
        .bind(OrderTypeDb::from(order.order_type))
        .bind(order.original_price)
        .bind(order.discount_amount)
        .bind(order.upgrade_credit)
        .bind(order.final_amount)
        .bind(&order.currency)
        .bind(order.payment_method.as_deref())
        .bind(order.expires_at)
        .bind(order.previous_membership_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<OrderEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_order_by_id");
        let result = sqlx::query_as::<_, OrderEntity>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn lock(&self, conn: &mut PgConnection, id: i64) -> Result<Option<OrderEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_order");
        let result = sqlx::query_as::<_, OrderEntity>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn lock_by_no(&self, conn: &mut PgConnection, order_no: &str) -> Result<Option<OrderEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_order_by_no");
        let result = sqlx::query_as::<_, OrderEntity>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE order_no = $1 FOR UPDATE"
        ))
        .bind(order_no)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Locks several orders in id order.
    pub async fn lock_many(&self, conn: &mut PgConnection, ids: &[i64]) -> Result<Vec<OrderEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_orders");
        let result = sqlx::query_as::<_, OrderEntity>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE id = ANY($1) ORDER BY id FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn mark_paid(
        &self,
        conn: &mut PgConnection,
        id: i64,
        payment_id: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<OrderEntity, sqlx::Error> {
        let timer = QueryTimer::new("mark_order_paid");
        let result = sqlx::query_as::<_, OrderEntity>(concat!(
            "UPDATE orders SET status = 'paid', payment_id = $2, paid_at = $3, fail_reason = NULL, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(payment_id)
        .bind(paid_at)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Moves a pending order to a terminal failure state with a reason.
    pub async fn close_pending(
        &self,
        conn: &mut PgConnection,
        id: i64,
        status: OrderStatus,
        reason: &str,
    ) -> Result<OrderEntity, sqlx::Error> {
        let timer = QueryTimer::new("close_pending_order");
        let result = sqlx::query_as::<_, OrderEntity>(concat!(
            "UPDATE orders SET status = $2, fail_reason = $3, updated_at = NOW() \
             WHERE id = $1 AND status = 'pending' RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(OrderStatusDb::from(status))
        .bind(reason)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Toggles a settled order between `paid` and `refunded`.
    pub async fn set_refund_state(
        &self,
        conn: &mut PgConnection,
        id: i64,
        status: OrderStatus,
    ) -> Result<OrderEntity, sqlx::Error> {
        let timer = QueryTimer::new("set_order_refund_state");
        let result = sqlx::query_as::<_, OrderEntity>(concat!(
            "UPDATE orders SET status = $2, updated_at = NOW() \
             WHERE id = $1 AND status IN ('paid', 'refunded') RETURNING ",
            order_columns!()
        ))
        .bind(id)
        .bind(OrderStatusDb::from(status))
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn list(&self, filter: &OrderFilter, page: &PageRequest) -> Result<(Vec<OrderEntity>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_orders");
        let status = filter.status.map(OrderStatusDb::from);
        let rows = sqlx::query_as::<_, OrderEntity>(concat!(
            "SELECT ",
            order_columns!(),
            " FROM orders WHERE ($1::order_status IS NULL OR status = $1) \
             AND ($2::BIGINT IS NULL OR user_id = $2) \
             AND ($3::TEXT IS NULL OR order_no = $3) \
             AND ($4::TIMESTAMPTZ IS NULL OR created_at >= $4) \
             AND ($5::TIMESTAMPTZ IS NULL OR created_at <= $5) \
             ORDER BY created_at DESC, id DESC LIMIT $6 OFFSET $7"
        ))
        .bind(status)
        .bind(filter.user_id)
        .bind(filter.order_no.as_deref())
        .bind(filter.created_from)
        .bind(filter.created_to)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM orders
            WHERE ($1::order_status IS NULL OR status = $1)
              AND ($2::BIGINT IS NULL OR user_id = $2)
              AND ($3::TEXT IS NULL OR order_no = $3)
              AND ($4::TIMESTAMPTZ IS NULL OR created_at >= $4)
              AND ($5::TIMESTAMPTZ IS NULL OR created_at <= $5)
            "#,
        )
        .bind(status)
        .bind(filter.user_id)
        .bind(filter.order_no.as_deref())
        .bind(filter.created_from)
        .bind(filter.created_to)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok((rows, total))
    }

    /// Pending orders past their expiry, oldest first.
    pub async fn find_expired_pending(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<i64>, sqlx::Error> {
        let timer = QueryTimer::new("find_expired_pending_orders");
        let result = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM orders WHERE status = 'pending' AND expires_at < $1 ORDER BY expires_at LIMIT $2",
        )
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
