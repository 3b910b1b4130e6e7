//! Commission ledger repository: accounts, flows, details and tiers.
//!
//! Every balance change goes through [`CommissionRepository::lock_account`]
//! inside a transaction and is written back together with its flow rows.

use chrono::{DateTime, Utc};
use domain::models::commission::{CommissionAccount, FlowDraft, FlowLinks, TierRequest};
use domain::models::order::Order;
use domain::services::commission::CommissionEmission;
use shared::pagination::PageRequest;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::entities::{
    AccountFlowEntity, BalanceKindDb, CommissionAccountEntity, CommissionDetailEntity,
    CommissionTierEntity, DetailStatusDb, FlowTypeDb,
};
use crate::metrics::QueryTimer;

macro_rules! detail_columns {
    () => {
        "id, user_id, order_id, order_no, order_user_id, order_amount, commission_rate, commission, \
         tier_id, tier_name, status, settle_time, voided_at, created_at"
    };
}

macro_rules! flow_columns {
    () => {
        "id, user_id, flow_no, flow_type, balance_kind, amount, balance_before, balance_after, \
         order_id, withdraw_id, refund_id, remark, created_at"
    };
}

#[derive(Clone)]
pub struct CommissionRepository {
    pool: PgPool,
}

impl CommissionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Locks the user's commission account, creating an empty one first if needed.
    pub async fn lock_account(&self, conn: &mut PgConnection, user_id: i64) -> Result<CommissionAccountEntity, sqlx::Error> {
        let timer = QueryTimer::new("lock_commission_account");
        sqlx::query("INSERT INTO commission_accounts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&mut *conn)
            .await?;
        let result = sqlx::query_as::<_, CommissionAccountEntity>(
            r#"
            SELECT id, user_id, available, frozen, total_earnings, withdrawn
            FROM commission_accounts
            WHERE user_id = $1
            FOR UPDATE
            "#,
        )
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn find_account(&self, user_id: i64) -> Result<Option<CommissionAccountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_commission_account");
        let result = sqlx::query_as::<_, CommissionAccountEntity>(
            "SELECT id, user_id, available, frozen, total_earnings, withdrawn FROM commission_accounts WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn save_account(&self, conn: &mut PgConnection, account: &CommissionAccount) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("save_commission_account");
        let result = sqlx::query(
            r#"
            UPDATE commission_accounts
            SET available = $2, frozen = $3, total_earnings = $4, withdrawn = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(account.available)
        .bind(account.frozen)
        .bind(account.total_earnings)
        .bind(account.withdrawn)
        .execute(&mut *conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Appends one ledger row.
    pub async fn insert_flow(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        draft: &FlowDraft,
        links: FlowLinks,
        remark: Option<&str>,
    ) -> Result<AccountFlowEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_account_flow");
        let result = sqlx::query_as::<_, AccountFlowEntity>(concat!(
            "INSERT INTO account_flows (user_id, flow_no, flow_type, balance_kind, amount, balance_before, \
             balance_after, order_id, withdraw_id, refund_id, remark) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING ",
            flow_columns!()
        ))
        .bind(user_id)
        .bind(shared::numbering::flow_no(Utc::now()))
        .bind(FlowTypeDb::from(draft.flow_type))
        .bind(BalanceKindDb::from(draft.balance_kind))
        .bind(draft.amount)
        .bind(draft.balance_before)
        .bind(draft.balance_after)
        .bind(links.order_id)
        .bind(links.withdraw_id)
        .bind(links.refund_id)
        .bind(remark)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Records a referrer's commission on an order. Returns None if one already exists.
    pub async fn insert_detail(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        emission: &CommissionEmission,
        now: DateTime<Utc>,
    ) -> Result<Option<CommissionDetailEntity>, sqlx::Error> {
        let timer = QueryTimer::new("insert_commission_detail");
        let result = sqlx::query_as::<_, CommissionDetailEntity>(concat!(
            "INSERT INTO commission_details (user_id, order_id, order_no, order_user_id, order_amount, \
             commission_rate, commission, tier_id, tier_name, status, settle_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, \
                     CASE WHEN $10 = 'settled'::detail_status THEN $11 END) \
             ON CONFLICT ON CONSTRAINT ux_commission_details_recipient_order DO NOTHING RETURNING ",
            detail_columns!()
        ))
        .bind(emission.recipient_id)
        .bind(order.id)
        .bind(&order.order_no)
        .bind(order.user_id)
        .bind(order.final_amount)
        .bind(emission.rate)
        .bind(emission.commission)
        .bind(emission.tier_id)
        .bind(&emission.tier_name)
        .bind(DetailStatusDb::from(emission.detail_status))
        .bind(now)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Locks the live (not voided) commission details of an order.
    pub async fn lock_details_for_order(
        &self,
        conn: &mut PgConnection,
        order_id: i64,
    ) -> Result<Vec<CommissionDetailEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_commission_details_for_order");
        let result = sqlx::query_as::<_, CommissionDetailEntity>(concat!(
            "SELECT ",
            detail_columns!(),
            " FROM commission_details WHERE order_id = $1 AND voided_at IS NULL ORDER BY id FOR UPDATE"
        ))
        .bind(order_id)
        .fetch_all(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Marks a detail as voided by a refund.
    pub async fn void_detail(&self, conn: &mut PgConnection, id: i64, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("void_commission_detail");
        let result = sqlx::query(
            "UPDATE commission_details SET status = 'frozen', voided_at = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Ids of unvoided pending or frozen details created before `before`.
    pub async fn due_detail_ids(&self, before: DateTime<Utc>, limit: i64) -> Result<Vec<i64>, sqlx::Error> {
        let timer = QueryTimer::new("due_commission_details");
        let result = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM commission_details
            WHERE status IN ('pending', 'frozen') AND voided_at IS NULL AND created_at <= $1
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(before)
        .bind(limit)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn lock_detail(&self, conn: &mut PgConnection, id: i64) -> Result<Option<CommissionDetailEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_commission_detail");
        let result = sqlx::query_as::<_, CommissionDetailEntity>(concat!(
            "SELECT ",
            detail_columns!(),
            " FROM commission_details WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn mark_settled(&self, conn: &mut PgConnection, id: i64, now: DateTime<Utc>) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("mark_commission_settled");
        let result = sqlx::query(
            "UPDATE commission_details SET status = 'settled', settle_time = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(&mut *conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn list_details(&self, user_id: i64, page: &PageRequest) -> Result<(Vec<CommissionDetailEntity>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_commission_details");
        let rows = sqlx::query_as::<_, CommissionDetailEntity>(concat!(
            "SELECT ",
            detail_columns!(),
            " FROM commission_details WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM commission_details WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        timer.record();
        Ok((rows, total))
    }

    pub async fn list_flows(&self, user_id: i64, page: &PageRequest) -> Result<(Vec<AccountFlowEntity>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_account_flows");
        let rows = sqlx::query_as::<_, AccountFlowEntity>(concat!(
            "SELECT ",
            flow_columns!(),
            " FROM account_flows WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(user_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM account_flows WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        timer.record();
        Ok((rows, total))
    }

    pub async fn list_tiers<'e, E>(&self, executor: E) -> Result<Vec<CommissionTierEntity>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let timer = QueryTimer::new("list_commission_tiers");
        let result = sqlx::query_as::<_, CommissionTierEntity>(
            "SELECT id, name, min_subordinates, rate, sort, status FROM commission_tiers ORDER BY min_subordinates",
        )
        .fetch_all(executor)
        .await;
        timer.record();
        result
    }

    /// Serializes tier edits so the set can be validated as a whole.
    pub async fn lock_tiers(&self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        sqlx::query("LOCK TABLE commission_tiers IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *conn)
            .await
            .map(|_| ())
    }

    pub async fn insert_tier(&self, conn: &mut PgConnection, tier: &TierRequest) -> Result<CommissionTierEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_commission_tier");
        let result = sqlx::query_as::<_, CommissionTierEntity>(
            r#"
            INSERT INTO commission_tiers (name, min_subordinates, rate, sort, status)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, min_subordinates, rate, sort, status
            "#,
        )
        .bind(&tier.name)
        .bind(tier.min_subordinates)
        .bind(tier.rate)
        .bind(tier.sort)
        .bind(tier.status)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn update_tier(
        &self,
        conn: &mut PgConnection,
        id: i64,
        tier: &TierRequest,
    ) -> Result<Option<CommissionTierEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_commission_tier");
        let result = sqlx::query_as::<_, CommissionTierEntity>(
            r#"
            UPDATE commission_tiers
            SET name = $2, min_subordinates = $3, rate = $4, sort = $5, status = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, min_subordinates, rate, sort, status
            "#,
        )
        .bind(id)
        .bind(&tier.name)
        .bind(tier.min_subordinates)
        .bind(tier.rate)
        .bind(tier.sort)
        .bind(tier.status)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    pub async fn delete_tier(&self, conn: &mut PgConnection, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_commission_tier");
        let result = sqlx::query("DELETE FROM commission_tiers WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }
}
