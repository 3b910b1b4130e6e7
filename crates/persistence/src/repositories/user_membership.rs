//! User membership repository.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use domain::models::membership_plan::MembershipPlan;
use domain::models::user_membership::{MembershipWithPlan, NewMembership, UserMembership};
use sqlx::{PgConnection, PgPool};

use crate::entities::{MembershipPlanEntity, MembershipStatusDb, UserMembershipEntity};
use crate::metrics::QueryTimer;

macro_rules! membership_columns {
    () => {
        "id, user_id, order_id, plan_id, plan_code, plan_name, status, start_date, end_date, \
         download_used_daily, download_used_monthly, last_reset_daily, last_reset_monthly, \
         replaced_by, created_at, updated_at"
    };
}

#[derive(Clone)]
pub struct UserMembershipRepository {
    pool: PgPool,
}

impl UserMembershipRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Effective memberships with their plans, lifetime first then by end date descending.
    pub async fn find_effective_with_plans(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<MembershipWithPlan>, sqlx::Error> {
        let timer = QueryTimer::new("find_effective_memberships");
        let memberships = sqlx::query_as::<_, UserMembershipEntity>(concat!(
            "SELECT ",
            membership_columns!(),
            " FROM user_memberships \
             WHERE user_id = $1 AND status = 'active' AND (end_date IS NULL OR end_date > $2) \
             ORDER BY end_date DESC NULLS FIRST, id DESC"
        ))
        .bind(user_id)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut plan_ids: Vec<i64> = memberships.iter().map(|m| m.plan_id).collect();
        plan_ids.sort_unstable();
        plan_ids.dedup();

        let plans: HashMap<i64, MembershipPlan> = sqlx::query_as::<_, MembershipPlanEntity>(
            r#"
            SELECT id, plan_code, plan_name, plan_type, platforms, duration_days, base_price, final_price,
                   discount_percentage, currency, daily_download_limit, monthly_download_limit, is_active,
                   is_featured, sort_order, description, created_at, updated_at
            FROM membership_plans
            WHERE id = ANY($1)
            "#,
        )
        .bind(&plan_ids)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|p| (p.id, MembershipPlan::from(p)))
        .collect();
        timer.record();

        Ok(memberships
            .into_iter()
            .filter_map(|m| {
                let plan = plans.get(&m.plan_id)?.clone();
                Some(MembershipWithPlan {
                    membership: m.into(),
                    plan,
                })
            })
            .collect())
    }

    /// Locks one membership row.
    pub async fn lock(&self, conn: &mut PgConnection, id: i64) -> Result<Option<UserMembershipEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_membership");
        let result = sqlx::query_as::<_, UserMembershipEntity>(concat!(
            "SELECT ",
            membership_columns!(),
            " FROM user_memberships WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Locks the user's effective membership on a plan, if any.
    pub async fn lock_effective_on_plan(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        plan_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<UserMembershipEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_effective_membership_on_plan");
        let result = sqlx::query_as::<_, UserMembershipEntity>(concat!(
            "SELECT ",
            membership_columns!(),
            " FROM user_memberships \
             WHERE user_id = $1 AND plan_id = $2 AND status = 'active' AND (end_date IS NULL OR end_date > $3) \
             ORDER BY end_date DESC NULLS FIRST, id DESC LIMIT 1 FOR UPDATE"
        ))
        .bind(user_id)
        .bind(plan_id)
        .bind(now)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Persists usage counters and their reset dates.
    pub async fn save_counters(&self, conn: &mut PgConnection, membership: &UserMembership) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("save_membership_counters");
        let result = sqlx::query(
            r#"
            UPDATE user_memberships
            SET download_used_daily = $2, download_used_monthly = $3,
                last_reset_daily = $4, last_reset_monthly = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(membership.id)
        .bind(membership.download_used_daily)
        .bind(membership.download_used_monthly)
        .bind(membership.last_reset_daily)
        .bind(membership.last_reset_monthly)
        .execute(&mut *conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn insert(&self, conn: &mut PgConnection, membership: &NewMembership) -> Result<UserMembershipEntity, sqlx::Error> {
        let timer = QueryTimer::new("insert_membership");
        let result = sqlx::query_as::<_, UserMembershipEntity>(concat!(
            "INSERT INTO user_memberships (user_id, order_id, plan_id, plan_code, plan_name, start_date, end_date, \
             download_used_daily, download_used_monthly, last_reset_daily, last_reset_monthly) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) RETURNING ",
            membership_columns!()
        ))
        .bind(membership.user_id)
        .bind(membership.order_id)
        .bind(membership.plan_id)
        .bind(&membership.plan_code)
        .bind(&membership.plan_name)
        .bind(membership.start_date)
        .bind(membership.end_date)
        .bind(membership.download_used_daily)
        .bind(membership.download_used_monthly)
        .bind(membership.last_reset_daily)
        .bind(membership.last_reset_monthly)
        .fetch_one(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Marks an active membership as replaced by `replaced_by`. Returns false if it was not active.
    pub async fn mark_replaced(&self, conn: &mut PgConnection, id: i64, replaced_by: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("mark_membership_replaced");
        let result = sqlx::query(
            r#"
            UPDATE user_memberships
            SET status = 'replaced', replaced_by = $2, updated_at = NOW()
            WHERE id = $1 AND status = 'active' AND replaced_by IS NULL
            "#,
        )
        .bind(id)
        .bind(replaced_by)
        .execute(&mut *conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected() > 0)
    }

    /// Cancels the active membership granted by an order.
    pub async fn cancel_for_order(&self, conn: &mut PgConnection, order_id: i64) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("cancel_membership_for_order");
        let result = sqlx::query(
            "UPDATE user_memberships SET status = 'cancelled', updated_at = NOW() WHERE order_id = $1 AND status = 'active'",
        )
        .bind(order_id)
        .execute(&mut *conn)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    /// Expires active memberships whose end date has passed.
    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("expire_memberships");
        let result = sqlx::query(
            "UPDATE user_memberships SET status = $2, updated_at = NOW() \
             WHERE status = 'active' AND end_date IS NOT NULL AND end_date <= $1",
        )
        .bind(now)
        .bind(MembershipStatusDb::Expired)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }
}
