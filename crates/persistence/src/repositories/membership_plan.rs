//! Membership plan repository.

use chrono::{DateTime, Utc};
use domain::models::membership_plan::{PlanDraft, PlanFilter};
use rust_decimal::Decimal;
use shared::pagination::PageRequest;
use sqlx::types::Json;
use sqlx::PgPool;

use crate::entities::{MembershipPlanEntity, PlanTypeDb};
use crate::metrics::QueryTimer;

macro_rules! plan_columns {
    () => {
        "id, plan_code, plan_name, plan_type, platforms, duration_days, base_price, final_price, \
         discount_percentage, currency, daily_download_limit, monthly_download_limit, is_active, \
         is_featured, sort_order, description, created_at, updated_at"
    };
}

macro_rules! plan_filter {
    () => {
        " WHERE deleted_at IS NULL \
          AND ($1::TEXT IS NULL OR plan_code ILIKE '%' || $1 || '%') \
          AND ($2::TEXT IS NULL OR plan_name ILIKE '%' || $2 || '%') \
          AND ($3::plan_type IS NULL OR plan_type = $3) \
          AND ($4::TEXT[] IS NULL OR platforms ?| $4) \
          AND ($5::NUMERIC IS NULL OR final_price >= $5) \
          AND ($6::NUMERIC IS NULL OR final_price <= $6) \
          AND ($7::BOOLEAN IS NULL OR is_active = $7) \
          AND ($8::BOOLEAN IS NULL OR is_featured = $8) \
          AND ($9::TIMESTAMPTZ IS NULL OR created_at >= $9) \
          AND ($10::TIMESTAMPTZ IS NULL OR created_at <= $10)"
    };
}

/// Bound values of a plan list filter, in placeholder order.
#[derive(Clone, Copy)]
struct FilterArgs<'a> {
    code: Option<&'a str>,
    name: Option<&'a str>,
    plan_type: Option<PlanTypeDb>,
    platforms: Option<&'a [String]>,
    min_price: Option<Decimal>,
    max_price: Option<Decimal>,
    is_active: Option<bool>,
    is_featured: Option<bool>,
    created_from: Option<DateTime<Utc>>,
    created_to: Option<DateTime<Utc>>,
}

#[derive(Clone)]
pub struct MembershipPlanRepository {
    pool: PgPool,
}

impl MembershipPlanRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a plan by ID, including soft-deleted ones when `include_deleted`.
    pub async fn find_by_id(&self, id: i64, include_deleted: bool) -> Result<Option<MembershipPlanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_plan_by_id");
        let result = sqlx::query_as::<_, MembershipPlanEntity>(concat!(
            "SELECT ",
            plan_columns!(),
            " FROM membership_plans WHERE id = $1 AND ($2 OR deleted_at IS NULL)"
        ))
        .bind(id)
        .bind(include_deleted)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Plans by ID regardless of soft deletion; memberships outlive their plan's listing.
    pub async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<MembershipPlanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_plans_by_ids");
        let result = sqlx::query_as::<_, MembershipPlanEntity>(concat!(
            "SELECT ",
            plan_columns!(),
            " FROM membership_plans WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn create(&self, draft: &PlanDraft) -> Result<MembershipPlanEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_plan");
        let result = sqlx::query_as::<_, MembershipPlanEntity>(concat!(
            "INSERT INTO membership_plans (plan_code, plan_name, plan_type, platforms, duration_days, \
             base_price, final_price, discount_percentage, currency, daily_download_limit, \
             monthly_download_limit, is_active, is_featured, sort_order, description) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) RETURNING ",
            plan_columns!()
        ))
        .bind(&draft.plan_code)
        .bind(&draft.plan_name)
        .bind(PlanTypeDb::from(draft.plan_type))
        .bind(Json(&draft.platforms))
        .bind(draft.duration_days)
        .bind(draft.base_price)
        .bind(draft.final_price)
        .bind(draft.discount_percentage)
        .bind(&draft.currency)
        .bind(draft.daily_download_limit)
        .bind(draft.monthly_download_limit)
        .bind(draft.is_active)
        .bind(draft.is_featured)
        .bind(draft.sort_order)
        .bind(draft.description.as_deref())
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Overwrites every writable column with the checked draft.
    pub async fn update(&self, id: i64, draft: &PlanDraft) -> Result<Option<MembershipPlanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_plan");
        let result = sqlx::query_as::<_, MembershipPlanEntity>(concat!(
            "UPDATE membership_plans SET plan_code = $2, plan_name = $3, plan_type = $4, platforms = $5, \
             duration_days = $6, base_price = $7, final_price = $8, discount_percentage = $9, currency = $10, \
             daily_download_limit = $11, monthly_download_limit = $12, is_active = $13, is_featured = $14, \
             sort_order = $15, description = $16, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING ",
            plan_columns!()
        ))
        .bind(id)
        .bind(&draft.plan_code)
        .bind(&draft.plan_name)
        .bind(PlanTypeDb::from(draft.plan_type))
        .bind(Json(&draft.platforms))
        .bind(draft.duration_days)
        .bind(draft.base_price)
        .bind(draft.final_price)
        .bind(draft.discount_percentage)
        .bind(&draft.currency)
        .bind(draft.daily_download_limit)
        .bind(draft.monthly_download_limit)
        .bind(draft.is_active)
        .bind(draft.is_featured)
        .bind(draft.sort_order)
        .bind(draft.description.as_deref())
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Whether any membership or order references the plan.
    pub async fn is_in_use(&self, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("is_plan_in_use");
        let result = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(SELECT 1 FROM user_memberships WHERE plan_id = $1)
                OR EXISTS(SELECT 1 FROM orders WHERE plan_id = $1)
            "#,
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn soft_delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_plan");
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM package_plan_relations WHERE plan_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let affected = sqlx::query(
            "UPDATE membership_plans SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
        tx.commit().await?;
        timer.record();
        Ok(affected > 0)
    }

    /// Filtered page of plans. `platforms` matches plans covering any listed platform.
    pub async fn list(
        &self,
        filter: &PlanFilter,
        platforms: Option<&[String]>,
        page: &PageRequest,
    ) -> Result<(Vec<MembershipPlanEntity>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_plans");
        let args = FilterArgs {
            code: filter.code.as_deref(),
            name: filter.name.as_deref(),
            plan_type: filter.plan_type.map(PlanTypeDb::from),
            platforms,
            min_price: filter.min_price,
            max_price: filter.max_price,
            is_active: filter.is_active,
            is_featured: filter.is_featured,
            created_from: filter.created_from,
            created_to: filter.created_to,
        };

        let rows = sqlx::query_as::<_, MembershipPlanEntity>(concat!(
            "SELECT ",
            plan_columns!(),
            " FROM membership_plans",
            plan_filter!(),
            " ORDER BY sort_order, id LIMIT $11 OFFSET $12"
        ))
        .bind(args.code)
        .bind(args.name)
        .bind(args.plan_type)
        .bind(args.platforms)
        .bind(args.min_price)
        .bind(args.max_price)
        .bind(args.is_active)
        .bind(args.is_featured)
        .bind(args.created_from)
        .bind(args.created_to)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<_, i64>(concat!(
            "SELECT COUNT(*) FROM membership_plans",
            plan_filter!()
        ))
        .bind(args.code)
        .bind(args.name)
        .bind(args.plan_type)
        .bind(args.platforms)
        .bind(args.min_price)
        .bind(args.max_price)
        .bind(args.is_active)
        .bind(args.is_featured)
        .bind(args.created_from)
        .bind(args.created_to)
        .fetch_one(&self.pool)
        .await?;

        timer.record();
        Ok((rows, total))
    }

    /// Plans on sale, in display order.
    pub async fn list_active(&self) -> Result<Vec<MembershipPlanEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_plans");
        let result = sqlx::query_as::<_, MembershipPlanEntity>(concat!(
            "SELECT ",
            plan_columns!(),
            " FROM membership_plans WHERE is_active AND deleted_at IS NULL ORDER BY sort_order, id"
        ))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
