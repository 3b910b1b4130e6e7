//! Membership plan entity.

use chrono::{DateTime, Utc};
use domain::models::membership_plan::{MembershipPlan, PlanType};
use domain::models::platform::PlatformSet;
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::FromRow;

db_enum!(PlanTypeDb, PlanType, "plan_type", { Monthly, Yearly, Lifetime });

/// Database row mapping for the membership_plans table.
///
/// `platforms` is a JSONB array of platform names.
#[derive(Debug, Clone, FromRow)]
pub struct MembershipPlanEntity {
    pub id: i64,
    pub plan_code: String,
    pub plan_name: String,
    pub plan_type: PlanTypeDb,
    pub platforms: Json<PlatformSet>,
    pub duration_days: Option<i32>,
    pub base_price: Decimal,
    pub final_price: Decimal,
    pub discount_percentage: Decimal,
    pub currency: String,
    pub daily_download_limit: Option<i32>,
    pub monthly_download_limit: Option<i32>,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<MembershipPlanEntity> for MembershipPlan {
    fn from(entity: MembershipPlanEntity) -> Self {
        Self {
            id: entity.id,
            plan_code: entity.plan_code,
            plan_name: entity.plan_name,
            plan_type: entity.plan_type.into(),
            platforms: entity.platforms.0,
            duration_days: entity.duration_days,
            base_price: entity.base_price,
            final_price: entity.final_price,
            discount_percentage: entity.discount_percentage,
            currency: entity.currency,
            daily_download_limit: entity.daily_download_limit,
            monthly_download_limit: entity.monthly_download_limit,
            is_active: entity.is_active,
            is_featured: entity.is_featured,
            sort_order: entity.sort_order,
            description: entity.description,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
