//! User membership entity.

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::user_membership::{MembershipStatus, UserMembership};
use sqlx::FromRow;

db_enum!(MembershipStatusDb, MembershipStatus, "membership_status", {
    Active, Expired, Cancelled, Suspended, Replaced,
});

/// Database row mapping for the user_memberships table.
#[derive(Debug, Clone, FromRow)]
pub struct UserMembershipEntity {
    pub id: i64,
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub plan_id: i64,
    pub plan_code: String,
    pub plan_name: String,
    pub status: MembershipStatusDb,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub download_used_daily: i32,
    pub download_used_monthly: i32,
    pub last_reset_daily: NaiveDate,
    pub last_reset_monthly: NaiveDate,
    pub replaced_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserMembershipEntity> for UserMembership {
    fn from(entity: UserMembershipEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            order_id: entity.order_id,
            plan_id: entity.plan_id,
            plan_code: entity.plan_code,
            plan_name: entity.plan_name,
            status: entity.status.into(),
            start_date: entity.start_date,
            end_date: entity.end_date,
            download_used_daily: entity.download_used_daily,
            download_used_monthly: entity.download_used_monthly,
            last_reset_daily: entity.last_reset_daily,
            last_reset_monthly: entity.last_reset_monthly,
            replaced_by: entity.replaced_by,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
