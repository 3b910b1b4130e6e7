//! User and operator entities (database row mappings).

use chrono::{DateTime, Utc};
use domain::models::user::{AccountStatus, Operator, User};
use sqlx::FromRow;
use uuid::Uuid;

db_enum!(
    /// Database enum for account_status.
    AccountStatusDb, AccountStatus, "account_status", {
        Normal, Disabled, Locked, Pending, Suspended, Deleted,
    }
);

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub referral_code: String,
    pub referrer_id: Option<i64>,
    pub status: AccountStatusDb,
    pub failed_login_attempts: i32,
    pub status_expire_at: Option<DateTime<Utc>>,
    pub current_tier_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserEntity> for User {
    fn from(entity: UserEntity) -> Self {
        Self {
            id: entity.id,
            uuid: entity.uuid,
            username: entity.username,
            email: entity.email,
            phone: entity.phone,
            password_hash: entity.password_hash,
            referral_code: entity.referral_code,
            referrer_id: entity.referrer_id,
            status: entity.status.into(),
            failed_login_attempts: entity.failed_login_attempts,
            status_expire_at: entity.status_expire_at,
            current_tier_id: entity.current_tier_id,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

/// Database row mapping for the operators table.
#[derive(Debug, Clone, FromRow)]
pub struct OperatorEntity {
    pub id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub nick_name: String,
    pub password_hash: String,
    pub totp_secret: Option<String>,
    pub enabled: bool,
}

impl From<OperatorEntity> for Operator {
    fn from(entity: OperatorEntity) -> Self {
        Self {
            id: entity.id,
            uuid: entity.uuid,
            username: entity.username,
            nick_name: entity.nick_name,
            password_hash: entity.password_hash,
            totp_secret: entity.totp_secret,
            enabled: entity.enabled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_status_round_trip() {
        for status in [AccountStatus::Normal, AccountStatus::Locked, AccountStatus::Deleted] {
            let db: AccountStatusDb = status.into();
            assert_eq!(AccountStatus::from(db), status);
        }
    }
}
