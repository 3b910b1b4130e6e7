//! End users and operators.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, DomainResult};

/// Failed logins allowed before the account is locked.
pub const MAX_FAILED_LOGINS: i32 = 5;

/// How long an automatic lock lasts.
pub const LOCK_MINUTES: i64 = 30;

/// Account status of an end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Normal,
    Disabled,
    Locked,
    Pending,
    Suspended,
    Deleted,
}

impl AccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Normal => "normal",
            AccountStatus::Disabled => "disabled",
            AccountStatus::Locked => "locked",
            AccountStatus::Pending => "pending",
            AccountStatus::Suspended => "suspended",
            AccountStatus::Deleted => "deleted",
        }
    }
}

impl FromStr for AccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(AccountStatus::Normal),
            "disabled" => Ok(AccountStatus::Disabled),
            "locked" => Ok(AccountStatus::Locked),
            "pending" => Ok(AccountStatus::Pending),
            "suspended" => Ok(AccountStatus::Suspended),
            "deleted" => Ok(AccountStatus::Deleted),
            _ => Err(format!("Invalid account status: {}", s)),
        }
    }
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A customer account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub referral_code: String,
    pub referrer_id: Option<i64>,
    pub status: AccountStatus,
    pub failed_login_attempts: i32,
    pub status_expire_at: Option<DateTime<Utc>>,
    pub current_tier_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A locked user whose lock has lapsed behaves as normal.
    pub fn lock_has_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == AccountStatus::Locked
            && self.status_expire_at.map(|at| at <= now).unwrap_or(false)
    }

    /// Status as observed at `now`, applying lazy unlock.
    pub fn effective_status(&self, now: DateTime<Utc>) -> AccountStatus {
        if self.lock_has_lapsed(now) {
            AccountStatus::Normal
        } else {
            self.status
        }
    }

    /// Rejects users that may not use the customer API.
    pub fn ensure_active(&self, now: DateTime<Utc>) -> DomainResult<()> {
        match self.effective_status(now) {
            AccountStatus::Normal => Ok(()),
            AccountStatus::Locked => Err(DomainError::Unauthorized(
                "账号已被锁定，请稍后再试".to_string(),
            )),
            other => Err(DomainError::Unauthorized(format!("账号状态异常: {}", other))),
        }
    }
}

/// Result of recording a failed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginFailure {
    pub attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
}

/// Counts a failed login and decides whether to lock the account.
pub fn register_failed_login(previous_attempts: i32, now: DateTime<Utc>) -> LoginFailure {
    let attempts = previous_attempts + 1;
    let locked_until = if attempts >= MAX_FAILED_LOGINS {
        Some(now + Duration::minutes(LOCK_MINUTES))
    } else {
        None
    };
    LoginFailure {
        attempts,
        locked_until,
    }
}

/// Back-office operator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Operator {
    pub id: i64,
    pub uuid: Uuid,
    pub username: String,
    pub nick_name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[serde(skip_serializing)]
    pub totp_secret: Option<String>,
    pub enabled: bool,
}

/// Login request shared by both namespaces.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 64, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, max = 128, message = "Password is required"))]
    pub password: String,
}

/// Customer self-registration.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 64, message = "Username must be 3-64 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 5, max = 32, message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(length(min = 8, max = 128, message = "Password must be 8-128 characters"))]
    pub password: String,
    /// Code of the inviting user, if any.
    #[validate(length(min = 1, max = 32, message = "Invalid referral code"))]
    pub referral_code: Option<String>,
}

/// Token returned after a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: i64,
    pub user_id: i64,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{faker::internet::en::SafeEmail, faker::internet::en::Username, Fake};

    fn user(status: AccountStatus, expire: Option<DateTime<Utc>>) -> User {
        let now = Utc::now();
        User {
            id: 1,
            uuid: Uuid::new_v4(),
            username: Username().fake(),
            email: SafeEmail().fake(),
            phone: None,
            password_hash: String::new(),
            referral_code: "ABC123".into(),
            referrer_id: None,
            status,
            failed_login_attempts: 0,
            status_expire_at: expire,
            current_tier_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_lapsed_lock_behaves_as_normal() {
        let now = Utc::now();
        let u = user(AccountStatus::Locked, Some(now - Duration::minutes(1)));
        assert!(u.lock_has_lapsed(now));
        assert_eq!(u.effective_status(now), AccountStatus::Normal);
        assert!(u.ensure_active(now).is_ok());
    }

    #[test]
    fn test_active_lock_rejects() {
        let now = Utc::now();
        let u = user(AccountStatus::Locked, Some(now + Duration::minutes(5)));
        assert_eq!(u.effective_status(now), AccountStatus::Locked);
        assert!(matches!(u.ensure_active(now), Err(DomainError::Unauthorized(_))));
    }

    #[test]
    fn test_lock_without_expiry_is_permanent() {
        let now = Utc::now();
        let u = user(AccountStatus::Locked, None);
        assert!(!u.lock_has_lapsed(now));
    }

    #[test]
    fn test_disabled_user_rejected() {
        let u = user(AccountStatus::Disabled, None);
        assert!(u.ensure_active(Utc::now()).is_err());
    }

    #[test]
    fn test_register_failed_login_locks_at_threshold() {
        let now = Utc::now();
        let below = register_failed_login(MAX_FAILED_LOGINS - 2, now);
        assert_eq!(below.locked_until, None);

        let at = register_failed_login(MAX_FAILED_LOGINS - 1, now);
        assert_eq!(at.attempts, MAX_FAILED_LOGINS);
        assert_eq!(at.locked_until, Some(now + Duration::minutes(LOCK_MINUTES)));
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let mut u = user(AccountStatus::Normal, None);
        u.password_hash = "$argon2id$secret".into();
        let json = serde_json::to_string(&u).unwrap();
        assert!(!json.contains("argon2id"));
    }

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            username: Username().fake(),
            email: SafeEmail().fake(),
            phone: None,
            password: "correct horse".to_string(),
            referral_code: Some("ABCD2345".to_string()),
        };
        assert!(valid.validate().is_ok());

        let mut short_password = valid.clone();
        short_password.password = "short".to_string();
        assert!(short_password.validate().is_err());

        let mut bad_email = valid.clone();
        bad_email.email = "not-an-email".to_string();
        assert!(bad_email.validate().is_err());

        let mut empty_code = valid;
        empty_code.referral_code = Some(String::new());
        assert!(empty_code.validate().is_err());
    }
}
