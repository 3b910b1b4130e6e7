//! User and operator repositories.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::entities::{OperatorEntity, UserEntity};
use crate::metrics::QueryTimer;

macro_rules! user_columns {
    () => {
        "id, uuid, username, email, phone, password_hash, referral_code, referrer_id, status, \
         failed_login_attempts, status_expire_at, current_tier_id, created_at, updated_at"
    };
}

/// Unique constraint on `users.referral_code`.
pub const REFERRAL_CODE_CONSTRAINT: &str = "users_referral_code_key";

/// Input for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub phone: Option<&'a str>,
    pub password_hash: &'a str,
    pub referral_code: &'a str,
    pub referrer_id: Option<i64>,
}

/// Repository for end-user accounts.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Find a live (not soft-deleted) user by ID.
    pub async fn find_by_id(&self, id: i64) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let result = sqlx::query_as::<_, UserEntity>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_username");
        let result = sqlx::query_as::<_, UserEntity>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE username = $1 AND deleted_at IS NULL"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_referral_code(&self, code: &str) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_referral_code");
        let result = sqlx::query_as::<_, UserEntity>(concat!(
            "SELECT ",
            user_columns!(),
            " FROM users WHERE referral_code = $1 AND deleted_at IS NULL"
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn create(&self, user: &NewUser<'_>) -> Result<UserEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let result = sqlx::query_as::<_, UserEntity>(concat!(
            "INSERT INTO users (username, email, phone, password_hash, referral_code, referrer_id) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING ",
            user_columns!()
        ))
        .bind(user.username)
        .bind(user.email)
        .bind(user.phone)
        .bind(user.password_hash)
        .bind(user.referral_code)
        .bind(user.referrer_id)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Stores a failed login. A `locked_until` locks the account until then.
    pub async fn record_login_failure(
        &self,
        id: i64,
        attempts: i32,
        locked_until: Option<DateTime<Utc>>,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("record_login_failure");
        let result = sqlx::query(
            r#"
            UPDATE users
            SET failed_login_attempts = $2,
                status = CASE WHEN $3::TIMESTAMPTZ IS NULL THEN status ELSE 'locked'::account_status END,
                status_expire_at = COALESCE($3, status_expire_at),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts)
        .bind(locked_until)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    pub async fn reset_login_failures(&self, id: i64) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("reset_login_failures");
        let result = sqlx::query(
            "UPDATE users SET failed_login_attempts = 0, updated_at = NOW() WHERE id = $1 AND failed_login_attempts <> 0",
        )
        .bind(id)
        .execute(&self.pool)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Returns a lapsed lock to `normal`. Returns the refreshed row.
    pub async fn unlock(&self, id: i64) -> Result<Option<UserEntity>, sqlx::Error> {
        let timer = QueryTimer::new("unlock_user");
        let result = sqlx::query_as::<_, UserEntity>(concat!(
            "UPDATE users SET status = 'normal', failed_login_attempts = 0, status_expire_at = NULL, \
             updated_at = NOW() WHERE id = $1 AND status = 'locked' RETURNING ",
            user_columns!()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Number of users whose referrer is `referrer_id`.
    pub async fn count_direct_referrals<'e, E>(&self, executor: E, referrer_id: i64) -> Result<i64, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        let timer = QueryTimer::new("count_direct_referrals");
        let result = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE referrer_id = $1 AND deleted_at IS NULL",
        )
        .bind(referrer_id)
        .fetch_one(executor)
        .await;
        timer.record();
        result
    }

    pub async fn set_current_tier(
        &self,
        conn: &mut PgConnection,
        user_id: i64,
        tier_id: i64,
    ) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("set_current_tier");
        let result = sqlx::query(
            "UPDATE users SET current_tier_id = $2, updated_at = NOW() WHERE id = $1 AND current_tier_id IS DISTINCT FROM $2",
        )
        .bind(user_id)
        .bind(tier_id)
        .execute(&mut *conn)
        .await;
        timer.record();
        result.map(|_| ())
    }
}

/// Repository for back-office operators.
#[derive(Clone)]
pub struct OperatorRepository {
    pool: PgPool,
}

impl OperatorRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<OperatorEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_operator_by_id");
        let result = sqlx::query_as::<_, OperatorEntity>(
            r#"
            SELECT id, uuid, username, nick_name, password_hash, totp_secret, enabled
            FROM operators
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<OperatorEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_operator_by_username");
        let result = sqlx::query_as::<_, OperatorEntity>(
            r#"
            SELECT id, uuid, username, nick_name, password_hash, totp_secret, enabled
            FROM operators
            WHERE username = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// True once any operator row exists, deleted or not.
    pub async fn any_exists(&self) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("any_operator_exists");
        let result = sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM operators)")
            .fetch_one(&self.pool)
            .await;
        timer.record();
        result
    }

    pub async fn create(
        &self,
        username: &str,
        nick_name: &str,
        password_hash: &str,
        totp_secret: Option<&str>,
    ) -> Result<OperatorEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_operator");
        let result = sqlx::query_as::<_, OperatorEntity>(
            r#"
            INSERT INTO operators (username, nick_name, password_hash, totp_secret)
            VALUES ($1, $2, $3, $4)
            RETURNING id, uuid, username, nick_name, password_hash, totp_secret, enabled
            "#,
        )
        .bind(username)
        .bind(nick_name)
        .bind(password_hash)
        .bind(totp_secret)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }
}
