//! Payment provider account repository.

use domain::models::payment::{CreatePaymentAccountRequest, PaymentAccount};
use sqlx::{PgConnection, PgPool};

use crate::entities::PaymentAccountEntity;
use crate::metrics::QueryTimer;

macro_rules! payment_account_columns {
    () => {
        "id, provider_code, name, config, callback_secret, daily_limit, daily_amount, total_amount, \
         total_orders, last_used_at, enabled"
    };
}

#[derive(Clone)]
pub struct PaymentAccountRepository {
    pool: PgPool,
}

impl PaymentAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The enabled account for a provider, most recently created first.
    pub async fn find_enabled_by_provider(&self, provider_code: &str) -> Result<Option<PaymentAccountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_payment_account");
        let result = sqlx::query_as::<_, PaymentAccountEntity>(concat!(
            "SELECT ",
            payment_account_columns!(),
            " FROM payment_accounts WHERE provider_code = $1 AND enabled AND deleted_at IS NULL \
             ORDER BY id DESC LIMIT 1"
        ))
        .bind(provider_code)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn lock(&self, conn: &mut PgConnection, id: i64) -> Result<Option<PaymentAccountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("lock_payment_account");
        let result = sqlx::query_as::<_, PaymentAccountEntity>(concat!(
            "SELECT ",
            payment_account_columns!(),
            " FROM payment_accounts WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await;
        timer.record();
        result
    }

    /// Writes back usage statistics.
    pub async fn save_stats(&self, conn: &mut PgConnection, account: &PaymentAccount) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("save_payment_account_stats");
        let result = sqlx::query(
            r#"
            UPDATE payment_accounts
            SET daily_amount = $2, total_amount = $3, total_orders = $4, last_used_at = $5, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(account.id)
        .bind(account.daily_amount)
        .bind(account.total_amount)
        .bind(account.total_orders)
        .bind(account.last_used_at)
        .execute(&mut *conn)
        .await;
        timer.record();
        result.map(|_| ())
    }

    /// Zeroes every account's daily amount.
    pub async fn reset_daily(&self) -> Result<u64, sqlx::Error> {
        let timer = QueryTimer::new("reset_payment_daily_amounts");
        let result = sqlx::query("UPDATE payment_accounts SET daily_amount = 0, updated_at = NOW() WHERE daily_amount <> 0")
            .execute(&self.pool)
            .await;
        timer.record();
        result.map(|r| r.rows_affected())
    }

    pub async fn create(&self, request: &CreatePaymentAccountRequest) -> Result<PaymentAccountEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_payment_account");
        let result = sqlx::query_as::<_, PaymentAccountEntity>(concat!(
            "INSERT INTO payment_accounts (provider_code, name, config, callback_secret, daily_limit) \
             VALUES ($1, $2, $3, $4, $5) RETURNING ",
            payment_account_columns!()
        ))
        .bind(&request.provider_code)
        .bind(&request.name)
        .bind(&request.config)
        .bind(&request.callback_secret)
        .bind(request.daily_limit)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list(&self) -> Result<Vec<PaymentAccountEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_payment_accounts");
        let result = sqlx::query_as::<_, PaymentAccountEntity>(concat!(
            "SELECT ",
            payment_account_columns!(),
            " FROM payment_accounts WHERE deleted_at IS NULL ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }
}
