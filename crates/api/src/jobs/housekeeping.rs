//! Small daily and hourly table maintenance.

use persistence::repositories::{PaymentAccountRepository, TokenBlacklistRepository};
use sqlx::PgPool;

use super::scheduler::{Job, JobFrequency};

/// Zeroes `daily_amount` on every payment account at local midnight.
pub struct ResetPaymentAccountDailyJob {
    accounts: PaymentAccountRepository,
}

impl ResetPaymentAccountDailyJob {
    pub fn new(pool: PgPool) -> Self {
        Self {
            accounts: PaymentAccountRepository::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl Job for ResetPaymentAccountDailyJob {
    fn name(&self) -> &'static str {
        "reset_payment_account_daily"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Daily
    }

    async fn execute(&self) -> Result<u64, String> {
        self.accounts.reset_daily().await.map_err(|e| e.to_string())
    }
}

/// Drops revoked tokens that have expired anyway.
pub struct PurgeTokenBlacklistJob {
    blacklist: TokenBlacklistRepository,
}

impl PurgeTokenBlacklistJob {
    pub fn new(pool: PgPool) -> Self {
        Self {
            blacklist: TokenBlacklistRepository::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl Job for PurgeTokenBlacklistJob {
    fn name(&self) -> &'static str {
        "purge_token_blacklist"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<u64, String> {
        self.blacklist.purge_expired().await.map_err(|e| e.to_string())
    }
}
