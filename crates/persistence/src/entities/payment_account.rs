//! Payment account entity.

use chrono::{DateTime, Utc};
use domain::models::payment::PaymentAccount;
use rust_decimal::Decimal;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct PaymentAccountEntity {
    pub id: i64,
    pub provider_code: String,
    pub name: String,
    pub config: serde_json::Value,
    pub callback_secret: String,
    pub daily_limit: Option<Decimal>,
    pub daily_amount: Decimal,
    pub total_amount: Decimal,
    pub total_orders: i64,
    pub last_used_at: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl From<PaymentAccountEntity> for PaymentAccount {
    fn from(entity: PaymentAccountEntity) -> Self {
        Self {
            id: entity.id,
            provider_code: entity.provider_code,
            name: entity.name,
            config: entity.config,
            callback_secret: entity.callback_secret,
            daily_limit: entity.daily_limit,
            daily_amount: entity.daily_amount,
            total_amount: entity.total_amount,
            total_orders: entity.total_orders,
            last_used_at: entity.last_used_at,
            enabled: entity.enabled,
        }
    }
}
