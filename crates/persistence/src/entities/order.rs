//! Order entity.

use chrono::{DateTime, Utc};
use domain::models::order::{Order, OrderStatus, OrderType};
use rust_decimal::Decimal;
use sqlx::FromRow;

use super::PlatformDb;

db_enum!(OrderStatusDb, OrderStatus, "order_status", {
    Pending, Paid, Failed, Refunded, Cancelled,
});

db_enum!(OrderTypeDb, OrderType, "order_type", { New, Renew, Upgrade, Downgrade });

/// Database row mapping for the orders table.
#[derive(Debug, Clone, FromRow)]
pub struct OrderEntity {
    pub id: i64,
    pub order_no: String,
    pub user_id: i64,
    pub plan_id: i64,
    pub plan_code: String,
    pub plan_name: String,
    pub platform: PlatformDb,
    pub order_type: OrderTypeDb,
    pub original_price: Decimal,
    pub discount_amount: Decimal,
    pub upgrade_credit: Decimal,
    pub final_amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub status: OrderStatusDb,
    pub fail_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub previous_membership_id: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderEntity> for Order {
    fn from(entity: OrderEntity) -> Self {
        Self {
            id: entity.id,
            order_no: entity.order_no,
            user_id: entity.user_id,
            plan_id: entity.plan_id,
            plan_code: entity.plan_code,
            plan_name: entity.plan_name,
            platform: entity.platform.into(),
            order_type: entity.order_type.into(),
            original_price: entity.original_price,
            discount_amount: entity.discount_amount,
            upgrade_credit: entity.upgrade_credit,
            final_amount: entity.final_amount,
            currency: entity.currency,
            payment_method: entity.payment_method,
            payment_id: entity.payment_id,
            status: entity.status.into(),
            fail_reason: entity.fail_reason,
            paid_at: entity.paid_at,
            expires_at: entity.expires_at,
            previous_membership_id: entity.previous_membership_id,
            metadata: entity.metadata,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
