//! Refund entity.

use chrono::{DateTime, Utc};
use domain::models::refund::{Refund, RefundStatus, RefundType};
use rust_decimal::Decimal;
use sqlx::FromRow;

db_enum!(RefundStatusDb, RefundStatus, "refund_status", {
    Pending, Processing, Success, Failed, Cancelled,
});

db_enum!(RefundTypeDb, RefundType, "refund_type", { Full, Partial });

#[derive(Debug, Clone, FromRow)]
pub struct RefundEntity {
    pub id: i64,
    pub refund_no: String,
    pub order_id: i64,
    pub refund_amount: Decimal,
    pub refund_type: RefundTypeDb,
    pub reason: Option<String>,
    pub status: RefundStatusDb,
    pub third_party_refund_id: Option<String>,
    pub operator_id: Option<i64>,
    pub operator_name: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RefundEntity> for Refund {
    fn from(entity: RefundEntity) -> Self {
        Self {
            id: entity.id,
            refund_no: entity.refund_no,
            order_id: entity.order_id,
            refund_amount: entity.refund_amount,
            refund_type: entity.refund_type.into(),
            reason: entity.reason,
            status: entity.status.into(),
            third_party_refund_id: entity.third_party_refund_id,
            operator_id: entity.operator_id,
            operator_name: entity.operator_name,
            processed_at: entity.processed_at,
            completed_at: entity.completed_at,
            failure_reason: entity.failure_reason,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
