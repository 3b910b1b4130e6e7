//! Withdrawal record entity.

use chrono::{DateTime, Utc};
use domain::models::withdraw::{WithdrawRecord, WithdrawStatus, WithdrawType};
use rust_decimal::Decimal;
use sqlx::FromRow;

db_enum!(WithdrawStatusDb, WithdrawStatus, "withdraw_status", {
    Pending, Approved, Rejected, Completed, Cancelled,
});

db_enum!(WithdrawTypeDb, WithdrawType, "withdraw_type", { Alipay, Wechat, Bank });

/// Database row mapping for the withdraw_records table.
#[derive(Debug, Clone, FromRow)]
pub struct WithdrawRecordEntity {
    pub id: i64,
    pub user_id: i64,
    pub withdraw_no: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub actual_amount: Decimal,
    pub withdraw_type: WithdrawTypeDb,
    pub account_name: String,
    pub account_no: String,
    pub status: WithdrawStatusDb,
    pub reject_reason: Option<String>,
    pub audit_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WithdrawRecordEntity> for WithdrawRecord {
    fn from(entity: WithdrawRecordEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            withdraw_no: entity.withdraw_no,
            amount: entity.amount,
            fee: entity.fee,
            actual_amount: entity.actual_amount,
            withdraw_type: entity.withdraw_type.into(),
            account_name: entity.account_name,
            account_no: entity.account_no,
            status: entity.status.into(),
            reject_reason: entity.reject_reason,
            audit_time: entity.audit_time,
            complete_time: entity.complete_time,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}
