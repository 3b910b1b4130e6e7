//! Commission ledger entities: accounts, details, flows and tiers.

use chrono::{DateTime, Utc};
use domain::models::commission::{
    AccountFlow, BalanceKind, CommissionAccount, CommissionDetail, CommissionTier, DetailStatus,
    FlowType,
};
use rust_decimal::Decimal;
use sqlx::FromRow;

db_enum!(DetailStatusDb, DetailStatus, "detail_status", { Pending, Settled, Frozen });

db_enum!(FlowTypeDb, FlowType, "flow_type", {
    CommissionIn, WithdrawOut, Freeze, Unfreeze, Refund,
});

db_enum!(BalanceKindDb, BalanceKind, "balance_kind", { Available, Frozen });

/// Database row mapping for the commission_accounts table.
#[derive(Debug, Clone, FromRow)]
pub struct CommissionAccountEntity {
    pub id: i64,
    pub user_id: i64,
    pub available: Decimal,
    pub frozen: Decimal,
    pub total_earnings: Decimal,
    pub withdrawn: Decimal,
}

impl From<CommissionAccountEntity> for CommissionAccount {
    fn from(entity: CommissionAccountEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            available: entity.available,
            frozen: entity.frozen,
            total_earnings: entity.total_earnings,
            withdrawn: entity.withdrawn,
        }
    }
}

/// Database row mapping for the commission_details table.
#[derive(Debug, Clone, FromRow)]
pub struct CommissionDetailEntity {
    pub id: i64,
    pub user_id: i64,
    pub order_id: i64,
    pub order_no: String,
    pub order_user_id: i64,
    pub order_amount: Decimal,
    pub commission_rate: Decimal,
    pub commission: Decimal,
    pub tier_id: Option<i64>,
    pub tier_name: String,
    pub status: DetailStatusDb,
    pub settle_time: Option<DateTime<Utc>>,
    pub voided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<CommissionDetailEntity> for CommissionDetail {
    fn from(entity: CommissionDetailEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            order_id: entity.order_id,
            order_no: entity.order_no,
            order_user_id: entity.order_user_id,
            order_amount: entity.order_amount,
            commission_rate: entity.commission_rate,
            commission: entity.commission,
            tier_id: entity.tier_id,
            tier_name: entity.tier_name,
            status: entity.status.into(),
            settle_time: entity.settle_time,
            voided_at: entity.voided_at,
            created_at: entity.created_at,
        }
    }
}

/// Database row mapping for the account_flows table.
#[derive(Debug, Clone, FromRow)]
pub struct AccountFlowEntity {
    pub id: i64,
    pub user_id: i64,
    pub flow_no: String,
    pub flow_type: FlowTypeDb,
    pub balance_kind: BalanceKindDb,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub order_id: Option<i64>,
    pub withdraw_id: Option<i64>,
    pub refund_id: Option<i64>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AccountFlowEntity> for AccountFlow {
    fn from(entity: AccountFlowEntity) -> Self {
        Self {
            id: entity.id,
            user_id: entity.user_id,
            flow_no: entity.flow_no,
            flow_type: entity.flow_type.into(),
            balance_kind: entity.balance_kind.into(),
            amount: entity.amount,
            balance_before: entity.balance_before,
            balance_after: entity.balance_after,
            order_id: entity.order_id,
            withdraw_id: entity.withdraw_id,
            refund_id: entity.refund_id,
            remark: entity.remark,
            created_at: entity.created_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CommissionTierEntity {
    pub id: i64,
    pub name: String,
    pub min_subordinates: i32,
    pub rate: Decimal,
    pub sort: i32,
    pub status: i16,
}

impl From<CommissionTierEntity> for CommissionTier {
    fn from(entity: CommissionTierEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            min_subordinates: entity.min_subordinates,
            rate: entity.rate,
            sort: entity.sort,
            status: entity.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_type_names_match_storage() {
        let db: FlowTypeDb = FlowType::CommissionIn.into();
        assert_eq!(db, FlowTypeDb::CommissionIn);
        assert_eq!(FlowType::from(FlowTypeDb::WithdrawOut), FlowType::WithdrawOut);
        assert_eq!(BalanceKind::from(BalanceKindDb::Frozen), BalanceKind::Frozen);
    }
}
