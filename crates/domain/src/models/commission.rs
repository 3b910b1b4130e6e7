//! Commission account, ledger flows, tiers and commission details.
//!
//! Every balance mutation on [`CommissionAccount`] returns the [`FlowDraft`]
//! describing it, so callers can persist exactly one ledger row per change.
//! Flow amounts are signed: `amount == balance_after - balance_before` on the
//! sub-balance named by `balance_kind`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{DomainError, DomainResult};

/// Ledger flow type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    CommissionIn,
    WithdrawOut,
    Freeze,
    Unfreeze,
    Refund,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::CommissionIn => "commission_in",
            FlowType::WithdrawOut => "withdraw_out",
            FlowType::Freeze => "freeze",
            FlowType::Unfreeze => "unfreeze",
            FlowType::Refund => "refund",
        }
    }
}

impl FromStr for FlowType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commission_in" => Ok(FlowType::CommissionIn),
            "withdraw_out" => Ok(FlowType::WithdrawOut),
            "freeze" => Ok(FlowType::Freeze),
            "unfreeze" => Ok(FlowType::Unfreeze),
            "refund" => Ok(FlowType::Refund),
            _ => Err(format!("Invalid flow type: {}", s)),
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sub-balance a flow's before/after refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BalanceKind {
    Available,
    Frozen,
}

impl BalanceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BalanceKind::Available => "available",
            BalanceKind::Frozen => "frozen",
        }
    }
}

/// An unsaved ledger row produced by an account mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDraft {
    pub flow_type: FlowType,
    pub balance_kind: BalanceKind,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
}

/// Foreign keys a flow row points at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlowLinks {
    pub order_id: Option<i64>,
    pub withdraw_id: Option<i64>,
    pub refund_id: Option<i64>,
}

impl FlowLinks {
    pub fn order(order_id: i64) -> Self {
        Self {
            order_id: Some(order_id),
            ..Default::default()
        }
    }

    pub fn withdraw(withdraw_id: i64) -> Self {
        Self {
            withdraw_id: Some(withdraw_id),
            ..Default::default()
        }
    }

    pub fn refund(order_id: i64, refund_id: i64) -> Self {
        Self {
            order_id: Some(order_id),
            refund_id: Some(refund_id),
            withdraw_id: None,
        }
    }
}

/// A persisted ledger row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountFlow {
    pub id: i64,
    pub user_id: i64,
    pub flow_no: String,
    pub flow_type: FlowType,
    pub balance_kind: BalanceKind,
    pub amount: Decimal,
    pub balance_before: Decimal,
    pub balance_after: Decimal,
    pub order_id: Option<i64>,
    pub withdraw_id: Option<i64>,
    pub refund_id: Option<i64>,
    pub remark: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A user's commission balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionAccount {
    pub id: i64,
    pub user_id: i64,
    pub available: Decimal,
    pub frozen: Decimal,
    pub total_earnings: Decimal,
    pub withdrawn: Decimal,
}

impl CommissionAccount {
    /// A zero-balance account for `user_id`.
    pub fn empty(id: i64, user_id: i64) -> Self {
        Self {
            id,
            user_id,
            available: Decimal::ZERO,
            frozen: Decimal::ZERO,
            total_earnings: Decimal::ZERO,
            withdrawn: Decimal::ZERO,
        }
    }

    /// `available, frozen, withdrawn >= 0` and their sum never exceeds earnings.
    pub fn check_invariants(&self) -> DomainResult<()> {
        let non_negative = !self.available.is_sign_negative()
            && !self.frozen.is_sign_negative()
            && !self.withdrawn.is_sign_negative();
        if !non_negative || self.available + self.frozen + self.withdrawn > self.total_earnings {
            return Err(DomainError::internal(format!(
                "Commission account {} violates balance identity: available={} frozen={} withdrawn={} total={}",
                self.user_id, self.available, self.frozen, self.withdrawn, self.total_earnings
            )));
        }
        Ok(())
    }

    fn ensure_positive(amount: Decimal) -> DomainResult<()> {
        if amount <= Decimal::ZERO {
            return Err(DomainError::invalid("Amount must be positive"));
        }
        Ok(())
    }

    fn draft(
        flow_type: FlowType,
        balance_kind: BalanceKind,
        before: Decimal,
        after: Decimal,
    ) -> FlowDraft {
        FlowDraft {
            flow_type,
            balance_kind,
            amount: after - before,
            balance_before: before,
            balance_after: after,
        }
    }

    /// Credits a commission straight to `available`.
    pub fn credit_available(&mut self, amount: Decimal) -> DomainResult<FlowDraft> {
        Self::ensure_positive(amount)?;
        let before = self.available;
        self.available += amount;
        self.total_earnings += amount;
        self.check_invariants()?;
        Ok(Self::draft(FlowType::CommissionIn, BalanceKind::Available, before, self.available))
    }

    /// Credits a commission to `frozen` until its hold period ends.
    pub fn credit_frozen(&mut self, amount: Decimal) -> DomainResult<FlowDraft> {
        Self::ensure_positive(amount)?;
        let before = self.frozen;
        self.frozen += amount;
        self.total_earnings += amount;
        self.check_invariants()?;
        Ok(Self::draft(FlowType::CommissionIn, BalanceKind::Frozen, before, self.frozen))
    }

    /// Moves `amount` from `available` to `frozen`.
    pub fn freeze(&mut self, amount: Decimal) -> DomainResult<FlowDraft> {
        Self::ensure_positive(amount)?;
        if self.available < amount {
            return Err(DomainError::precondition(format!(
                "Insufficient available balance: {} < {}",
                self.available, amount
            )));
        }
        let before = self.available;
        self.available -= amount;
        self.frozen += amount;
        self.check_invariants()?;
        Ok(Self::draft(FlowType::Freeze, BalanceKind::Available, before, self.available))
    }

    /// Moves `amount` from `frozen` back to `available`.
    pub fn unfreeze(&mut self, amount: Decimal) -> DomainResult<FlowDraft> {
        Self::ensure_positive(amount)?;
        if self.frozen < amount {
            return Err(DomainError::precondition(format!(
                "Insufficient frozen balance: {} < {}",
                self.frozen, amount
            )));
        }
        let before = self.available;
        self.frozen -= amount;
        self.available += amount;
        self.check_invariants()?;
        Ok(Self::draft(FlowType::Unfreeze, BalanceKind::Available, before, self.available))
    }

    /// Pays out a frozen amount.
    pub fn withdraw_out(&mut self, amount: Decimal) -> DomainResult<FlowDraft> {
        Self::ensure_positive(amount)?;
        if self.frozen < amount {
            return Err(DomainError::precondition(format!(
                "Insufficient frozen balance: {} < {}",
                self.frozen, amount
            )));
        }
        let before = self.frozen;
        self.frozen -= amount;
        self.withdrawn += amount;
        self.check_invariants()?;
        Ok(Self::draft(FlowType::WithdrawOut, BalanceKind::Frozen, before, self.frozen))
    }

    /// Takes back up to `amount` of a refunded commission held in `held_in`.
    ///
    /// A held commission is still part of `frozen` and comes back from there.
    /// A settled one comes back from `available` only: the rest of `frozen`
    /// backs pending withdrawals and is never touched. Whatever cannot be
    /// covered is reported as `shortfall`. Earnings drop by what was actually
    /// recovered. Always yields exactly one `refund` flow, even when nothing
    /// could be taken.
    pub fn recover(&mut self, amount: Decimal, held_in: BalanceKind) -> DomainResult<Recovery> {
        Self::ensure_positive(amount)?;
        let balance = match held_in {
            BalanceKind::Available => &mut self.available,
            BalanceKind::Frozen => &mut self.frozen,
        };
        let before = *balance;
        let recovered = amount.min(before).max(Decimal::ZERO);
        *balance -= recovered;
        let after = *balance;

        self.total_earnings -= recovered;
        self.check_invariants()?;
        Ok(Recovery {
            recovered,
            shortfall: amount - recovered,
            flow: Self::draft(FlowType::Refund, held_in, before, after),
        })
    }
}

/// Outcome of [`CommissionAccount::recover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recovery {
    pub recovered: Decimal,
    /// Part of the commission the account could not give back.
    pub shortfall: Decimal,
    pub flow: FlowDraft,
}

impl Recovery {
    /// Ledger remark naming the order and any unrecovered amount.
    pub fn remark(&self, order_no: &str) -> String {
        if self.shortfall.is_zero() {
            order_no.to_string()
        } else {
            format!("{} unrecovered={}", order_no, self.shortfall)
        }
    }
}

/// Commission detail status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailStatus {
    Pending,
    Settled,
    Frozen,
}

impl DetailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetailStatus::Pending => "pending",
            DetailStatus::Settled => "settled",
            DetailStatus::Frozen => "frozen",
        }
    }
}

impl FromStr for DetailStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DetailStatus::Pending),
            "settled" => Ok(DetailStatus::Settled),
            "frozen" => Ok(DetailStatus::Frozen),
            _ => Err(format!("Invalid detail status: {}", s)),
        }
    }
}

/// Commission earned by a referrer on one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionDetail {
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
    pub status: DetailStatus,
    pub settle_time: Option<DateTime<Utc>>,
    /// Set when the order was refunded and the commission voided.
    pub voided_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl CommissionDetail {
    /// Sub-balance currently holding this commission.
    pub fn held_in(&self) -> BalanceKind {
        match self.status {
            DetailStatus::Frozen => BalanceKind::Frozen,
            DetailStatus::Pending | DetailStatus::Settled => BalanceKind::Available,
        }
    }
}

/// A commission-rate band.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionTier {
    pub id: i64,
    pub name: String,
    pub min_subordinates: i32,
    pub rate: Decimal,
    pub sort: i32,
    /// 1 enabled, 0 disabled.
    pub status: i16,
}

impl CommissionTier {
    pub fn is_enabled(&self) -> bool {
        self.status == 1
    }
}

/// Request payload for creating or replacing a tier.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TierRequest {
    #[validate(length(min = 1, max = 50, message = "Tier name must be 1-50 characters"))]
    pub name: String,

    #[validate(range(min = 0, message = "min_subordinates must be non-negative"))]
    pub min_subordinates: i32,

    pub rate: Decimal,

    #[serde(default)]
    pub sort: i32,

    #[validate(range(min = 0, max = 1, message = "Status must be 0 or 1"))]
    pub status: i16,
}

/// Customer view of their commission state.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionOverview {
    pub available: Decimal,
    pub frozen: Decimal,
    pub total_earnings: Decimal,
    pub withdrawn: Decimal,
    pub direct_referrals: i64,
    pub tier_name: Option<String>,
    pub tier_rate: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn account(available: &str, frozen: &str, total: &str) -> CommissionAccount {
        CommissionAccount {
            id: 1,
            user_id: 9,
            available: dec(available),
            frozen: dec(frozen),
            total_earnings: dec(total),
            withdrawn: Decimal::ZERO,
        }
    }

    #[test]
    fn test_credit_available_records_commission_in() {
        let mut acc = CommissionAccount::empty(1, 9);
        let flow = acc.credit_available(dec("2.40")).unwrap();
        assert_eq!(flow.flow_type, FlowType::CommissionIn);
        assert_eq!(flow.amount, dec("2.40"));
        assert_eq!((flow.balance_before, flow.balance_after), (dec("0"), dec("2.40")));
        assert_eq!(acc.total_earnings, dec("2.40"));
    }

    #[test]
    fn test_freeze_then_unfreeze_restores_balance() {
        let mut acc = account("100", "0", "100");
        let original = acc.clone();

        let freeze = acc.freeze(dec("30")).unwrap();
        assert_eq!((acc.available, acc.frozen), (dec("70"), dec("30")));
        assert_eq!((freeze.balance_before, freeze.balance_after), (dec("100"), dec("70")));

        let unfreeze = acc.unfreeze(dec("30")).unwrap();
        assert_eq!(acc, original);
        assert_eq!(freeze.amount, -unfreeze.amount);
    }

    #[test]
    fn test_freeze_rejects_overdraft() {
        let mut acc = account("10", "0", "10");
        assert!(matches!(acc.freeze(dec("10.01")), Err(DomainError::PreconditionFailed(_))));
        assert_eq!(acc.available, dec("10"));
    }

    #[test]
    fn test_withdraw_out_moves_frozen_to_withdrawn() {
        let mut acc = account("70", "30", "100");
        let flow = acc.withdraw_out(dec("30")).unwrap();
        assert_eq!(flow.flow_type, FlowType::WithdrawOut);
        assert_eq!(flow.balance_kind, BalanceKind::Frozen);
        assert_eq!(acc.frozen, Decimal::ZERO);
        assert_eq!(acc.withdrawn, dec("30"));
        assert!(acc.check_invariants().is_ok());
    }

    #[test]
    fn test_recover_settled_commission_never_touches_withdrawal_reserve() {
        let mut acc = CommissionAccount::empty(1, 9);
        acc.credit_available(dec("30")).unwrap();
        acc.freeze(dec("30")).unwrap();

        let recovery = acc.recover(dec("30"), BalanceKind::Available).unwrap();
        assert_eq!(recovery.recovered, Decimal::ZERO);
        assert_eq!(recovery.shortfall, dec("30"));
        assert_eq!(recovery.flow.amount, Decimal::ZERO);
        assert_eq!(acc.frozen, dec("30"));

        // The pending withdrawal can still be rejected or paid out.
        let mut rejected = acc.clone();
        assert!(rejected.unfreeze(dec("30")).is_ok());
        assert!(acc.withdraw_out(dec("30")).is_ok());
        assert!(acc.check_invariants().is_ok());
    }

    #[test]
    fn test_recover_partial_reports_shortfall_in_one_flow() {
        let mut acc = account("1", "2", "10");
        acc.withdrawn = dec("7");
        let recovery = acc.recover(dec("5"), BalanceKind::Available).unwrap();
        assert_eq!(recovery.recovered, dec("1"));
        assert_eq!(recovery.shortfall, dec("4"));
        assert_eq!(recovery.flow.flow_type, FlowType::Refund);
        assert_eq!(recovery.flow.balance_kind, BalanceKind::Available);
        assert_eq!((recovery.flow.balance_before, recovery.flow.balance_after), (dec("1"), Decimal::ZERO));
        assert_eq!((acc.available, acc.frozen), (Decimal::ZERO, dec("2")));
        assert_eq!(acc.total_earnings, dec("9"));
        assert_eq!(recovery.remark("O1"), "O1 unrecovered=4");
        assert!(acc.check_invariants().is_ok());
    }

    #[test]
    fn test_recover_held_commission_comes_from_frozen() {
        let mut acc = account("5", "5", "10");
        let recovery = acc.recover(dec("4"), BalanceKind::Frozen).unwrap();
        assert_eq!(recovery.recovered, dec("4"));
        assert!(recovery.shortfall.is_zero());
        assert_eq!(recovery.flow.balance_kind, BalanceKind::Frozen);
        assert_eq!(recovery.remark("O2"), "O2");
        assert_eq!(acc.frozen, dec("1"));
        assert_eq!(acc.available, dec("5"));
    }

    #[test]
    fn test_invariant_violation_detected() {
        let acc = account("100", "0", "50");
        assert!(acc.check_invariants().is_err());
    }
}
