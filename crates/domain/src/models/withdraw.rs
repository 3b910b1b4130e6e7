//! Withdrawal requests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{DomainError, DomainResult};

/// Payout channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawType {
    Alipay,
    Wechat,
    Bank,
}

impl WithdrawType {
    pub const ALL: [WithdrawType; 3] = [WithdrawType::Alipay, WithdrawType::Wechat, WithdrawType::Bank];

    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawType::Alipay => "alipay",
            WithdrawType::Wechat => "wechat",
            WithdrawType::Bank => "bank",
        }
    }
}

impl FromStr for WithdrawType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alipay" => Ok(WithdrawType::Alipay),
            "wechat" => Ok(WithdrawType::Wechat),
            "bank" => Ok(WithdrawType::Bank),
            _ => Err(format!("Invalid withdraw type: {}", s)),
        }
    }
}

impl fmt::Display for WithdrawType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Withdrawal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl WithdrawStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawStatus::Pending => "pending",
            WithdrawStatus::Approved => "approved",
            WithdrawStatus::Rejected => "rejected",
            WithdrawStatus::Completed => "completed",
            WithdrawStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: WithdrawStatus) -> bool {
        use WithdrawStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Approved, Completed)
                | (Approved, Rejected)
        )
    }

    pub fn ensure_transition(&self, next: WithdrawStatus) -> DomainResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::illegal_transition("Withdrawal", self, next))
        }
    }
}

impl FromStr for WithdrawStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawStatus::Pending),
            "approved" => Ok(WithdrawStatus::Approved),
            "rejected" => Ok(WithdrawStatus::Rejected),
            "completed" => Ok(WithdrawStatus::Completed),
            "cancelled" => Ok(WithdrawStatus::Cancelled),
            _ => Err(format!("Invalid withdraw status: {}", s)),
        }
    }
}

impl fmt::Display for WithdrawStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payout request. `account_no` is plaintext here; responses mask it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRecord {
    pub id: i64,
    pub user_id: i64,
    pub withdraw_no: String,
    pub amount: Decimal,
    pub fee: Decimal,
    pub actual_amount: Decimal,
    pub withdraw_type: WithdrawType,
    pub account_name: String,
    pub account_no: String,
    pub status: WithdrawStatus,
    pub reject_reason: Option<String>,
    pub audit_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WithdrawRecord {
    /// The record as returned to clients, with the account number masked.
    pub fn masked(mut self) -> Self {
        self.account_no = shared::validation::mask_account_no(&self.account_no);
        self
    }
}

/// Customer withdrawal request.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub amount: Decimal,

    pub withdraw_type: WithdrawType,

    #[validate(length(min = 1, max = 64, message = "Account name must be 1-64 characters"))]
    pub account_name: String,

    #[validate(length(min = 1, max = 64, message = "Account number must be 1-64 characters"))]
    pub account_no: String,
}

/// A validated withdrawal ready to be applied to an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawQuote {
    pub amount: Decimal,
    pub fee: Decimal,
    pub actual_amount: Decimal,
}

/// Admin list filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawFilter {
    pub status: Option<WithdrawStatus>,
    pub user_id: Option<i64>,
    pub withdraw_no: Option<String>,
}
