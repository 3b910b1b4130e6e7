//! Refund sub-state machine carried alongside a refunded order.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{DomainError, DomainResult};

/// Refund status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Cancelled,
}

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Processing => "processing",
            RefundStatus::Success => "success",
            RefundStatus::Failed => "failed",
            RefundStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(&self, next: RefundStatus) -> bool {
        use RefundStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Success)
                | (Processing, Failed)
                | (Failed, Pending)
                | (Pending, Cancelled)
        )
    }

    pub fn ensure_transition(&self, next: RefundStatus) -> DomainResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::illegal_transition("Refund", self, next))
        }
    }
}

impl FromStr for RefundStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RefundStatus::Pending),
            "processing" => Ok(RefundStatus::Processing),
            "success" => Ok(RefundStatus::Success),
            "failed" => Ok(RefundStatus::Failed),
            "cancelled" => Ok(RefundStatus::Cancelled),
            _ => Err(format!("Invalid refund status: {}", s)),
        }
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Full or partial refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundType {
    Full,
    Partial,
}

impl RefundType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefundType::Full => "full",
            RefundType::Partial => "partial",
        }
    }
}

/// A refund of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: i64,
    pub refund_no: String,
    pub order_id: i64,
    pub refund_amount: Decimal,
    pub refund_type: RefundType,
    pub reason: Option<String>,
    pub status: RefundStatus,
    pub third_party_refund_id: Option<String>,
    pub operator_id: Option<i64>,
    pub operator_name: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Resolves the refund amount and type against the order total.
///
/// An omitted amount refunds in full; a full refund is exactly the order amount.
pub fn resolve_refund_amount(
    requested: Option<Decimal>,
    final_amount: Decimal,
) -> DomainResult<(Decimal, RefundType)> {
    let amount = requested.unwrap_or(final_amount);
    if amount <= Decimal::ZERO {
        return Err(DomainError::invalid("Refund amount must be positive"));
    }
    if amount > final_amount {
        return Err(DomainError::invalid(format!(
            "Refund amount {} exceeds order amount {}",
            amount, final_amount
        )));
    }
    let kind = if amount == final_amount {
        RefundType::Full
    } else {
        RefundType::Partial
    };
    Ok((amount, kind))
}

/// Operator request to refund an order.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ApplyRefundRequest {
    pub order_id: i64,

    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    pub reason: String,

    pub amount: Option<Decimal>,

    #[validate(length(equal = 6, message = "TOTP code must be 6 digits"))]
    pub totp_code: String,
}

/// Provider outcome for a processing refund.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRefundRequest {
    pub success: bool,
    pub third_party_refund_id: Option<String>,
    #[validate(length(max = 500, message = "Failure reason must be at most 500 characters"))]
    pub failure_reason: Option<String>,
}

/// Request payload carrying only a reason.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReasonRequest {
    #[validate(length(min = 1, max = 500, message = "Reason must be 1-500 characters"))]
    pub reason: String,
}
