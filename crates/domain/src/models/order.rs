//! Membership orders and payment callbacks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::platform::Platform;
use crate::error::{DomainError, DomainResult};
use crate::money::parse_amount;

/// Reason recorded on orders cancelled by the expiry job.
pub const EXPIRED_REASON: &str = "expired";

/// Order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
            OrderStatus::Refunded => "refunded",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// `paid -> refunded` happens when a refund is applied; `refunded -> paid`
    /// when that refund is cancelled.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Paid)
                | (Pending, Failed)
                | (Pending, Cancelled)
                | (Paid, Refunded)
                | (Refunded, Paid)
        )
    }

    pub fn ensure_transition(&self, next: OrderStatus) -> DomainResult<()> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(DomainError::illegal_transition("Order", self, next))
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "failed" => Ok(OrderStatus::Failed),
            "refunded" => Ok(OrderStatus::Refunded),
            "cancelled" => Ok(OrderStatus::Cancelled),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of purchase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    #[default]
    New,
    Renew,
    Upgrade,
    Downgrade,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::New => "new",
            OrderType::Renew => "renew",
            OrderType::Upgrade => "upgrade",
            OrderType::Downgrade => "downgrade",
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A membership order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub order_no: String,
    pub user_id: i64,
    pub plan_id: i64,
    pub plan_code: String,
    pub plan_name: String,
    pub platform: Platform,
    pub order_type: OrderType,
    pub original_price: Decimal,
    pub discount_amount: Decimal,
    pub upgrade_credit: Decimal,
    pub final_amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub payment_id: Option<String>,
    pub status: OrderStatus,
    pub fail_reason: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub expires_at: DateTime<Utc>,
    pub previous_membership_id: Option<i64>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An order about to be inserted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub order_no: String,
    pub user_id: i64,
    pub plan_id: i64,
    pub plan_code: String,
    pub plan_name: String,
    pub platform: Platform,
    pub order_type: OrderType,
    pub original_price: Decimal,
    pub discount_amount: Decimal,
    pub upgrade_credit: Decimal,
    pub final_amount: Decimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub previous_membership_id: Option<i64>,
}

/// Customer purchase intent.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub plan_id: i64,

    #[serde(default)]
    pub order_type: OrderType,

    pub platform: Platform,

    #[validate(length(min = 1, max = 32, message = "Payment method must be 1-32 characters"))]
    pub payment_method: Option<String>,
}

/// Outcome reported by a payment provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackStatus {
    Success,
    Failed,
}

impl CallbackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackStatus::Success => "success",
            CallbackStatus::Failed => "failed",
        }
    }
}

/// Payment callback envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCallback {
    #[serde(alias = "order_no")]
    pub order_no: String,
    #[serde(alias = "payment_id")]
    pub payment_id: String,
    pub status: CallbackStatus,
    #[serde(default, alias = "fail_reason")]
    pub fail_reason: Option<String>,
    pub signature: String,
    pub timestamp: i64,
    /// Kept verbatim so the signed string matches what the provider signed.
    #[serde(deserialize_with = "amount_text")]
    pub amount: String,
}

fn amount_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

impl PaymentCallback {
    /// The string covered by the callback signature.
    pub fn canonical_string(&self) -> String {
        format!(
            "order_no={}&payment_id={}&status={}&amount={}&timestamp={}",
            self.order_no,
            self.payment_id,
            self.status.as_str(),
            self.amount,
            self.timestamp
        )
    }

    pub fn parsed_amount(&self) -> DomainResult<Decimal> {
        parse_amount(&self.amount)
            .ok_or_else(|| DomainError::invalid(format!("Invalid callback amount: {}", self.amount)))
    }

    /// Rejects callbacks older than `window_secs`, or further than that in the future.
    pub fn ensure_fresh(&self, now: DateTime<Utc>, window_secs: i64) -> DomainResult<()> {
        let age = now.timestamp() - self.timestamp;
        if age > window_secs || age < -window_secs {
            return Err(DomainError::invalid("Callback timestamp outside the accepted window"));
        }
        Ok(())
    }
}

/// What a verified callback does to its order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    MarkPaid,
    MarkFailed(String),
    /// Replay of an already applied callback.
    NoOp,
}

/// Decides how a verified callback applies to the order's current state.
pub fn classify_callback(order: &Order, callback: &PaymentCallback) -> DomainResult<CallbackAction> {
    let same_payment = order.payment_id.as_deref() == Some(callback.payment_id.as_str());

    match (order.status, callback.status) {
        (OrderStatus::Pending, CallbackStatus::Success) => {
            let amount = callback.parsed_amount()?;
            if amount != order.final_amount {
                return Err(DomainError::precondition(format!(
                    "Callback amount {} does not match order amount {}",
                    amount, order.final_amount
                )));
            }
            Ok(CallbackAction::MarkPaid)
        }
        (OrderStatus::Pending, CallbackStatus::Failed) => Ok(CallbackAction::MarkFailed(
            callback
                .fail_reason
                .clone()
                .unwrap_or_else(|| "payment failed".to_string()),
        )),
        (OrderStatus::Paid | OrderStatus::Refunded, _) if same_payment => Ok(CallbackAction::NoOp),
        (OrderStatus::Paid | OrderStatus::Refunded, _) => Err(DomainError::conflict(format!(
            "Order {} was already paid with a different payment id",
            order.order_no
        ))),
        (OrderStatus::Failed, CallbackStatus::Failed) => Ok(CallbackAction::NoOp),
        (from, CallbackStatus::Success) => Err(DomainError::illegal_transition(
            "Order",
            from,
            OrderStatus::Paid,
        )),
        (from, CallbackStatus::Failed) => Err(DomainError::illegal_transition(
            "Order",
            from,
            OrderStatus::Failed,
        )),
    }
}

/// Operator escape hatch on an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ManualProcessType {
    #[serde(alias = "confirm_payment")]
    ConfirmPayment,
    #[serde(alias = "mark_failed")]
    MarkFailed,
    #[serde(alias = "force_refund")]
    ForceRefund,
}

/// Request payload for the manual process endpoint.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ManualProcessRequest {
    pub order_id: i64,
    pub process_type: ManualProcessType,
    #[validate(length(max = 500, message = "Note must be at most 500 characters"))]
    pub note: Option<String>,
    /// Required for confirm-payment and force-refund.
    pub payment_id: Option<String>,
    pub totp_code: Option<String>,
}

/// Query filter for the admin order list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<i64>,
    pub order_no: Option<String>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}
