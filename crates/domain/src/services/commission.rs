//! Tier resolution and commission emission rules.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::error::{DomainError, DomainResult};
use crate::models::commission::{BalanceKind, CommissionDetail, CommissionTier, DetailStatus};
use crate::models::sys_config::{CommissionSettings, SettlementPolicy};
use crate::money::percent_of;

/// Highest enabled tier whose threshold the referral count reaches.
///
/// Falls back to the enabled zero-threshold tier, which the tier set always has.
pub fn resolve_tier(tiers: &[CommissionTier], direct_referrals: i64) -> Option<&CommissionTier> {
    tiers
        .iter()
        .filter(|t| t.is_enabled() && i64::from(t.min_subordinates) <= direct_referrals)
        .max_by_key(|t| t.min_subordinates)
        .or_else(|| {
            tiers
                .iter()
                .find(|t| t.is_enabled() && t.min_subordinates == 0)
        })
}

/// Checks a whole tier set before it is committed.
///
/// Thresholds are unique and non-negative, rates are within 0-100, and
/// exactly one enabled tier has a zero threshold.
pub fn validate_tier_set(tiers: &[CommissionTier]) -> DomainResult<()> {
    let mut seen = HashSet::new();
    for tier in tiers {
        if tier.min_subordinates < 0 {
            return Err(DomainError::invalid("min_subordinates must be non-negative"));
        }
        if !seen.insert(tier.min_subordinates) {
            return Err(DomainError::conflict(format!(
                "A tier with min_subordinates {} already exists",
                tier.min_subordinates
            )));
        }
        if tier.rate.is_sign_negative() || tier.rate > Decimal::ONE_HUNDRED {
            return Err(DomainError::invalid("Tier rate must be within 0-100"));
        }
    }

    let fallbacks = tiers
        .iter()
        .filter(|t| t.is_enabled() && t.min_subordinates == 0)
        .count();
    if fallbacks != 1 {
        return Err(DomainError::precondition(
            "Exactly one enabled tier with min_subordinates 0 is required",
        ));
    }
    Ok(())
}

/// A commission to record for a referrer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommissionEmission {
    pub recipient_id: i64,
    pub tier_id: i64,
    pub tier_name: String,
    pub rate: Decimal,
    pub commission: Decimal,
    pub detail_status: DetailStatus,
    /// Where the amount is credited; nothing is credited for a zero commission.
    pub credit_to: BalanceKind,
}

/// Computes the commission owed to `referrer_id` on a paid order.
pub fn plan_emission(
    referrer_id: i64,
    order_amount: Decimal,
    tiers: &[CommissionTier],
    direct_referrals: i64,
    settings: &CommissionSettings,
) -> DomainResult<CommissionEmission> {
    let tier = resolve_tier(tiers, direct_referrals)
        .ok_or_else(|| DomainError::precondition("No enabled fallback commission tier"))?;

    let (detail_status, credit_to) = match settings.settlement_policy {
        SettlementPolicy::Immediate => (DetailStatus::Pending, BalanceKind::Available),
        SettlementPolicy::Hold => (DetailStatus::Frozen, BalanceKind::Frozen),
    };

    Ok(CommissionEmission {
        recipient_id: referrer_id,
        tier_id: tier.id,
        tier_name: tier.name.clone(),
        rate: tier.rate,
        commission: percent_of(order_amount, tier.rate),
        detail_status,
        credit_to,
    })
}

/// How the settlement job treats a detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Held amount becomes available.
    ReleaseHeld,
    /// Already available; only the status changes.
    MarkSettled,
    NotYet,
}

/// Decides whether a detail is due for settlement at `now`.
pub fn settlement_for(detail: &CommissionDetail, hold_days: i64, now: DateTime<Utc>) -> Settlement {
    if detail.voided_at.is_some() {
        return Settlement::NotYet;
    }
    let due = detail.created_at + Duration::days(hold_days) <= now;
    match detail.status {
        DetailStatus::Frozen if due => Settlement::ReleaseHeld,
        DetailStatus::Pending if due => Settlement::MarkSettled,
        _ => Settlement::NotYet,
    }
}
