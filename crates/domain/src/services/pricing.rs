//! Order pricing and upgrade credit.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::{DomainError, DomainResult};
use crate::models::membership_plan::MembershipPlan;
use crate::models::order::OrderType;
use crate::models::platform::Platform;
use crate::models::user_membership::{MembershipWithPlan, UserMembership};
use crate::money::round_money;

const SECS_PER_DAY: i64 = 86_400;

/// Priced order, before numbering and persistence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderQuote {
    pub original_price: Decimal,
    pub discount_amount: Decimal,
    pub upgrade_credit: Decimal,
    pub final_amount: Decimal,
    pub previous_membership_id: Option<i64>,
}

/// Prorated residual value of a membership at `now`.
///
/// `plan.final_price * remaining / duration`, rounded to cents and clamped to
/// `[0, final_price]`. Lifetime memberships have no prorated value.
pub fn upgrade_credit(
    membership: &UserMembership,
    plan: &MembershipPlan,
    now: DateTime<Utc>,
) -> DomainResult<Decimal> {
    let (Some(days), Some(end)) = (plan.duration_days, membership.end_date) else {
        return Err(DomainError::precondition(
            "Lifetime memberships cannot be upgraded",
        ));
    };
    if days <= 0 {
        return Err(DomainError::precondition("Plan has no duration"));
    }

    let remaining_secs = (end - now).num_seconds().max(0);
    let total_secs = days as i64 * SECS_PER_DAY;
    let credit = plan.final_price * Decimal::from(remaining_secs) / Decimal::from(total_secs);
    Ok(round_money(credit).clamp(Decimal::ZERO, plan.final_price))
}

/// Prices an order for `plan`.
///
/// `memberships` are the buyer's effective memberships in preference order.
/// An upgrade credits the first one covering `platform`; a renewal links the
/// effective membership on the same plan, if any.
pub fn quote_order(
    plan: &MembershipPlan,
    order_type: OrderType,
    platform: Platform,
    memberships: &[MembershipWithPlan],
    now: DateTime<Utc>,
) -> DomainResult<OrderQuote> {
    if !plan.is_active {
        return Err(DomainError::precondition(format!(
            "Plan {} is not on sale",
            plan.plan_code
        )));
    }
    if !plan.covers(platform) {
        return Err(DomainError::invalid(format!(
            "Plan {} does not cover {}",
            plan.plan_code, platform
        )));
    }

    let original_price = plan.base_price;
    let discount_amount = (plan.base_price - plan.final_price).max(Decimal::ZERO);
    let mut upgrade_credit_amount = Decimal::ZERO;
    let mut previous_membership_id = None;

    match order_type {
        OrderType::Upgrade => {
            let current = memberships
                .iter()
                .find(|m| m.covers(platform))
                .ok_or_else(|| DomainError::precondition("No current membership to upgrade"))?;
            if current.plan.id == plan.id {
                return Err(DomainError::precondition(
                    "Upgrade target must differ from the current plan",
                ));
            }
            current.membership.ensure_replaceable()?;
            upgrade_credit_amount = upgrade_credit(&current.membership, &current.plan, now)?;
            previous_membership_id = Some(current.membership.id);
        }
        OrderType::Renew => {
            if plan.is_lifetime() {
                return Err(DomainError::precondition("Lifetime plans cannot be renewed"));
            }
            previous_membership_id = memberships
                .iter()
                .find(|m| m.plan.id == plan.id)
                .map(|m| m.membership.id);
        }
        OrderType::New | OrderType::Downgrade => {}
    }

    let payable = original_price - discount_amount;
    let upgrade_credit_amount = upgrade_credit_amount.min(payable);
    let final_amount = payable - upgrade_credit_amount;

    Ok(OrderQuote {
        original_price,
        discount_amount,
        upgrade_credit: upgrade_credit_amount,
        final_amount,
        previous_membership_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::membership_plan::PlanType;
    use crate::models::user_membership::test_support::{membership, plan};
    use chrono::{Duration, NaiveDate};

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 10).unwrap()
    }

    fn monthly_view(now: DateTime<Utc>) -> MembershipWithPlan {
        let p = plan(1, &[Platform::Android], None, None);
        let mut m = membership(11, &p, today());
        m.start_date = now - Duration::days(10);
        m.end_date = Some(m.start_date + Duration::days(30));
        MembershipWithPlan { membership: m, plan: p }
    }

    fn yearly() -> MembershipPlan {
        let mut p = plan(2, &[Platform::Android, Platform::Ios], None, None);
        p.plan_type = PlanType::Yearly;
        p.duration_days = Some(365);
        p.base_price = dec("300.00");
        p.final_price = dec("300.00");
        p
    }

    #[test]
    fn test_upgrade_credit_prorates_remaining_days() {
        let now = Utc::now();
        let current = monthly_view(now);
        let quote = quote_order(&yearly(), OrderType::Upgrade, Platform::Android, &[current], now).unwrap();
        assert_eq!(quote.upgrade_credit, dec("20.00"));
        assert_eq!(quote.final_amount, dec("280.00"));
        assert_eq!(quote.previous_membership_id, Some(11));
        assert_eq!(
            quote.final_amount,
            quote.original_price - quote.discount_amount - quote.upgrade_credit
        );
    }

    #[test]
    fn test_upgrade_without_membership_fails() {
        let now = Utc::now();
        assert!(matches!(
            quote_order(&yearly(), OrderType::Upgrade, Platform::Android, &[], now),
            Err(DomainError::PreconditionFailed(_))
        ));
    }

    #[test]
    fn test_upgrade_from_lifetime_fails() {
        let now = Utc::now();
        let mut current = monthly_view(now);
        current.plan.plan_type = PlanType::Lifetime;
        current.plan.duration_days = None;
        current.membership.end_date = None;
        assert!(quote_order(&yearly(), OrderType::Upgrade, Platform::Android, &[current], now).is_err());
    }

    #[test]
    fn test_credit_never_exceeds_payable() {
        let now = Utc::now();
        let mut current = monthly_view(now);
        current.plan.final_price = dec("500.00");
        let quote = quote_order(&yearly(), OrderType::Upgrade, Platform::Android, &[current], now).unwrap();
        assert_eq!(quote.final_amount, Decimal::ZERO);
        assert_eq!(quote.upgrade_credit, dec("300.00"));
    }

    #[test]
    fn test_credit_of_expired_membership_is_zero() {
        let now = Utc::now();
        let current = monthly_view(now - Duration::days(40));
        assert_eq!(
            upgrade_credit(&current.membership, &current.plan, now).unwrap(),
            Decimal::ZERO
        );
    }

    #[test]
    fn test_discount_carried_into_quote() {
        let now = Utc::now();
        let mut p = yearly();
        p.base_price = dec("400.00");
        let quote = quote_order(&p, OrderType::New, Platform::Ios, &[], now).unwrap();
        assert_eq!(quote.original_price, dec("400.00"));
        assert_eq!(quote.discount_amount, dec("100.00"));
        assert_eq!(quote.final_amount, dec("300.00"));
        assert_eq!(quote.previous_membership_id, None);
    }

    #[test]
    fn test_renew_links_same_plan_membership() {
        let now = Utc::now();
        let current = monthly_view(now);
        let p = current.plan.clone();
        let quote = quote_order(&p, OrderType::Renew, Platform::Android, &[current], now).unwrap();
        assert_eq!(quote.previous_membership_id, Some(11));
        assert_eq!(quote.upgrade_credit, Decimal::ZERO);
    }

    #[test]
    fn test_platform_must_be_covered() {
        let now = Utc::now();
        let p = plan(3, &[Platform::Android], None, None);
        assert!(matches!(
            quote_order(&p, OrderType::New, Platform::Ios, &[], now),
            Err(DomainError::InvalidInput(_))
        ));
    }
}
