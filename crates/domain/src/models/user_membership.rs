//! User memberships and their download counters.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::membership_plan::MembershipPlan;
use super::order::{Order, OrderType};
use super::platform::Platform;
use crate::error::{DomainError, DomainResult};

/// Shown when every covering membership has used today's downloads.
pub const DAILY_QUOTA_MESSAGE: &str = "今日下载次数已用完，请明天再试";

/// Shown when daily room remains but the month is used up.
pub const MONTHLY_QUOTA_MESSAGE: &str = "本月下载次数已用完，请下月再试";

/// Lifecycle status of a membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    Active,
    Expired,
    Cancelled,
    Suspended,
    Replaced,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Active => "active",
            MembershipStatus::Expired => "expired",
            MembershipStatus::Cancelled => "cancelled",
            MembershipStatus::Suspended => "suspended",
            MembershipStatus::Replaced => "replaced",
        }
    }
}

impl FromStr for MembershipStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(MembershipStatus::Active),
            "expired" => Ok(MembershipStatus::Expired),
            "cancelled" => Ok(MembershipStatus::Cancelled),
            "suspended" => Ok(MembershipStatus::Suspended),
            "replaced" => Ok(MembershipStatus::Replaced),
            _ => Err(format!("Invalid membership status: {}", s)),
        }
    }
}

impl fmt::Display for MembershipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which download cap is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaKind {
    Daily,
    Monthly,
}

impl QuotaKind {
    pub fn message(&self) -> &'static str {
        match self {
            QuotaKind::Daily => DAILY_QUOTA_MESSAGE,
            QuotaKind::Monthly => MONTHLY_QUOTA_MESSAGE,
        }
    }
}

/// Download caps copied from a plan. `None` is unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuotaLimits {
    pub daily: Option<i32>,
    pub monthly: Option<i32>,
}

impl From<&MembershipPlan> for QuotaLimits {
    fn from(plan: &MembershipPlan) -> Self {
        Self {
            daily: plan.daily_download_limit,
            monthly: plan.monthly_download_limit,
        }
    }
}

/// A user's membership on one plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMembership {
    pub id: i64,
    pub user_id: i64,
    pub order_id: Option<i64>,
    pub plan_id: i64,
    pub plan_code: String,
    pub plan_name: String,
    pub status: MembershipStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub download_used_daily: i32,
    pub download_used_monthly: i32,
    pub last_reset_daily: NaiveDate,
    pub last_reset_monthly: NaiveDate,
    pub replaced_by: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserMembership {
    /// Active and not past its end date. Lifetime memberships never end.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.status == MembershipStatus::Active && self.end_date.map_or(true, |end| end > now)
    }

    /// Zeroes counters whose period has rolled over. Returns true if anything changed.
    pub fn reset_counters(&mut self, today: NaiveDate) -> bool {
        let mut changed = false;
        if self.last_reset_daily < today {
            self.download_used_daily = 0;
            self.last_reset_daily = today;
            changed = true;
        }
        let last = (self.last_reset_monthly.year(), self.last_reset_monthly.month());
        if last < (today.year(), today.month()) {
            self.download_used_monthly = 0;
            self.last_reset_monthly = today;
            changed = true;
        }
        changed
    }

    /// The first exhausted cap, if any. Daily is reported first.
    pub fn exhausted(&self, limits: QuotaLimits) -> Option<QuotaKind> {
        if limits.daily.is_some_and(|l| self.download_used_daily >= l) {
            Some(QuotaKind::Daily)
        } else if limits.monthly.is_some_and(|l| self.download_used_monthly >= l) {
            Some(QuotaKind::Monthly)
        } else {
            None
        }
    }

    /// Both caps must have room; an unset cap always has room.
    pub fn can_download(&self, limits: QuotaLimits) -> bool {
        self.exhausted(limits).is_none()
    }

    /// Counts one download against both counters.
    pub fn record_download(&mut self, limits: QuotaLimits) -> DomainResult<()> {
        if let Some(kind) = self.exhausted(limits) {
            return Err(DomainError::QuotaExceeded(kind.message().to_string()));
        }
        self.download_used_daily += 1;
        self.download_used_monthly += 1;
        Ok(())
    }

    /// Remaining downloads per cap; `None` is unlimited.
    pub fn remaining(&self, limits: QuotaLimits) -> (Option<i32>, Option<i32>) {
        (
            limits.daily.map(|l| (l - self.download_used_daily).max(0)),
            limits.monthly.map(|l| (l - self.download_used_monthly).max(0)),
        )
    }

    /// A membership may be replaced once, and only while active.
    pub fn ensure_replaceable(&self) -> DomainResult<()> {
        if self.status != MembershipStatus::Active || self.replaced_by.is_some() {
            return Err(DomainError::illegal_transition(
                "Membership",
                self.status,
                MembershipStatus::Replaced,
            ));
        }
        Ok(())
    }
}

/// A membership together with the plan it was bought on.
#[derive(Debug, Clone)]
pub struct MembershipWithPlan {
    pub membership: UserMembership,
    pub plan: MembershipPlan,
}

impl MembershipWithPlan {
    pub fn covers(&self, platform: Platform) -> bool {
        self.plan.covers(platform)
    }

    pub fn limits(&self) -> QuotaLimits {
        QuotaLimits::from(&self.plan)
    }
}

/// Customer view of a membership with remaining quota.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipSummary {
    pub id: i64,
    pub plan_id: i64,
    pub plan_code: String,
    pub plan_name: String,
    pub platforms: Vec<String>,
    pub status: MembershipStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub daily_limit: Option<i32>,
    pub monthly_limit: Option<i32>,
    pub daily_remaining: Option<i32>,
    pub monthly_remaining: Option<i32>,
}

impl MembershipSummary {
    /// Builds the view after resetting stale counters for `today`.
    pub fn new(view: &MembershipWithPlan, today: NaiveDate) -> Self {
        let mut m = view.membership.clone();
        m.reset_counters(today);
        let limits = view.limits();
        let (daily_remaining, monthly_remaining) = m.remaining(limits);
        Self {
            id: m.id,
            plan_id: m.plan_id,
            plan_code: m.plan_code,
            plan_name: m.plan_name,
            platforms: view.plan.platforms.names(),
            status: m.status,
            start_date: m.start_date,
            end_date: m.end_date,
            daily_limit: limits.daily,
            monthly_limit: limits.monthly,
            daily_remaining,
            monthly_remaining,
        }
    }
}

/// A membership about to be inserted for a paid order.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMembership {
    pub user_id: i64,
    pub order_id: i64,
    pub plan_id: i64,
    pub plan_code: String,
    pub plan_name: String,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub download_used_daily: i32,
    pub download_used_monthly: i32,
    pub last_reset_daily: NaiveDate,
    pub last_reset_monthly: NaiveDate,
}

impl NewMembership {
    /// Membership granted by a paid order.
    ///
    /// A renewal extends from the later of the old end date and `now` and
    /// carries the old counters; every other order starts fresh at `now`.
    pub fn for_paid_order(
        order: &Order,
        plan: &MembershipPlan,
        previous: Option<&UserMembership>,
        now: DateTime<Utc>,
        today: NaiveDate,
    ) -> Self {
        let duration = plan.duration();
        let renewal = match (order.order_type, previous) {
            (OrderType::Renew, Some(prev)) if prev.plan_id == plan.id => Some(prev),
            _ => None,
        };

        match renewal {
            Some(prev) => {
                let base = prev.end_date.map_or(now, |end| end.max(now));
                Self {
                    user_id: order.user_id,
                    order_id: order.id,
                    plan_id: plan.id,
                    plan_code: plan.plan_code.clone(),
                    plan_name: plan.plan_name.clone(),
                    start_date: now,
                    end_date: duration.map(|d| base + d),
                    download_used_daily: prev.download_used_daily,
                    download_used_monthly: prev.download_used_monthly,
                    last_reset_daily: prev.last_reset_daily,
                    last_reset_monthly: prev.last_reset_monthly,
                }
            }
            None => Self {
                user_id: order.user_id,
                order_id: order.id,
                plan_id: plan.id,
                plan_code: plan.plan_code.clone(),
                plan_name: plan.plan_name.clone(),
                start_date: now,
                end_date: duration.map(|d| now + d),
                download_used_daily: 0,
                download_used_monthly: 0,
                last_reset_daily: today,
                last_reset_monthly: today,
            },
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::membership_plan::PlanType;
    use crate::models::platform::PlatformSet;
    use rust_decimal::Decimal;

    pub fn plan(id: i64, platforms: &[Platform], daily: Option<i32>, monthly: Option<i32>) -> MembershipPlan {
        let now = Utc::now();
        MembershipPlan {
            id,
            plan_code: format!("PLAN_{}", id),
            plan_name: format!("Plan {}", id),
            plan_type: PlanType::Monthly,
            platforms: PlatformSet::new(platforms.iter().copied()),
            duration_days: Some(30),
            base_price: Decimal::new(3000, 2),
            final_price: Decimal::new(3000, 2),
            discount_percentage: Decimal::ZERO,
            currency: "CNY".into(),
            daily_download_limit: daily,
            monthly_download_limit: monthly,
            is_active: true,
            is_featured: false,
            sort_order: 0,
            description: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn membership(id: i64, plan: &MembershipPlan, today: NaiveDate) -> UserMembership {
        let now = Utc::now();
        UserMembership {
            id,
            user_id: 7,
            order_id: Some(100 + id),
            plan_id: plan.id,
            plan_code: plan.plan_code.clone(),
            plan_name: plan.plan_name.clone(),
            status: MembershipStatus::Active,
            start_date: now - chrono::Duration::days(1),
            end_date: plan.duration().map(|d| now + d),
            download_used_daily: 0,
            download_used_monthly: 0,
            last_reset_daily: today,
            last_reset_monthly: today,
            replaced_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use chrono::Duration;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_effective_requires_active_and_future_end() {
        let today = date(2024, 5, 10);
        let p = plan(1, &[Platform::Android], None, None);
        let now = Utc::now();

        let mut m = membership(1, &p, today);
        assert!(m.is_effective(now));

        m.end_date = Some(now - Duration::seconds(1));
        assert!(!m.is_effective(now));

        m.end_date = None;
        assert!(m.is_effective(now));

        m.status = MembershipStatus::Suspended;
        assert!(!m.is_effective(now));
    }

    #[test]
    fn test_daily_reset_keeps_monthly_within_month() {
        let p = plan(1, &[Platform::Android], Some(2), Some(60));
        let mut m = membership(1, &p, date(2024, 5, 9));
        m.download_used_daily = 2;
        m.download_used_monthly = 10;

        assert!(m.reset_counters(date(2024, 5, 10)));
        assert_eq!(m.download_used_daily, 0);
        assert_eq!(m.download_used_monthly, 10);
        assert_eq!(m.last_reset_daily, date(2024, 5, 10));
        assert!(!m.reset_counters(date(2024, 5, 10)));
    }

    #[test]
    fn test_monthly_reset_on_new_month_and_year() {
        let p = plan(1, &[Platform::Android], None, Some(60));
        let mut m = membership(1, &p, date(2023, 12, 31));
        m.download_used_monthly = 60;
        m.reset_counters(date(2024, 1, 1));
        assert_eq!(m.download_used_monthly, 0);
        assert_eq!(m.last_reset_monthly, date(2024, 1, 1));
    }

    #[test]
    fn test_can_download_needs_both_caps() {
        let today = date(2024, 5, 10);
        let limits = QuotaLimits {
            daily: Some(2),
            monthly: Some(60),
        };
        let p = plan(1, &[Platform::Android], Some(2), Some(60));
        let mut m = membership(1, &p, today);
        assert!(m.can_download(limits));

        m.download_used_monthly = 60;
        assert_eq!(m.exhausted(limits), Some(QuotaKind::Monthly));

        m.download_used_daily = 2;
        assert_eq!(m.exhausted(limits), Some(QuotaKind::Daily));

        assert!(m.can_download(QuotaLimits::default()));
    }

    #[test]
    fn test_record_download_respects_limit() {
        let today = date(2024, 5, 10);
        let p = plan(1, &[Platform::Android], Some(2), None);
        let limits = QuotaLimits::from(&p);
        let mut m = membership(1, &p, today);
        m.record_download(limits).unwrap();
        m.record_download(limits).unwrap();
        let err = m.record_download(limits).unwrap_err();
        assert_eq!(err, DomainError::QuotaExceeded(DAILY_QUOTA_MESSAGE.into()));
        assert_eq!(m.download_used_daily, 2);
        assert_eq!(m.download_used_monthly, 2);
    }

    #[test]
    fn test_remaining() {
        let p = plan(1, &[Platform::Android], Some(5), None);
        let mut m = membership(1, &p, date(2024, 5, 10));
        m.download_used_daily = 3;
        assert_eq!(m.remaining(QuotaLimits::from(&p)), (Some(2), None));
    }

    #[test]
    fn test_replaced_membership_cannot_be_replaced_again() {
        let p = plan(1, &[Platform::Android], None, None);
        let mut m = membership(1, &p, date(2024, 5, 10));
        assert!(m.ensure_replaceable().is_ok());
        m.status = MembershipStatus::Replaced;
        m.replaced_by = Some(2);
        assert!(matches!(m.ensure_replaceable(), Err(DomainError::Conflict(_))));
    }
}
