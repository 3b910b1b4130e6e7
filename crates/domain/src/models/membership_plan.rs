//! Membership plans and their cross-field invariants.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::platform::{Platform, PlatformSet};
use crate::error::{DomainError, DomainResult};

/// Billing period of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Monthly,
    Yearly,
    Lifetime,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanType::Monthly => "monthly",
            PlanType::Yearly => "yearly",
            PlanType::Lifetime => "lifetime",
        }
    }
}

impl FromStr for PlanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(PlanType::Monthly),
            "yearly" => Ok(PlanType::Yearly),
            "lifetime" => Ok(PlanType::Lifetime),
            _ => Err(format!("Invalid plan type: {}", s)),
        }
    }
}

impl fmt::Display for PlanType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A purchasable membership plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPlan {
    pub id: i64,
    pub plan_code: String,
    pub plan_name: String,
    pub plan_type: PlanType,
    pub platforms: PlatformSet,
    pub duration_days: Option<i32>,
    pub base_price: Decimal,
    pub final_price: Decimal,
    pub discount_percentage: Decimal,
    pub currency: String,
    pub daily_download_limit: Option<i32>,
    pub monthly_download_limit: Option<i32>,
    pub is_active: bool,
    pub is_featured: bool,
    pub sort_order: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MembershipPlan {
    pub fn is_lifetime(&self) -> bool {
        self.plan_type == PlanType::Lifetime
    }

    /// Length of one period; `None` for lifetime plans.
    pub fn duration(&self) -> Option<Duration> {
        self.duration_days.map(|d| Duration::days(d as i64))
    }

    pub fn covers(&self, platform: Platform) -> bool {
        self.platforms.contains(platform)
    }
}

fn default_currency() -> String {
    "CNY".to_string()
}

fn default_true() -> bool {
    true
}

/// All writable plan fields. Used for create and as the merge target of an update.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PlanDraft {
    #[validate(custom(function = "shared::validation::validate_code"))]
    pub plan_code: String,

    #[validate(length(min = 1, max = 100, message = "Plan name must be 1-100 characters"))]
    pub plan_name: String,

    pub plan_type: PlanType,

    pub platforms: PlatformSet,

    pub duration_days: Option<i32>,

    pub base_price: Decimal,

    pub final_price: Decimal,

    #[serde(default)]
    pub discount_percentage: Decimal,

    #[serde(default = "default_currency")]
    #[validate(length(equal = 3, message = "Currency must be an ISO 4217 code"))]
    pub currency: String,

    pub daily_download_limit: Option<i32>,

    pub monthly_download_limit: Option<i32>,

    #[serde(default = "default_true")]
    pub is_active: bool,

    #[serde(default)]
    pub is_featured: bool,

    #[serde(default)]
    pub sort_order: i32,

    pub description: Option<String>,
}

/// Tolerance between the stated final price and the one implied by the discount.
pub const DISCOUNT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

impl PlanDraft {
    /// Enforces the plan invariants and normalizes lifetime plans.
    ///
    /// A lifetime plan never carries `duration_days`; any other plan must.
    pub fn into_checked(mut self) -> DomainResult<PlanDraft> {
        self.validate()?;

        match self.plan_type {
            PlanType::Lifetime => self.duration_days = None,
            _ => match self.duration_days {
                Some(d) if d > 0 => {}
                _ => {
                    return Err(DomainError::invalid(
                        "duration_days must be positive for non-lifetime plans",
                    ))
                }
            },
        }

        if self.platforms.is_empty() {
            return Err(DomainError::invalid("A plan must cover at least one platform"));
        }

        if self.base_price.is_sign_negative() || self.final_price.is_sign_negative() {
            return Err(DomainError::invalid("Prices must not be negative"));
        }
        if self.final_price > self.base_price {
            return Err(DomainError::invalid("final_price must not exceed base_price"));
        }

        let d = self.discount_percentage;
        if d.is_sign_negative() || d > Decimal::ONE_HUNDRED {
            return Err(DomainError::invalid("discount_percentage must be within 0-100"));
        }
        if d > Decimal::ZERO {
            let implied = self.base_price * (Decimal::ONE_HUNDRED - d) / Decimal::ONE_HUNDRED;
            if (self.final_price - implied).abs() > DISCOUNT_TOLERANCE {
                return Err(DomainError::invalid(format!(
                    "final_price {} does not match base_price {} with {}% discount",
                    self.final_price, self.base_price, d
                )));
            }
        }

        if matches!(self.daily_download_limit, Some(n) if n < 0)
            || matches!(self.monthly_download_limit, Some(n) if n < 0)
        {
            return Err(DomainError::invalid("Download limits must not be negative"));
        }
        if let (Some(daily), Some(monthly)) =
            (self.daily_download_limit, self.monthly_download_limit)
        {
            if (daily as i64) * 30 > monthly as i64 {
                return Err(DomainError::invalid(
                    "daily_download_limit * 30 must not exceed monthly_download_limit",
                ));
            }
        }

        Ok(self)
    }
}

impl From<&MembershipPlan> for PlanDraft {
    fn from(plan: &MembershipPlan) -> Self {
        Self {
            plan_code: plan.plan_code.clone(),
            plan_name: plan.plan_name.clone(),
            plan_type: plan.plan_type,
            platforms: plan.platforms.clone(),
            duration_days: plan.duration_days,
            base_price: plan.base_price,
            final_price: plan.final_price,
            discount_percentage: plan.discount_percentage,
            currency: plan.currency.clone(),
            daily_download_limit: plan.daily_download_limit,
            monthly_download_limit: plan.monthly_download_limit,
            is_active: plan.is_active,
            is_featured: plan.is_featured,
            sort_order: plan.sort_order,
            description: plan.description.clone(),
        }
    }
}

/// Partial update of a plan.
///
/// Nullable limits use a double option: absent keeps the stored value,
/// `null` clears it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePlanRequest {
    pub plan_code: Option<String>,
    pub plan_name: Option<String>,
    pub plan_type: Option<PlanType>,
    pub platforms: Option<PlatformSet>,
    #[serde(default, deserialize_with = "double_option")]
    pub duration_days: Option<Option<i32>>,
    pub base_price: Option<Decimal>,
    pub final_price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub daily_download_limit: Option<Option<i32>>,
    #[serde(default, deserialize_with = "double_option")]
    pub monthly_download_limit: Option<Option<i32>>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub sort_order: Option<i32>,
    pub description: Option<String>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl UpdatePlanRequest {
    /// Merges the update onto the stored plan; the result still needs checking.
    pub fn apply_to(self, plan: &MembershipPlan) -> PlanDraft {
        let mut draft = PlanDraft::from(plan);
        if let Some(v) = self.plan_code {
            draft.plan_code = v;
        }
        if let Some(v) = self.plan_name {
            draft.plan_name = v;
        }
        if let Some(v) = self.plan_type {
            draft.plan_type = v;
        }
        if let Some(v) = self.platforms {
            draft.platforms = v;
        }
        if let Some(v) = self.duration_days {
            draft.duration_days = v;
        }
        if let Some(v) = self.base_price {
            draft.base_price = v;
        }
        if let Some(v) = self.final_price {
            draft.final_price = v;
        }
        if let Some(v) = self.discount_percentage {
            draft.discount_percentage = v;
        }
        if let Some(v) = self.currency {
            draft.currency = v;
        }
        if let Some(v) = self.daily_download_limit {
            draft.daily_download_limit = v;
        }
        if let Some(v) = self.monthly_download_limit {
            draft.monthly_download_limit = v;
        }
        if let Some(v) = self.is_active {
            draft.is_active = v;
        }
        if let Some(v) = self.is_featured {
            draft.is_featured = v;
        }
        if let Some(v) = self.sort_order {
            draft.sort_order = v;
        }
        if self.description.is_some() {
            draft.description = self.description;
        }
        draft
    }
}

/// Query filter for the admin plan list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanFilter {
    pub code: Option<String>,
    pub name: Option<String>,
    pub plan_type: Option<PlanType>,
    /// Comma-separated platform names; a plan matches if it covers any of them.
    pub platforms: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub is_active: Option<bool>,
    pub is_featured: Option<bool>,
    pub created_from: Option<DateTime<Utc>>,
    pub created_to: Option<DateTime<Utc>>,
}

impl PlanFilter {
    pub fn platform_names(&self) -> DomainResult<Vec<String>> {
        let Some(raw) = self.platforms.as_deref() else {
            return Ok(Vec::new());
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<Platform>()
                    .map(|p| p.as_str().to_string())
                    .map_err(DomainError::InvalidInput)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    fn draft() -> PlanDraft {
        PlanDraft {
            plan_code: "VIP_MONTH".into(),
            plan_name: "VIP Monthly".into(),
            plan_type: PlanType::Monthly,
            platforms: PlatformSet::new([Platform::Android, Platform::Ios]),
            duration_days: Some(30),
            base_price: dec("40.00"),
            final_price: dec("30.00"),
            discount_percentage: dec("25"),
            currency: "CNY".into(),
            daily_download_limit: Some(2),
            monthly_download_limit: Some(60),
            is_active: true,
            is_featured: false,
            sort_order: 0,
            description: None,
        }
    }

    #[test]
    fn test_valid_plan_passes() {
        assert!(draft().into_checked().is_ok());
    }

    #[test]
    fn test_final_above_base_rejected() {
        let mut d = draft();
        d.discount_percentage = Decimal::ZERO;
        d.final_price = dec("41.00");
        assert!(d.into_checked().is_err());
    }

    #[test]
    fn test_discount_tolerance() {
        let mut d = draft();
        d.final_price = dec("30.01");
        assert!(d.clone().into_checked().is_ok());
        d.final_price = dec("29.98");
        assert!(d.into_checked().is_err());
    }

    #[test]
    fn test_daily_times_thirty_must_fit_monthly() {
        let mut d = draft();
        d.daily_download_limit = Some(3);
        d.monthly_download_limit = Some(60);
        assert!(d.into_checked().is_err());
    }

    #[test]
    fn test_lifetime_nulls_duration() {
        let mut d = draft();
        d.plan_type = PlanType::Lifetime;
        let checked = d.into_checked().unwrap();
        assert_eq!(checked.duration_days, None);
    }

    #[test]
    fn test_monthly_requires_duration() {
        let mut d = draft();
        d.duration_days = None;
        assert!(d.into_checked().is_err());
    }

    #[test]
    fn test_update_switch_to_lifetime_clears_duration() {
        let now = Utc::now();
        let d = draft();
        let plan = MembershipPlan {
            id: 1,
            plan_code: d.plan_code,
            plan_name: d.plan_name,
            plan_type: d.plan_type,
            platforms: d.platforms,
            duration_days: d.duration_days,
            base_price: d.base_price,
            final_price: d.final_price,
            discount_percentage: d.discount_percentage,
            currency: d.currency,
            daily_download_limit: d.daily_download_limit,
            monthly_download_limit: d.monthly_download_limit,
            is_active: true,
            is_featured: false,
            sort_order: 0,
            description: None,
            created_at: now,
            updated_at: now,
        };
        let update = UpdatePlanRequest {
            plan_type: Some(PlanType::Lifetime),
            ..Default::default()
        };
        let checked = update.apply_to(&plan).into_checked().unwrap();
        assert_eq!(checked.duration_days, None);
        assert_eq!(checked.plan_type, PlanType::Lifetime);
    }

    #[test]
    fn test_update_null_clears_limit() {
        let req: UpdatePlanRequest =
            serde_json::from_str(r#"{"dailyDownloadLimit": null}"#).unwrap();
        assert_eq!(req.daily_download_limit, Some(None));
        let req: UpdatePlanRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.daily_download_limit, None);
    }

    #[test]
    fn test_filter_platform_names() {
        let filter = PlanFilter {
            platforms: Some("android, IOS".into()),
            ..Default::default()
        };
        assert_eq!(filter.platform_names().unwrap(), vec!["android", "ios"]);

        let bad = PlanFilter {
            platforms: Some("symbian".into()),
            ..Default::default()
        };
        assert!(bad.platform_names().is_err());
    }
}
