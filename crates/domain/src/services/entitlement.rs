//! Download authorization.
//!
//! [`decide`] is pure: the caller loads the application, its published
//! packages for the platform, the user's effective memberships (counters
//! already reset for today) and the free iOS credential list, then carries
//! out the returned [`Entitlement`].

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{DomainError, DomainResult};
use crate::models::app_package::{AppPackage, PackageStatus};
use crate::models::application::{AppStatus, Application};
use crate::models::platform::Platform;
use crate::models::user_membership::{MembershipWithPlan, QuotaKind};

/// Shown when the user holds no effective membership.
pub const UPGRADE_REQUIRED_MESSAGE: &str = "请升级会员后下载";

/// Shown when no membership plan covers the platform.
pub const PLATFORM_NOT_COVERED_MESSAGE: &str = "当前会员套餐不支持该平台";

/// Shown when the user's plans are not linked to the package.
pub const PLAN_NOT_LINKED_MESSAGE: &str = "当前会员套餐不包含该应用";

/// Shown when the free iOS credential list is empty.
pub const NO_FREE_IOS_ACCOUNT_MESSAGE: &str = "暂无可用的iOS共享账号";

/// Shown when a paid iOS app has no account left in its pool.
pub const NO_POOL_ACCOUNT_MESSAGE: &str = "暂无可用的iOS账号，请稍后再试";

/// What the caller must do to serve a download.
#[derive(Debug, Clone, PartialEq)]
pub enum Entitlement {
    /// Serve this package. Paid downloads name the membership to charge.
    SignPackage {
        package: AppPackage,
        membership_id: Option<i64>,
    },
    /// Hand out a free shared iOS credential.
    Credential(String),
    /// Hand out a credential from the app's account pool.
    PoolCredential { membership_id: i64 },
    Denied(String),
}

/// Inputs to a download decision.
#[derive(Debug, Clone, Copy)]
pub struct EntitlementInput<'a> {
    pub application: &'a Application,
    pub platform: Platform,
    /// Packages for `platform`, newest first.
    pub packages: &'a [AppPackage],
    /// Effective memberships, lifetime first, then by end date descending.
    pub memberships: &'a [MembershipWithPlan],
    /// Parsed free iOS credentials.
    pub ios_accounts: &'a [String],
    /// Plans linked to the newest package. Empty means every plan unlocks it.
    pub package_plan_ids: &'a [i64],
}

/// Outcome of choosing a membership for a platform.
#[derive(Debug, Clone, Copy)]
pub enum MembershipChoice<'a> {
    Chosen(&'a MembershipWithPlan),
    NoMembership,
    PlatformNotCovered,
    QuotaExhausted(QuotaKind),
}

impl MembershipChoice<'_> {
    /// The denial message for every outcome except `Chosen`.
    pub fn deny_message(&self) -> Option<&'static str> {
        match self {
            MembershipChoice::Chosen(_) => None,
            MembershipChoice::NoMembership => Some(UPGRADE_REQUIRED_MESSAGE),
            MembershipChoice::PlatformNotCovered => Some(PLATFORM_NOT_COVERED_MESSAGE),
            MembershipChoice::QuotaExhausted(kind) => Some(kind.message()),
        }
    }
}

/// Whether `membership` is on a plan that unlocks a package linked to `package_plan_ids`.
pub fn unlocks_package(membership: &MembershipWithPlan, package_plan_ids: &[i64]) -> bool {
    package_plan_ids.is_empty() || package_plan_ids.contains(&membership.plan.id)
}

/// Memberships that may be charged for a package download, in preference order.
pub fn download_candidates<'a>(
    memberships: &'a [MembershipWithPlan],
    platform: Platform,
    package_plan_ids: &[i64],
) -> Vec<&'a MembershipWithPlan> {
    memberships
        .iter()
        .filter(|m| m.covers(platform) && unlocks_package(m, package_plan_ids))
        .collect()
}

/// First membership that covers `platform` and still has quota.
///
/// When every covering membership is exhausted, a daily exhaustion wins over
/// a monthly one in the reported reason.
pub fn best_for_platform(memberships: &[MembershipWithPlan], platform: Platform) -> MembershipChoice<'_> {
    if memberships.is_empty() {
        return MembershipChoice::NoMembership;
    }

    let mut exhausted: Option<QuotaKind> = None;
    for candidate in memberships.iter().filter(|m| m.covers(platform)) {
        let limits = candidate.limits();
        if candidate.membership.can_download(limits) {
            return MembershipChoice::Chosen(candidate);
        }
        if let Some(QuotaKind::Daily) = candidate.membership.exhausted(limits) {
            exhausted = Some(QuotaKind::Daily);
        } else {
            exhausted.get_or_insert(QuotaKind::Monthly);
        }
    }

    match exhausted {
        Some(kind) => MembershipChoice::QuotaExhausted(kind),
        None => MembershipChoice::PlatformNotCovered,
    }
}

/// Decides whether a download is allowed and what artifact backs it.
pub fn decide<R: Rng + ?Sized>(input: EntitlementInput<'_>, rng: &mut R) -> DomainResult<Entitlement> {
    if !input.platform.is_downloadable() {
        return Err(DomainError::invalid(format!(
            "Platform {} is not supported for downloads",
            input.platform
        )));
    }
    if input.application.status != AppStatus::Active {
        return Err(DomainError::not_found(format!(
            "Application {}",
            input.application.app_id
        )));
    }

    let newest_package = input
        .packages
        .iter()
        .find(|p| p.platform == input.platform && p.status == PackageStatus::Published);

    if input.platform == Platform::Android && newest_package.is_none() {
        return Err(DomainError::not_found(format!(
            "No published android package for {}",
            input.application.app_id
        )));
    }

    if input.application.is_free {
        return Ok(match input.platform {
            Platform::Android => Entitlement::SignPackage {
                package: newest_package.cloned().ok_or_else(|| DomainError::internal("package vanished"))?,
                membership_id: None,
            },
            _ => match input.ios_accounts.choose(rng) {
                Some(credential) => Entitlement::Credential(credential.clone()),
                None => Entitlement::Denied(NO_FREE_IOS_ACCOUNT_MESSAGE.to_string()),
            },
        });
    }

    let linked: Vec<MembershipWithPlan>;
    let memberships = if input.platform == Platform::Android && !input.package_plan_ids.is_empty() {
        linked = input
            .memberships
            .iter()
            .filter(|m| unlocks_package(m, input.package_plan_ids))
            .cloned()
            .collect();
        if linked.is_empty() && !input.memberships.is_empty() {
            return Ok(Entitlement::Denied(PLAN_NOT_LINKED_MESSAGE.to_string()));
        }
        &linked[..]
    } else {
        input.memberships
    };

    let choice = best_for_platform(memberships, input.platform);
    let chosen = match choice {
        MembershipChoice::Chosen(m) => m,
        other => {
            return Ok(Entitlement::Denied(
                other.deny_message().unwrap_or(UPGRADE_REQUIRED_MESSAGE).to_string(),
            ))
        }
    };

    Ok(match input.platform {
        Platform::Android => Entitlement::SignPackage {
            package: newest_package.cloned().ok_or_else(|| DomainError::internal("package vanished"))?,
            membership_id: Some(chosen.membership.id),
        },
        _ => Entitlement::PoolCredential {
            membership_id: chosen.membership.id,
        },
    })
}
