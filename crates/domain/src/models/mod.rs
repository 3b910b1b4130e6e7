//! Domain models for the App Shop backend.

pub mod app_account;
pub mod app_package;
pub mod application;
pub mod commission;
pub mod download;
pub mod membership_plan;
pub mod order;
pub mod payment;
pub mod platform;
pub mod refund;
pub mod sys_config;
pub mod user;
pub mod user_membership;
pub mod withdraw;

pub use app_account::{AppAccount, AppAccountStatus};
pub use app_package::{AppPackage, PackageStatus};
pub use application::{AppStatus, Application, Category};
pub use commission::{
    AccountFlow, BalanceKind, CommissionAccount, CommissionDetail, CommissionTier, DetailStatus,
    FlowDraft, FlowLinks, FlowType,
};
pub use download::{DownloadDecision, DownloadLog};
pub use membership_plan::{MembershipPlan, PlanDraft, PlanFilter, PlanType};
pub use order::{NewOrder, Order, OrderStatus, OrderType, PaymentCallback};
pub use payment::{PaymentAccount, ProviderConfig};
pub use platform::{Platform, PlatformSet};
pub use refund::{Refund, RefundStatus, RefundType};
pub use sys_config::{CommissionSettings, SettlementPolicy};
pub use user::{AccountStatus, Operator, User};
pub use user_membership::{MembershipStatus, MembershipWithPlan, QuotaLimits, UserMembership};
pub use withdraw::{WithdrawRecord, WithdrawStatus, WithdrawType};
