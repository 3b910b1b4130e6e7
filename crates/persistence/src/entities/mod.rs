//! Database entity definitions.
//!
//! Entities are direct mappings to database rows.

/// Declares a Postgres enum mirror of a domain enum, with conversions both ways.
macro_rules! db_enum {
    ($(#[$meta:meta])* $db:ident, $domain:ident, $type_name:literal, { $($variant:ident),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
        #[sqlx(type_name = $type_name, rename_all = "snake_case")]
        pub enum $db {
            $($variant),+
        }

        impl From<$db> for $domain {
            fn from(value: $db) -> Self {
                match value {
                    $($db::$variant => $domain::$variant),+
                }
            }
        }

        impl From<$domain> for $db {
            fn from(value: $domain) -> Self {
                match value {
                    $($domain::$variant => $db::$variant),+
                }
            }
        }
    };
}

pub mod app_account;
pub mod app_package;
pub mod application;
pub mod commission;
pub mod membership_plan;
pub mod order;
pub mod payment_account;
pub mod refund;
pub mod sys_config;
pub mod user;
pub mod user_membership;
pub mod withdraw;

pub use app_account::{AppAccountEntity, AppAccountStatusDb};
pub use app_package::{AppPackageEntity, PackageStatusDb, PlatformDb};
pub use application::{AppStatusDb, ApplicationEntity, CategoryEntity};
pub use commission::{
    AccountFlowEntity, BalanceKindDb, CommissionAccountEntity, CommissionDetailEntity,
    CommissionTierEntity, DetailStatusDb, FlowTypeDb,
};
pub use membership_plan::{MembershipPlanEntity, PlanTypeDb};
pub use order::{OrderEntity, OrderStatusDb, OrderTypeDb};
pub use payment_account::PaymentAccountEntity;
pub use refund::{RefundEntity, RefundStatusDb, RefundTypeDb};
pub use sys_config::SysConfigEntity;
pub use user::{AccountStatusDb, OperatorEntity, UserEntity};
pub use user_membership::{MembershipStatusDb, UserMembershipEntity};
pub use withdraw::{WithdrawRecordEntity, WithdrawStatusDb, WithdrawTypeDb};
