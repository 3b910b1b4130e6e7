//! Repository implementations for database operations.
//!
//! Reads run against the pool. Methods taking `&mut PgConnection` are meant
//! to run inside a caller-owned transaction and lock the rows they return.

pub mod app_account;
pub mod app_package;
pub mod application;
pub mod commission;
pub mod download_log;
pub mod membership_plan;
pub mod order;
pub mod payment_account;
pub mod refund;
pub mod sys_config;
pub mod token_blacklist;
pub mod user;
pub mod user_membership;
pub mod withdraw;

pub use app_account::{AppAccountFilter, AppAccountRepository};
pub use app_package::AppPackageRepository;
pub use application::ApplicationRepository;
pub use commission::CommissionRepository;
pub use download_log::DownloadLogRepository;
pub use membership_plan::MembershipPlanRepository;
pub use order::OrderRepository;
pub use payment_account::PaymentAccountRepository;
pub use refund::{NewRefund, RefundRepository};
pub use sys_config::SysConfigRepository;
pub use token_blacklist::TokenBlacklistRepository;
pub use user::{NewUser, OperatorRepository, UserRepository};
pub use user_membership::UserMembershipRepository;
pub use withdraw::WithdrawRepository;
