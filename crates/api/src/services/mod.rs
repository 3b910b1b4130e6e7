//! Application services shared by the HTTP handlers and background jobs.

pub mod auth;
pub mod bootstrap;
pub mod catalog;
pub mod commission;
pub mod downloads;
pub mod memberships;
pub mod object_store;
pub mod orders;
pub mod refunds;
pub mod withdrawals;

pub use auth::AuthService;
pub use catalog::CatalogService;
pub use commission::CommissionService;
pub use downloads::DownloadService;
pub use memberships::MembershipService;
pub use orders::{OrderService, PaymentOutcome};
pub use refunds::RefundService;
pub use withdrawals::WithdrawService;
