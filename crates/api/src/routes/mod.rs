//! HTTP route handlers.
//!
//! `/web/*` modules take [`WebUser`](crate::extractors::WebUser),
//! `/project/*` modules take [`ProjectOperator`](crate::extractors::ProjectOperator).

pub mod app_accounts;
pub mod applications;
pub mod auth;
pub mod commission;
pub mod downloads;
pub mod health;
pub mod memberships;
pub mod orders;
pub mod packages;
pub mod payments;
pub mod plans;
pub mod refunds;
pub mod sys_config;
pub mod withdrawals;
