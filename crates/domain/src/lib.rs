//! Domain layer for the App Shop backend.
//!
//! This crate contains:
//! - Domain models (applications, packages, plans, memberships, orders,
//!   refunds, commission ledger, withdrawals)
//! - Business rules and state machines as pure functions
//! - The domain error taxonomy and collaborator traits

pub mod error;
pub mod models;
pub mod money;
pub mod services;

pub use error::{DomainError, DomainResult};
