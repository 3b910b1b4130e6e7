//! Persistence layer for the App Shop backend.
//!
//! This crate contains:
//! - Database connection management and embedded migrations
//! - Entity definitions (database row mappings)
//! - Repository implementations, including the row-locking writes used
//!   inside service transactions

pub mod db;
pub mod entities;
pub mod error;
pub mod metrics;
pub mod repositories;

pub use error::{PersistenceError, PersistenceResult};
