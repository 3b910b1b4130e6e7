//! Custom Axum extractors.

pub mod auth;
pub mod client;

pub use auth::{ProjectOperator, WebUser, TOKEN_HEADER};
pub use client::ClientMeta;
