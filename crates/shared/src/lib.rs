//! Shared utilities and common types for the App Shop backend.
//!
//! This crate provides common functionality used across all other crates:
//! - Cryptographic utilities (hashing, request signing, credential encryption)
//! - JWT handling for the `x-token` header
//! - Password hashing with Argon2id and operator TOTP verification
//! - Page-based pagination and common validation logic

pub mod cipher;
pub mod crypto;
pub mod jwt;
pub mod numbering;
pub mod pagination;
pub mod password;
pub mod totp;
pub mod validation;
