//! Shared third-party app accounts sold from a pool.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use crate::error::{DomainError, DomainResult};

/// Pool status of an app account. `Sold` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppAccountStatus {
    Normal,
    Banned,
    Expired,
    Risk,
    Sold,
}

impl AppAccountStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppAccountStatus::Normal => "normal",
            AppAccountStatus::Banned => "banned",
            AppAccountStatus::Expired => "expired",
            AppAccountStatus::Risk => "risk",
            AppAccountStatus::Sold => "sold",
        }
    }

    /// Any status may be rewritten except from `Sold`.
    pub fn ensure_can_become(&self, next: AppAccountStatus) -> DomainResult<()> {
        if *self == AppAccountStatus::Sold && next != AppAccountStatus::Sold {
            return Err(DomainError::illegal_transition("App account", self, next));
        }
        Ok(())
    }
}

impl FromStr for AppAccountStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(AppAccountStatus::Normal),
            "banned" => Ok(AppAccountStatus::Banned),
            "expired" => Ok(AppAccountStatus::Expired),
            "risk" => Ok(AppAccountStatus::Risk),
            "sold" => Ok(AppAccountStatus::Sold),
            _ => Err(format!("Invalid app account status: {}", s)),
        }
    }
}

impl fmt::Display for AppAccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An app account with its credential in cleartext.
///
/// Ciphertext never leaves the repository boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppAccount {
    pub id: i64,
    pub app_id: String,
    pub account_detail: String,
    pub category_id: Option<i64>,
    pub account_no: String,
    pub status: AppAccountStatus,
    pub extra_info: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request payload for adding an account to the pool.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppAccountRequest {
    #[validate(length(min = 1, max = 128, message = "App id is required"))]
    pub app_id: String,

    #[validate(length(min = 1, max = 4096, message = "Account detail is required"))]
    pub account_detail: String,

    pub category_id: Option<i64>,

    pub extra_info: Option<serde_json::Value>,
}

/// Request payload for updating a pooled account (partial update).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppAccountRequest {
    #[validate(length(min = 1, max = 4096, message = "Account detail must not be empty"))]
    pub account_detail: Option<String>,

    pub category_id: Option<i64>,

    pub status: Option<AppAccountStatus>,

    pub extra_info: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sold_is_terminal() {
        let sold = AppAccountStatus::Sold;
        assert!(sold.ensure_can_become(AppAccountStatus::Normal).is_err());
        assert!(sold.ensure_can_become(AppAccountStatus::Banned).is_err());
    }

    #[test]
    fn test_normal_can_move_anywhere() {
        let normal = AppAccountStatus::Normal;
        assert!(normal.ensure_can_become(AppAccountStatus::Risk).is_ok());
        assert!(normal.ensure_can_become(AppAccountStatus::Sold).is_ok());
    }
}
