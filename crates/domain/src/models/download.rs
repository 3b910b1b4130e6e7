//! Download decisions and download logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::platform::Platform;

/// Result of a download authorization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadDecision {
    pub allow: bool,
    pub reason: Option<String>,
    pub package_url: Option<String>,
    pub package_detail: Option<String>,
}

impl DownloadDecision {
    pub fn url(url: String) -> Self {
        Self {
            allow: true,
            reason: None,
            package_url: Some(url),
            package_detail: None,
        }
    }

    pub fn credential(detail: String) -> Self {
        Self {
            allow: true,
            reason: None,
            package_url: None,
            package_detail: Some(detail),
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            reason: Some(reason.into()),
            package_url: None,
            package_detail: None,
        }
    }

    /// Label used for the `outcome` metric dimension.
    pub fn outcome(&self) -> &'static str {
        if self.allow {
            "allowed"
        } else {
            "denied"
        }
    }
}

/// Query parameters of the download endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadQuery {
    pub app_id: String,
    /// Overrides User-Agent detection when present.
    pub platform: Option<Platform>,
}

/// One download attempt, recorded out of band.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadLog {
    pub user_id: i64,
    pub app_id: String,
    pub platform: Platform,
    pub success: bool,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}
