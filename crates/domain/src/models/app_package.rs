//! Install packages and their plan links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use validator::Validate;

use super::platform::Platform;

/// Filename used when a package has none recorded.
pub const DEFAULT_DOWNLOAD_FILENAME: &str = "package.apk";

/// Release status of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageStatus {
    Draft,
    Testing,
    ReviewPending,
    Approved,
    Published,
    Rejected,
    Suspended,
    Archived,
}

impl PackageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageStatus::Draft => "draft",
            PackageStatus::Testing => "testing",
            PackageStatus::ReviewPending => "review_pending",
            PackageStatus::Approved => "approved",
            PackageStatus::Published => "published",
            PackageStatus::Rejected => "rejected",
            PackageStatus::Suspended => "suspended",
            PackageStatus::Archived => "archived",
        }
    }
}

impl FromStr for PackageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(PackageStatus::Draft),
            "testing" => Ok(PackageStatus::Testing),
            "review_pending" => Ok(PackageStatus::ReviewPending),
            "approved" => Ok(PackageStatus::Approved),
            "published" => Ok(PackageStatus::Published),
            "rejected" => Ok(PackageStatus::Rejected),
            "suspended" => Ok(PackageStatus::Suspended),
            "archived" => Ok(PackageStatus::Archived),
            _ => Err(format!("Invalid package status: {}", s)),
        }
    }
}

impl fmt::Display for PackageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A build of an application for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPackage {
    pub id: i64,
    pub app_id: String,
    pub version_name: String,
    pub version_code: i32,
    pub platform: Platform,
    pub file_url: Option<String>,
    pub object_name: Option<String>,
    pub file_name: Option<String>,
    pub status: PackageStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppPackage {
    /// Filename offered in `Content-Disposition`.
    pub fn download_filename(&self) -> &str {
        self.file_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_DOWNLOAD_FILENAME)
    }

    /// `attachment; filename="..."` with quotes stripped from the name.
    pub fn content_disposition(&self) -> String {
        let name: String = self
            .download_filename()
            .chars()
            .filter(|c| *c != '"' && !c.is_control())
            .collect();
        format!("attachment; filename=\"{}\"", name)
    }
}

/// Request payload for creating a package.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePackageRequest {
    #[validate(length(min = 1, max = 128, message = "App id is required"))]
    pub app_id: String,

    #[validate(length(min = 1, max = 64, message = "Version name must be 1-64 characters"))]
    pub version_name: String,

    #[validate(range(min = 0, message = "Version code must be non-negative"))]
    pub version_code: i32,

    pub platform: Platform,

    pub file_url: Option<String>,

    #[validate(custom(function = "shared::validation::validate_object_key"))]
    pub object_name: Option<String>,

    #[validate(length(max = 255, message = "File name must be at most 255 characters"))]
    pub file_name: Option<String>,

    pub status: Option<PackageStatus>,

    #[serde(default)]
    pub plan_ids: Vec<i64>,
}

/// Request payload for updating a package (partial update).
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePackageRequest {
    #[validate(length(min = 1, max = 64, message = "Version name must be 1-64 characters"))]
    pub version_name: Option<String>,

    pub version_code: Option<i32>,

    pub file_url: Option<String>,

    #[validate(custom(function = "shared::validation::validate_object_key"))]
    pub object_name: Option<String>,

    pub file_name: Option<String>,

    pub status: Option<PackageStatus>,
}

/// Replaces the plans a package is linked to.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPackagePlansRequest {
    pub plan_ids: Vec<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn package(file_name: Option<&str>) -> AppPackage {
        let now = Utc::now();
        AppPackage {
            id: 1,
            app_id: "com.example.game".into(),
            version_name: "1.0.0".into(),
            version_code: 100,
            platform: Platform::Android,
            file_url: None,
            object_name: Some("private/package/game.apk".into()),
            file_name: file_name.map(String::from),
            status: PackageStatus::Published,
            published_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_default_filename() {
        assert_eq!(package(None).download_filename(), "package.apk");
        assert_eq!(package(Some("  ")).download_filename(), "package.apk");
        assert_eq!(package(Some("game.apk")).download_filename(), "game.apk");
    }

    #[test]
    fn test_content_disposition_strips_quotes() {
        let p = package(Some("ga\"me.apk"));
        assert_eq!(p.content_disposition(), "attachment; filename=\"game.apk\"");
    }

    #[test]
    fn test_create_request_rejects_bad_object_key() {
        let req = CreatePackageRequest {
            app_id: "com.example.game".into(),
            version_name: "1.0".into(),
            version_code: 1,
            platform: Platform::Android,
            file_url: None,
            object_name: Some("../secret.apk".into()),
            file_name: None,
            status: None,
            plan_ids: vec![],
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(
            "review_pending".parse::<PackageStatus>().unwrap(),
            PackageStatus::ReviewPending
        );
        assert!("live".parse::<PackageStatus>().is_err());
    }
}
