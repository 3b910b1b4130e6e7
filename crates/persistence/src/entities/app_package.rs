//! Package entity and the platform enum shared by several tables.

use chrono::{DateTime, Utc};
use domain::models::app_package::{AppPackage, PackageStatus};
use domain::models::platform::Platform;
use sqlx::FromRow;

db_enum!(
    /// Database enum for platform, used by packages, orders and download logs.
    PlatformDb, Platform, "platform", { Android, Ios, Harmony, Windows }
);

db_enum!(PackageStatusDb, PackageStatus, "package_status", {
    Draft, Testing, ReviewPending, Approved, Published, Rejected, Suspended, Archived,
});

/// Database row mapping for the app_packages table.
#[derive(Debug, Clone, FromRow)]
pub struct AppPackageEntity {
    pub id: i64,
    pub app_id: String,
    pub version_name: String,
    pub version_code: i32,
    pub platform: PlatformDb,
    pub file_url: Option<String>,
    pub object_name: Option<String>,
    pub file_name: Option<String>,
    pub status: PackageStatusDb,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AppPackageEntity> for AppPackage {
    fn from(entity: AppPackageEntity) -> Self {
        Self {
            id: entity.id,
            app_id: entity.app_id,
            version_name: entity.version_name,
            version_code: entity.version_code,
            platform: entity.platform.into(),
            file_url: entity.file_url,
            object_name: entity.object_name,
            file_name: entity.file_name,
            status: entity.status.into(),
            published_at: entity.published_at,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_review_pending_maps_both_ways() {
        let db: PackageStatusDb = PackageStatus::ReviewPending.into();
        assert_eq!(db, PackageStatusDb::ReviewPending);
        assert_eq!(PackageStatus::from(db), PackageStatus::ReviewPending);
    }
}
