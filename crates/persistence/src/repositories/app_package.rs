//! Package repository and package-plan relations.

use domain::models::app_package::{CreatePackageRequest, PackageStatus, UpdatePackageRequest};
use domain::models::platform::Platform;
use sqlx::{PgConnection, PgPool};

use crate::entities::{AppPackageEntity, PackageStatusDb, PlatformDb};
use crate::metrics::QueryTimer;

macro_rules! package_columns {
    () => {
        "id, app_id, version_name, version_code, platform, file_url, object_name, file_name, \
         status, published_at, created_at, updated_at"
    };
}

#[derive(Clone)]
pub struct AppPackageRepository {
    pool: PgPool,
}

impl AppPackageRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Published packages of an app for one platform, newest first.
    pub async fn list_published(
        &self,
        app_id: &str,
        platform: Platform,
    ) -> Result<Vec<AppPackageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_published_packages");
        let result = sqlx::query_as::<_, AppPackageEntity>(concat!(
            "SELECT ",
            package_columns!(),
            " FROM app_packages WHERE app_id = $1 AND platform = $2 AND status = 'published' \
             AND deleted_at IS NULL \
             ORDER BY version_code DESC, published_at DESC NULLS LAST, id DESC"
        ))
        .bind(app_id)
        .bind(PlatformDb::from(platform))
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn list_for_app(&self, app_id: &str) -> Result<Vec<AppPackageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("list_packages_for_app");
        let result = sqlx::query_as::<_, AppPackageEntity>(concat!(
            "SELECT ",
            package_columns!(),
            " FROM app_packages WHERE app_id = $1 AND deleted_at IS NULL \
             ORDER BY platform, version_code DESC, id DESC"
        ))
        .bind(app_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<AppPackageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_package_by_id");
        let result = sqlx::query_as::<_, AppPackageEntity>(concat!(
            "SELECT ",
            package_columns!(),
            " FROM app_packages WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Creates a package and its plan relations in one transaction.
    pub async fn create(&self, request: &CreatePackageRequest) -> Result<AppPackageEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_package");
        let status = request.status.unwrap_or(PackageStatus::Draft);
        let mut tx = self.pool.begin().await?;

        let package = sqlx::query_as::<_, AppPackageEntity>(concat!(
            "INSERT INTO app_packages (app_id, version_name, version_code, platform, file_url, object_name, \
             file_name, status, published_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, CASE WHEN $8 = 'published'::package_status THEN NOW() END) \
             RETURNING ",
            package_columns!()
        ))
        .bind(&request.app_id)
        .bind(&request.version_name)
        .bind(request.version_code)
        .bind(PlatformDb::from(request.platform))
        .bind(request.file_url.as_deref())
        .bind(request.object_name.as_deref())
        .bind(request.file_name.as_deref())
        .bind(PackageStatusDb::from(status))
        .fetch_one(&mut *tx)
        .await?;

        Self::insert_relations(&mut *tx, package.id, &request.plan_ids).await?;

        tx.commit().await?;
        timer.record();
        Ok(package)
    }

    pub async fn update(
        &self,
        id: i64,
        request: &UpdatePackageRequest,
    ) -> Result<Option<AppPackageEntity>, sqlx::Error> {
        let timer = QueryTimer::new("update_package");
        let result = sqlx::query_as::<_, AppPackageEntity>(concat!(
            "UPDATE app_packages SET \
                version_name = COALESCE($2, version_name), \
                version_code = COALESCE($3, version_code), \
                file_url = COALESCE($4, file_url), \
                object_name = COALESCE($5, object_name), \
                file_name = COALESCE($6, file_name), \
                status = COALESCE($7, status), \
                published_at = CASE WHEN $7 = 'published'::package_status AND published_at IS NULL \
                                    THEN NOW() ELSE published_at END, \
                updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL RETURNING ",
            package_columns!()
        ))
        .bind(id)
        .bind(request.version_name.as_deref())
        .bind(request.version_code)
        .bind(request.file_url.as_deref())
        .bind(request.object_name.as_deref())
        .bind(request.file_name.as_deref())
        .bind(request.status.map(PackageStatusDb::from))
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Deletes a package together with its plan relations.
    pub async fn delete(&self, id: i64) -> Result<bool, sqlx::Error> {
        let timer = QueryTimer::new("delete_package");
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM package_plan_relations WHERE package_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let deleted = sqlx::query("DELETE FROM app_packages WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        timer.record();
        Ok(deleted > 0)
    }

    /// Replaces every plan relation of a package.
    pub async fn set_plans(&self, package_id: i64, plan_ids: &[i64]) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("set_package_plans");
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM package_plan_relations WHERE package_id = $1")
            .bind(package_id)
            .execute(&mut *tx)
            .await?;
        Self::insert_relations(&mut *tx, package_id, plan_ids).await?;
        tx.commit().await?;
        timer.record();
        Ok(())
    }

    /// Adds plan relations, keeping existing ones.
    pub async fn add_plans(&self, package_id: i64, plan_ids: &[i64]) -> Result<(), sqlx::Error> {
        let timer = QueryTimer::new("add_package_plans");
        let mut tx = self.pool.begin().await?;
        Self::insert_relations(&mut *tx, package_id, plan_ids).await?;
        tx.commit().await?;
        timer.record();
        Ok(())
    }

    pub async fn plan_ids(&self, package_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        let timer = QueryTimer::new("list_package_plan_ids");
        let result = sqlx::query_scalar::<_, i64>(
            "SELECT plan_id FROM package_plan_relations WHERE package_id = $1 ORDER BY plan_id",
        )
        .bind(package_id)
        .fetch_all(&self.pool)
        .await;
        timer.record();
        result
    }

    async fn insert_relations(
        conn: &mut PgConnection,
        package_id: i64,
        plan_ids: &[i64],
    ) -> Result<(), sqlx::Error> {
        if plan_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO package_plan_relations (package_id, plan_id)
            SELECT $1, plan_id FROM UNNEST($2::BIGINT[]) AS plan_id
            ON CONFLICT (package_id, plan_id) DO NOTHING
            "#,
        )
        .bind(package_id)
        .bind(plan_ids)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
