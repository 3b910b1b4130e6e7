//! Application and category repository.

use domain::models::application::{CategoryPlacement, CreateApplicationRequest};
use shared::pagination::PageRequest;
use sqlx::PgPool;

use crate::entities::{ApplicationEntity, CategoryEntity};
use crate::metrics::QueryTimer;

macro_rules! app_columns {
    () => {
        "id, app_id, name, country_code, category_id, subcategory_id, icon_url, is_free, \
         account_price, rating, sort_order, status, created_at, updated_at"
    };
}

#[derive(Clone)]
pub struct ApplicationRepository {
    pool: PgPool,
}

impl ApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_app_id(&self, app_id: &str) -> Result<Option<ApplicationEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_application_by_app_id");
        let result = sqlx::query_as::<_, ApplicationEntity>(concat!(
            "SELECT ",
            app_columns!(),
            " FROM applications WHERE app_id = $1 AND deleted_at IS NULL"
        ))
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }

    pub async fn create(
        &self,
        request: &CreateApplicationRequest,
        placement: Option<CategoryPlacement>,
    ) -> Result<ApplicationEntity, sqlx::Error> {
        let timer = QueryTimer::new("create_application");
        let result = sqlx::query_as::<_, ApplicationEntity>(concat!(
            "INSERT INTO applications (app_id, name, country_code, category_id, subcategory_id, icon_url, \
             is_free, account_price, sort_order) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING ",
            app_columns!()
        ))
        .bind(&request.app_id)
        .bind(&request.name)
        .bind(&request.country_code)
        .bind(placement.map(|p| p.category_id))
        .bind(placement.and_then(|p| p.subcategory_id))
        .bind(request.icon_url.as_deref())
        .bind(request.is_free)
        .bind(request.account_price)
        .bind(request.sort_order)
        .fetch_one(&self.pool)
        .await;
        timer.record();
        result
    }

    /// Pages through live applications, optionally matching a name fragment.
    pub async fn list(
        &self,
        keyword: Option<&str>,
        page: &PageRequest,
    ) -> Result<(Vec<ApplicationEntity>, i64), sqlx::Error> {
        let timer = QueryTimer::new("list_applications");
        let rows = sqlx::query_as::<_, ApplicationEntity>(concat!(
            "SELECT ",
            app_columns!(),
            " FROM applications WHERE deleted_at IS NULL \
             AND ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%' OR app_id ILIKE '%' || $1 || '%') \
             ORDER BY sort_order, id LIMIT $2 OFFSET $3"
        ))
        .bind(keyword)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM applications
            WHERE deleted_at IS NULL
              AND ($1::TEXT IS NULL OR name ILIKE '%' || $1 || '%' OR app_id ILIKE '%' || $1 || '%')
            "#,
        )
        .bind(keyword)
        .fetch_one(&self.pool)
        .await?;
        timer.record();
        Ok((rows, total))
    }

    pub async fn find_category(&self, id: i64) -> Result<Option<CategoryEntity>, sqlx::Error> {
        let timer = QueryTimer::new("find_category");
        let result = sqlx::query_as::<_, CategoryEntity>(
            "SELECT id, name, parent_id FROM categories WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();
        result
    }
}
