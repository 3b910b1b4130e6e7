//! Application and category entities.

use chrono::{DateTime, Utc};
use domain::models::application::{AppStatus, Application, Category};
use rust_decimal::Decimal;
use sqlx::FromRow;

db_enum!(AppStatusDb, AppStatus, "app_status", { Active, Suspended, Deleted });

/// Database row mapping for the applications table.
#[derive(Debug, Clone, FromRow)]
pub struct ApplicationEntity {
    pub id: i64,
    pub app_id: String,
    pub name: String,
    pub country_code: String,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub icon_url: Option<String>,
    pub is_free: bool,
    pub account_price: Decimal,
    pub rating: Decimal,
    pub sort_order: i32,
    pub status: AppStatusDb,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<ApplicationEntity> for Application {
    fn from(entity: ApplicationEntity) -> Self {
        Self {
            id: entity.id,
            app_id: entity.app_id,
            name: entity.name,
            country_code: entity.country_code,
            category_id: entity.category_id,
            subcategory_id: entity.subcategory_id,
            icon_url: entity.icon_url,
            is_free: entity.is_free,
            account_price: entity.account_price,
            rating: entity.rating,
            sort_order: entity.sort_order,
            status: entity.status.into(),
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct CategoryEntity {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

impl From<CategoryEntity> for Category {
    fn from(entity: CategoryEntity) -> Self {
        Self {
            id: entity.id,
            name: entity.name,
            parent_id: entity.parent_id,
        }
    }
}
