//! Pool account entity.
//!
//! `account_detail` is stored sealed; conversion to the domain model needs
//! the configured cipher and therefore goes through [`AppAccountEntity::open`].

use chrono::{DateTime, Utc};
use domain::models::app_account::{AppAccount, AppAccountStatus};
use domain::services::AccountCipher;
use domain::DomainResult;
use sqlx::FromRow;

db_enum!(AppAccountStatusDb, AppAccountStatus, "app_account_status", {
    Normal, Banned, Expired, Risk, Sold,
});

/// Database row mapping for the app_accounts table.
#[derive(Debug, Clone, FromRow)]
pub struct AppAccountEntity {
    pub id: i64,
    pub app_id: String,
    pub account_detail: String,
    pub category_id: Option<i64>,
    pub account_no: String,
    pub status: AppAccountStatusDb,
    pub extra_info: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AppAccountEntity {
    /// Decrypts the credential and builds the domain model.
    pub fn open(self, cipher: &dyn AccountCipher) -> DomainResult<AppAccount> {
        Ok(AppAccount {
            id: self.id,
            app_id: self.app_id,
            account_detail: cipher.open(&self.account_detail)?,
            category_id: self.category_id,
            account_no: self.account_no,
            status: self.status.into(),
            extra_info: self.extra_info,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
