//! Shared account pool for paid apps.
//!
//! Credentials are sealed with the configured [`AccountCipher`] on every
//! write and opened on every read, so callers only ever see cleartext.

use std::sync::Arc;

use chrono::Utc;
use domain::models::app_account::{
    AppAccount, AppAccountStatus, CreateAppAccountRequest, UpdateAppAccountRequest,
};
use domain::services::AccountCipher;
use domain::DomainError;
use shared::pagination::PageRequest;
use sqlx::PgPool;

use crate::entities::{AppAccountEntity, AppAccountStatusDb};
use crate::error::{is_unique_violation, PersistenceResult};
use crate::metrics::QueryTimer;

const ACCOUNT_NO_ATTEMPTS: usize = 3;

macro_rules! account_columns {
    () => {
        "id, app_id, account_detail, category_id, account_no, status, extra_info, created_at, updated_at"
    };
}

/// Admin list filter.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppAccountFilter {
    pub app_id: Option<String>,
    pub status: Option<AppAccountStatus>,
}

#[derive(Clone)]
pub struct AppAccountRepository {
    pool: PgPool,
    cipher: Arc<dyn AccountCipher>,
}

impl AppAccountRepository {
    pub fn new(pool: PgPool, cipher: Arc<dyn AccountCipher>) -> Self {
        Self { pool, cipher }
    }

    fn open(&self, entity: AppAccountEntity) -> PersistenceResult<AppAccount> {
        Ok(entity.open(self.cipher.as_ref())?)
    }

    /// Inserts a pool account under a freshly generated account number.
    pub async fn create(&self, request: &CreateAppAccountRequest) -> PersistenceResult<AppAccount> {
        let sealed = self.cipher.seal(&request.account_detail)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let account_no = shared::numbering::account_no(Utc::now());
            let timer = QueryTimer::new("create_app_account");
            let result = sqlx::query_as::<_, AppAccountEntity>(concat!(
                "INSERT INTO app_accounts (app_id, account_detail, category_id, account_no, extra_info) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING ",
                account_columns!()
            ))
            .bind(&request.app_id)
            .bind(&sealed)
            .bind(request.category_id)
            .bind(&account_no)
            .bind(request.extra_info.as_ref())
            .fetch_one(&self.pool)
            .await;
            timer.record();

            match result {
                Ok(entity) => return self.open(entity),
                Err(e) if attempt < ACCOUNT_NO_ATTEMPTS && is_unique_violation(&e, Some("app_accounts_account_no_key")) => {
                    tracing::debug!(account_no = %account_no, "Account number collision, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub async fn find_by_id(&self, id: i64) -> PersistenceResult<Option<AppAccount>> {
        let timer = QueryTimer::new("find_app_account_by_id");
        let entity = sqlx::query_as::<_, AppAccountEntity>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM app_accounts WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();
        entity.map(|e| self.open(e)).transpose()
    }

    pub async fn list(
        &self,
        filter: &AppAccountFilter,
        page: &PageRequest,
    ) -> PersistenceResult<(Vec<AppAccount>, i64)> {
        let timer = QueryTimer::new("list_app_accounts");
        let status = filter.status.map(AppAccountStatusDb::from);
        let rows = sqlx::query_as::<_, AppAccountEntity>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM app_accounts WHERE deleted_at IS NULL \
             AND ($1::TEXT IS NULL OR app_id = $1) \
             AND ($2::app_account_status IS NULL OR status = $2) \
             ORDER BY id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(filter.app_id.as_deref())
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;
        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM app_accounts
            WHERE deleted_at IS NULL
              AND ($1::TEXT IS NULL OR app_id = $1)
              AND ($2::app_account_status IS NULL OR status = $2)
            "#,
        )
        .bind(filter.app_id.as_deref())
        .bind(status)
        .fetch_one(&self.pool)
        .await?;
        timer.record();

        let accounts = rows
            .into_iter()
            .map(|e| self.open(e))
            .collect::<PersistenceResult<Vec<_>>>()?;
        Ok((accounts, total))
    }

    /// Updates an account under a row lock. Sold accounts are immutable.
    pub async fn update(
        &self,
        id: i64,
        request: &UpdateAppAccountRequest,
    ) -> PersistenceResult<Option<AppAccount>> {
        let timer = QueryTimer::new("update_app_account");
        let mut tx = self.pool.begin().await?;

        let Some(current) = sqlx::query_as::<_, AppAccountEntity>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM app_accounts WHERE id = $1 AND deleted_at IS NULL FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        else {
            return Ok(None);
        };

        let current_status = AppAccountStatus::from(current.status);
        if current_status == AppAccountStatus::Sold {
            return Err(DomainError::conflict(format!("App account {} is already sold", current.account_no)).into());
        }
        if let Some(next) = request.status {
            current_status.ensure_can_become(next)?;
        }

        let detail = match request.account_detail.as_deref() {
            Some(value) => self.cipher.seal_if_needed(value)?,
            None => self.cipher.seal_if_needed(&current.account_detail)?,
        };

        let updated = sqlx::query_as::<_, AppAccountEntity>(concat!(
            "UPDATE app_accounts SET account_detail = $2, category_id = COALESCE($3, category_id), \
             status = COALESCE($4, status), extra_info = COALESCE($5, extra_info), updated_at = NOW() \
             WHERE id = $1 RETURNING ",
            account_columns!()
        ))
        .bind(id)
        .bind(&detail)
        .bind(request.category_id)
        .bind(request.status.map(AppAccountStatusDb::from))
        .bind(request.extra_info.as_ref())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        self.open(updated).map(Some)
    }

    /// Claims one `normal` account of the app and marks it sold.
    ///
    /// Concurrent callers skip each other's locked rows, and the status
    /// compare-and-swap guarantees an account is sold at most once.
    pub async fn sell(&self, app_id: &str) -> PersistenceResult<Option<AppAccount>> {
        let timer = QueryTimer::new("sell_app_account");
        let mut tx = self.pool.begin().await?;

        let candidate = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT id FROM app_accounts
            WHERE app_id = $1 AND status = 'normal' AND deleted_at IS NULL
            ORDER BY id
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(app_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = candidate else {
            return Ok(None);
        };

        let sold = sqlx::query_as::<_, AppAccountEntity>(concat!(
            "UPDATE app_accounts SET status = 'sold', updated_at = NOW() \
             WHERE id = $1 AND status = 'normal' RETURNING ",
            account_columns!()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        timer.record();
        sold.map(|e| self.open(e)).transpose()
    }

    /// A random `normal` account of the app, left in the pool.
    pub async fn pick_shared(&self, app_id: &str) -> PersistenceResult<Option<AppAccount>> {
        let timer = QueryTimer::new("pick_shared_app_account");
        let entity = sqlx::query_as::<_, AppAccountEntity>(concat!(
            "SELECT ",
            account_columns!(),
            " FROM app_accounts WHERE app_id = $1 AND status = 'normal' AND deleted_at IS NULL \
             ORDER BY random() LIMIT 1"
        ))
        .bind(app_id)
        .fetch_optional(&self.pool)
        .await?;
        timer.record();
        entity.map(|e| self.open(e)).transpose()
    }
}
