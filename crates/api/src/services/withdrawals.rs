//! Commission payouts: customer requests and the admin review flow.

use chrono::Utc;
use domain::models::commission::{CommissionAccount, FlowLinks};
use domain::models::withdraw::{
    WithdrawFilter, WithdrawRecord, WithdrawRequest, WithdrawStatus,
};
use domain::services::calendar::BusinessCalendar;
use domain::services::withdrawal::quote_withdrawal;
use persistence::repositories::{CommissionRepository, WithdrawRepository};
use shared::numbering;
use shared::pagination::{PageRequest, PageResult};
use sqlx::{PgConnection, PgPool};
use tracing::info;
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::metrics::record_withdrawal_requested;
use crate::services::commission::CommissionService;

#[derive(Clone)]
pub struct WithdrawService {
    pool: PgPool,
    withdrawals: WithdrawRepository,
    commissions: CommissionRepository,
    commission: CommissionService,
    calendar: BusinessCalendar,
}

impl WithdrawService {
    pub fn new(pool: PgPool, calendar: BusinessCalendar) -> Self {
        Self {
            withdrawals: WithdrawRepository::new(pool.clone()),
            commissions: CommissionRepository::new(pool.clone()),
            commission: CommissionService::new(pool.clone()),
            calendar,
            pool,
        }
    }

    /// Freezes the requested amount and opens a pending withdrawal.
    pub async fn request(&self, user_id: i64, request: &WithdrawRequest) -> Result<WithdrawRecord, ApiError> {
        request.validate()?;
        let settings = self.commission.settings().await?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        // The account lock also serializes the daily count per user.
        let mut account: CommissionAccount =
            self.commissions.lock_account(&mut tx, user_id).await?.into();
        let today_count = self
            .withdrawals
            .count_since(&mut tx, user_id, self.calendar.start_of_day(now))
            .await?;
        let quote = quote_withdrawal(request, &settings, today_count)?;

        let flow = account.freeze(quote.amount)?;
        self.commissions.save_account(&mut tx, &account).await?;

        let withdraw_no = numbering::withdraw_no(now);
        let record: WithdrawRecord = self
            .withdrawals
            .insert(&mut tx, user_id, &withdraw_no, &quote, request)
            .await?
            .into();
        self.commissions
            .insert_flow(
                &mut tx,
                user_id,
                &flow,
                FlowLinks::withdraw(record.id),
                Some(&withdraw_no),
            )
            .await?;
        tx.commit().await?;

        record_withdrawal_requested(request.withdraw_type.as_str());
        info!(
            user_id,
            withdraw_no = %record.withdraw_no,
            amount = %record.amount,
            fee = %record.fee,
            method = request.withdraw_type.as_str(),
            "Withdrawal requested"
        );
        Ok(record.masked())
    }

    pub async fn approve(&self, id: i64) -> Result<WithdrawRecord, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut record = self.lock_record(&mut tx, id).await?;
        record.status.ensure_transition(WithdrawStatus::Approved)?;
        record.status = WithdrawStatus::Approved;
        record.audit_time = Some(Utc::now());
        let record: WithdrawRecord = self.withdrawals.save(&mut tx, &record).await?.into();
        tx.commit().await?;

        info!(withdraw_no = %record.withdraw_no, "Withdrawal approved");
        Ok(record.masked())
    }

    /// Pays out an approved withdrawal: `frozen -> withdrawn`.
    pub async fn complete(&self, id: i64) -> Result<WithdrawRecord, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut record = self.lock_record(&mut tx, id).await?;
        record.status.ensure_transition(WithdrawStatus::Completed)?;

        let mut account: CommissionAccount =
            self.commissions.lock_account(&mut tx, record.user_id).await?.into();
        let flow = account.withdraw_out(record.amount)?;
        self.commissions.save_account(&mut tx, &account).await?;
        self.commissions
            .insert_flow(
                &mut tx,
                record.user_id,
                &flow,
                FlowLinks::withdraw(record.id),
                Some(&record.withdraw_no),
            )
            .await?;

        record.status = WithdrawStatus::Completed;
        record.complete_time = Some(Utc::now());
        let record: WithdrawRecord = self.withdrawals.save(&mut tx, &record).await?.into();
        tx.commit().await?;

        info!(withdraw_no = %record.withdraw_no, amount = %record.actual_amount, "Withdrawal completed");
        Ok(record.masked())
    }

    pub async fn reject(&self, id: i64, reason: &str) -> Result<WithdrawRecord, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut record = self.lock_record(&mut tx, id).await?;
        record.status.ensure_transition(WithdrawStatus::Rejected)?;
        record.status = WithdrawStatus::Rejected;
        record.reject_reason = Some(reason.to_string());
        record.audit_time = Some(Utc::now());
        let record = self.release(&mut tx, record).await?;
        tx.commit().await?;

        info!(withdraw_no = %record.withdraw_no, reason, "Withdrawal rejected");
        Ok(record.masked())
    }

    /// Customer withdraws their own pending request.
    pub async fn cancel_own(&self, user_id: i64, id: i64) -> Result<WithdrawRecord, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut record = self.lock_record(&mut tx, id).await?;
        if record.user_id != user_id {
            return Err(ApiError::NotFound(format!("Withdrawal {} not found", id)));
        }
        record.status.ensure_transition(WithdrawStatus::Cancelled)?;
        record.status = WithdrawStatus::Cancelled;
        let record = self.release(&mut tx, record).await?;
        tx.commit().await?;

        info!(withdraw_no = %record.withdraw_no, user_id, "Withdrawal cancelled");
        Ok(record.masked())
    }

    pub async fn list(
        &self,
        filter: &WithdrawFilter,
        page: &PageRequest,
    ) -> Result<PageResult<WithdrawRecord>, ApiError> {
        let (rows, total) = self.withdrawals.list(filter, page).await?;
        Ok(PageResult::new(
            rows.into_iter()
                .map(|row| WithdrawRecord::from(row).masked())
                .collect(),
            total,
            page,
        ))
    }

    pub async fn list_own(&self, user_id: i64, page: &PageRequest) -> Result<PageResult<WithdrawRecord>, ApiError> {
        let filter = WithdrawFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        self.list(&filter, page).await
    }

    /// Unfreezes the record's amount and saves the record.
    async fn release(
        &self,
        conn: &mut PgConnection,
        record: WithdrawRecord,
    ) -> Result<WithdrawRecord, ApiError> {
        let mut account: CommissionAccount =
            self.commissions.lock_account(conn, record.user_id).await?.into();
        let flow = account.unfreeze(record.amount)?;
        self.commissions.save_account(conn, &account).await?;
        self.commissions
            .insert_flow(
                conn,
                record.user_id,
                &flow,
                FlowLinks::withdraw(record.id),
                Some(&record.withdraw_no),
            )
            .await?;
        Ok(self.withdrawals.save(conn, &record).await?.into())
    }

    async fn lock_record(&self, conn: &mut PgConnection, id: i64) -> Result<WithdrawRecord, ApiError> {
        self.withdrawals
            .lock(conn, id)
            .await?
            .map(Into::into)
            .ok_or_else(|| ApiError::NotFound(format!("Withdrawal {} not found", id)))
    }
}
