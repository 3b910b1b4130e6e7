//! Referral commission: emission on payment, refund compensation, settlement
//! of held commission and tier management.

use chrono::{DateTime, Duration, Utc};
use domain::models::commission::{
    AccountFlow, BalanceKind, CommissionAccount, CommissionDetail, CommissionOverview,
    CommissionTier, FlowLinks, TierRequest,
};
use domain::models::order::Order;
use domain::models::sys_config::{CommissionSettings, SCOPE_COMMISSION};
use domain::services::commission::{
    plan_emission, resolve_tier, settlement_for, validate_tier_set, Settlement,
};
use persistence::repositories::{CommissionRepository, SysConfigRepository, UserRepository};
use rust_decimal::Decimal;
use shared::pagination::{PageRequest, PageResult};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use validator::Validate;

use crate::error::ApiError;
use crate::middleware::metrics::record_commission_emitted;

/// Details settled per job run.
const SETTLE_BATCH: i64 = 200;

#[derive(Clone)]
pub struct CommissionService {
    pool: PgPool,
    commissions: CommissionRepository,
    users: UserRepository,
    sys_config: SysConfigRepository,
}

impl CommissionService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            commissions: CommissionRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            sys_config: SysConfigRepository::new(pool.clone()),
            pool,
        }
    }

    /// Current `commission.*` runtime settings.
    pub async fn settings(&self) -> Result<CommissionSettings, ApiError> {
        let entries = self.sys_config.scope_map(SCOPE_COMMISSION).await?;
        Ok(CommissionSettings::from_entries(&entries)?)
    }

    /// Pays the payer's direct referrer for a freshly paid order.
    ///
    /// Runs inside the caller's transaction. Returns the amount credited, or
    /// `None` when the payer has no referrer or the commission already exists.
    pub async fn emit_for_order(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<Option<Decimal>, ApiError> {
        let referrer_id = match self.users.find_by_id(order.user_id).await? {
            Some(payer) => payer.referrer_id,
            None => return Err(ApiError::NotFound(format!("User {} not found", order.user_id))),
        };
        let Some(referrer_id) = referrer_id else {
            return Ok(None);
        };

        let settings = self.settings().await?;
        let tiers: Vec<CommissionTier> = self
            .commissions
            .list_tiers(&mut *conn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        let direct_referrals = self
            .users
            .count_direct_referrals(&mut *conn, referrer_id)
            .await?;

        let emission = plan_emission(
            referrer_id,
            order.final_amount,
            &tiers,
            direct_referrals,
            &settings,
        )?;
        self.users
            .set_current_tier(conn, referrer_id, emission.tier_id)
            .await?;

        let inserted = self
            .commissions
            .insert_detail(conn, order, &emission, now)
            .await?;
        if inserted.is_none() {
            info!(order_id = order.id, referrer_id, "Commission already emitted for order");
            return Ok(None);
        }

        if emission.commission > Decimal::ZERO {
            let mut account: CommissionAccount =
                self.commissions.lock_account(conn, referrer_id).await?.into();
            let flow = match emission.credit_to {
                BalanceKind::Available => account.credit_available(emission.commission)?,
                BalanceKind::Frozen => account.credit_frozen(emission.commission)?,
            };
            self.commissions.save_account(conn, &account).await?;
            self.commissions
                .insert_flow(
                    conn,
                    referrer_id,
                    &flow,
                    FlowLinks::order(order.id),
                    Some(&order.order_no),
                )
                .await?;
        }

        record_commission_emitted(emission.credit_to.as_str());
        info!(
            order_id = order.id,
            referrer_id,
            tier = %emission.tier_name,
            rate = %emission.rate,
            commission = %emission.commission,
            credit_to = emission.credit_to.as_str(),
            "Commission emitted"
        );
        Ok(Some(emission.commission))
    }

    /// Takes back the commission paid on a refunded order and voids its details.
    ///
    /// Balances never go negative and withdrawal reserves stay intact; any
    /// shortfall is written on the refund flow and logged.
    pub async fn compensate_refund(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        refund_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Decimal, ApiError> {
        let details: Vec<CommissionDetail> = self
            .commissions
            .lock_details_for_order(conn, order.id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        let mut total_recovered = Decimal::ZERO;
        for detail in details.iter().filter(|d| d.voided_at.is_none()) {
            if detail.commission > Decimal::ZERO {
                let mut account: CommissionAccount =
                    self.commissions.lock_account(conn, detail.user_id).await?.into();
                let recovery = account.recover(detail.commission, detail.held_in())?;
                self.commissions.save_account(conn, &account).await?;
                self.commissions
                    .insert_flow(
                        conn,
                        detail.user_id,
                        &recovery.flow,
                        FlowLinks::refund(order.id, refund_id),
                        Some(&recovery.remark(&order.order_no)),
                    )
                    .await?;
                if !recovery.shortfall.is_zero() {
                    warn!(
                        detail_id = detail.id,
                        referrer_id = detail.user_id,
                        owed = %detail.commission,
                        recovered = %recovery.recovered,
                        shortfall = %recovery.shortfall,
                        "Commission only partially recovered on refund"
                    );
                }
                total_recovered += recovery.recovered;
            }
            self.commissions.void_detail(conn, detail.id, now).await?;
        }

        if !details.is_empty() {
            info!(order_id = order.id, refund_id, recovered = %total_recovered, "Commission reversed");
        }
        Ok(total_recovered)
    }

    /// Settles commission details whose hold period has passed.
    pub async fn settle_due(&self, now: DateTime<Utc>) -> Result<u64, ApiError> {
        let settings = self.settings().await?;
        let before = now - Duration::days(settings.hold_days);
        let ids = self.commissions.due_detail_ids(before, SETTLE_BATCH).await?;

        let mut settled = 0;
        for id in ids {
            let mut tx = self.pool.begin().await?;
            let Some(detail) = self.commissions.lock_detail(&mut tx, id).await? else {
                continue;
            };
            let detail: CommissionDetail = detail.into();

            match settlement_for(&detail, settings.hold_days, now) {
                Settlement::ReleaseHeld => {
                    if detail.commission > Decimal::ZERO {
                        let mut account: CommissionAccount =
                            self.commissions.lock_account(&mut tx, detail.user_id).await?.into();
                        let flow = account.unfreeze(detail.commission)?;
                        self.commissions.save_account(&mut tx, &account).await?;
                        self.commissions
                            .insert_flow(
                                &mut tx,
                                detail.user_id,
                                &flow,
                                FlowLinks::order(detail.order_id),
                                Some(&detail.order_no),
                            )
                            .await?;
                    }
                    self.commissions.mark_settled(&mut tx, id, now).await?;
                }
                Settlement::MarkSettled => {
                    self.commissions.mark_settled(&mut tx, id, now).await?;
                }
                Settlement::NotYet => continue,
            }

            tx.commit().await?;
            settled += 1;
        }
        Ok(settled)
    }

    /// Balances, referral count and current tier for a customer.
    pub async fn overview(&self, user_id: i64) -> Result<CommissionOverview, ApiError> {
        let account: CommissionAccount = self
            .commissions
            .find_account(user_id)
            .await?
            .map(Into::into)
            .unwrap_or_else(|| CommissionAccount::empty(0, user_id));
        let direct_referrals = self.users.count_direct_referrals(&self.pool, user_id).await?;
        let tiers: Vec<CommissionTier> = self
            .commissions
            .list_tiers(&self.pool)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        let tier = resolve_tier(&tiers, direct_referrals);

        Ok(CommissionOverview {
            available: account.available,
            frozen: account.frozen,
            total_earnings: account.total_earnings,
            withdrawn: account.withdrawn,
            direct_referrals,
            tier_name: tier.map(|t| t.name.clone()),
            tier_rate: tier.map(|t| t.rate),
        })
    }

    pub async fn list_details(
        &self,
        user_id: i64,
        page: &PageRequest,
    ) -> Result<PageResult<CommissionDetail>, ApiError> {
        let (rows, total) = self.commissions.list_details(user_id, page).await?;
        Ok(PageResult::new(rows.into_iter().map(Into::into).collect(), total, page))
    }

    pub async fn list_flows(&self, user_id: i64, page: &PageRequest) -> Result<PageResult<AccountFlow>, ApiError> {
        let (rows, total) = self.commissions.list_flows(user_id, page).await?;
        Ok(PageResult::new(rows.into_iter().map(Into::into).collect(), total, page))
    }

    pub async fn list_tiers(&self) -> Result<Vec<CommissionTier>, ApiError> {
        Ok(self
            .commissions
            .list_tiers(&self.pool)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub async fn create_tier(&self, request: &TierRequest) -> Result<CommissionTier, ApiError> {
        request.validate()?;
        ensure_rate(request.rate)?;

        let mut tx = self.pool.begin().await?;
        self.commissions.lock_tiers(&mut tx).await?;
        let tier: CommissionTier = self.commissions.insert_tier(&mut tx, request).await?.into();
        self.ensure_valid_tier_set(&mut tx).await?;
        tx.commit().await?;

        info!(tier_id = tier.id, name = %tier.name, "Commission tier created");
        Ok(tier)
    }

    pub async fn update_tier(&self, id: i64, request: &TierRequest) -> Result<CommissionTier, ApiError> {
        request.validate()?;
        ensure_rate(request.rate)?;

        let mut tx = self.pool.begin().await?;
        self.commissions.lock_tiers(&mut tx).await?;
        let tier: CommissionTier = self
            .commissions
            .update_tier(&mut tx, id, request)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Tier {} not found", id)))?
            .into();
        self.ensure_valid_tier_set(&mut tx).await?;
        tx.commit().await?;

        info!(tier_id = id, "Commission tier updated");
        Ok(tier)
    }

    pub async fn delete_tier(&self, id: i64) -> Result<(), ApiError> {
        let mut tx = self.pool.begin().await?;
        self.commissions.lock_tiers(&mut tx).await?;
        let deleted = self
            .commissions
            .delete_tier(&mut tx, id)
            .await
            .map_err(tier_in_use)?;
        if !deleted {
            return Err(ApiError::NotFound(format!("Tier {} not found", id)));
        }
        self.ensure_valid_tier_set(&mut tx).await?;
        tx.commit().await?;

        info!(tier_id = id, "Commission tier deleted");
        Ok(())
    }

    async fn ensure_valid_tier_set(&self, conn: &mut PgConnection) -> Result<(), ApiError> {
        let tiers: Vec<CommissionTier> = self
            .commissions
            .list_tiers(&mut *conn)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        validate_tier_set(&tiers)?;
        Ok(())
    }
}

fn ensure_rate(rate: Decimal) -> Result<(), ApiError> {
    if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
        return Err(ApiError::Validation(
            "Commission rate must be between 0 and 100".to_string(),
        ));
    }
    Ok(())
}

/// Tiers referenced by commission details cannot be removed.
fn tier_in_use(err: sqlx::Error) -> ApiError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23503") => {
            ApiError::PreconditionFailed(
                "Tier is referenced by existing commission records".to_string(),
            )
        }
        _ => err.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_bounds() {
        assert!(ensure_rate(Decimal::ZERO).is_ok());
        assert!(ensure_rate(Decimal::new(125, 1)).is_ok());
        assert!(ensure_rate(Decimal::ONE_HUNDRED).is_ok());
        assert!(matches!(
            ensure_rate(Decimal::new(-1, 0)),
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            ensure_rate(Decimal::new(1001, 1)),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn test_non_fk_errors_keep_default_mapping() {
        assert!(matches!(
            tier_in_use(sqlx::Error::RowNotFound),
            ApiError::NotFound(_)
        ));
    }
}
