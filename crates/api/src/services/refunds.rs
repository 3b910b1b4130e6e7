//! Refund workflow.
//!
//! `pending -> processing -> success | failed`, `failed -> pending` on retry and
//! `pending -> cancelled`. Applying a refund moves the order to `refunded`;
//! cancelling the refund moves it back to `paid`. A successful refund reverses
//! the referral commission and ends the membership the order bought.

use chrono::{DateTime, Utc};
use domain::models::order::{Order, OrderStatus};
use domain::models::refund::{
    resolve_refund_amount, ApplyRefundRequest, CompleteRefundRequest, ReasonRequest, Refund,
    RefundStatus,
};
use domain::models::user::Operator;
use persistence::error::is_unique_violation;
use persistence::repositories::refund::IN_FLIGHT_INDEX;
use persistence::repositories::{NewRefund, OrderRepository, RefundRepository, UserMembershipRepository};
use shared::numbering;
use shared::pagination::{PageRequest, PageResult};
use sqlx::{PgConnection, PgPool};
use tracing::info;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::services::auth::ensure_totp;
use crate::services::commission::CommissionService;

const IN_FLIGHT_MESSAGE: &str = "Order already has a refund in progress";

#[derive(Clone)]
pub struct RefundService {
    pool: PgPool,
    refunds: RefundRepository,
    orders: OrderRepository,
    memberships: UserMembershipRepository,
    commission: CommissionService,
}

impl RefundService {
    pub fn new(state: &AppState) -> Self {
        let pool = state.pool.clone();
        Self {
            refunds: RefundRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            memberships: UserMembershipRepository::new(pool.clone()),
            commission: CommissionService::new(pool.clone()),
            pool,
        }
    }

    /// Opens a pending refund on a paid order.
    pub async fn apply(&self, operator: &Operator, request: &ApplyRefundRequest) -> Result<Refund, ApiError> {
        request.validate()?;
        ensure_totp(operator, Some(&request.totp_code))?;

        let mut tx = self.pool.begin().await?;
        let order = self.lock_order(&mut tx, request.order_id).await?;
        order.status.ensure_transition(OrderStatus::Refunded)?;
        if self.refunds.has_in_flight(&mut tx, order.id).await? {
            return Err(ApiError::Conflict(IN_FLIGHT_MESSAGE.to_string()));
        }

        let (amount, refund_type) = resolve_refund_amount(request.amount, order.final_amount)?;
        let refund_no = numbering::refund_no(Utc::now());
        let refund = self
            .insert(
                &mut tx,
                &NewRefund {
                    refund_no: &refund_no,
                    order_id: order.id,
                    amount,
                    refund_type,
                    reason: &request.reason,
                    status: RefundStatus::Pending,
                    operator_id: Some(operator.id),
                    operator_name: Some(&operator.username),
                },
            )
            .await?;
        self.orders
            .set_refund_state(&mut tx, order.id, OrderStatus::Refunded)
            .await?;
        tx.commit().await?;

        info!(
            refund_no = %refund.refund_no,
            order_no = %order.order_no,
            amount = %refund.refund_amount,
            operator_id = operator.id,
            "Refund applied"
        );
        Ok(refund)
    }

    /// Hands a pending refund to the provider.
    pub async fn dispatch(&self, operator: &Operator, id: i64) -> Result<Refund, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut refund = self.lock_refund(&mut tx, id).await?;
        refund.status.ensure_transition(RefundStatus::Processing)?;
        refund.status = RefundStatus::Processing;
        refund.processed_at = Some(Utc::now());
        stamp_operator(&mut refund, operator);
        let refund: Refund = self.refunds.save(&mut tx, &refund).await?.into();
        tx.commit().await?;

        info!(refund_no = %refund.refund_no, "Refund processing");
        Ok(refund)
    }

    /// Records the provider's verdict on a processing refund.
    pub async fn complete(
        &self,
        operator: &Operator,
        id: i64,
        request: &CompleteRefundRequest,
    ) -> Result<Refund, ApiError> {
        request.validate()?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let mut refund = self.lock_refund(&mut tx, id).await?;
        stamp_operator(&mut refund, operator);

        if request.success {
            refund.status.ensure_transition(RefundStatus::Success)?;
            refund.status = RefundStatus::Success;
            refund.completed_at = Some(now);
            refund.third_party_refund_id = request.third_party_refund_id.clone();
            refund.failure_reason = None;

            let order = self.lock_order(&mut tx, refund.order_id).await?;
            self.settle_success(&mut tx, &order, refund.id, now).await?;
        } else {
            refund.status.ensure_transition(RefundStatus::Failed)?;
            refund.status = RefundStatus::Failed;
            refund.failure_reason = Some(
                request
                    .failure_reason
                    .clone()
                    .unwrap_or_else(|| "refund failed".to_string()),
            );
        }

        let refund: Refund = self.refunds.save(&mut tx, &refund).await?.into();
        tx.commit().await?;

        info!(refund_no = %refund.refund_no, status = refund.status.as_str(), "Refund completed");
        Ok(refund)
    }

    /// Puts a failed refund back in the queue.
    pub async fn retry(&self, operator: &Operator, id: i64) -> Result<Refund, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut refund = self.lock_refund(&mut tx, id).await?;
        refund.status.ensure_transition(RefundStatus::Pending)?;
        refund.status = RefundStatus::Pending;
        refund.failure_reason = None;
        refund.processed_at = None;
        stamp_operator(&mut refund, operator);

        let saved = self.refunds.save(&mut tx, &refund).await.map_err(in_flight_conflict)?;
        tx.commit().await?;

        let refund: Refund = saved.into();
        info!(refund_no = %refund.refund_no, "Refund retried");
        Ok(refund)
    }

    /// Withdraws a pending refund; the order becomes paid again.
    pub async fn cancel(&self, operator: &Operator, id: i64, request: &ReasonRequest) -> Result<Refund, ApiError> {
        request.validate()?;

        let mut tx = self.pool.begin().await?;
        let mut refund = self.lock_refund(&mut tx, id).await?;
        refund.status.ensure_transition(RefundStatus::Cancelled)?;
        refund.status = RefundStatus::Cancelled;
        refund.failure_reason = Some(request.reason.clone());
        stamp_operator(&mut refund, operator);

        let order = self.lock_order(&mut tx, refund.order_id).await?;
        order.status.ensure_transition(OrderStatus::Paid)?;
        self.orders
            .set_refund_state(&mut tx, order.id, OrderStatus::Paid)
            .await?;

        let refund: Refund = self.refunds.save(&mut tx, &refund).await?.into();
        tx.commit().await?;

        info!(refund_no = %refund.refund_no, order_no = %order.order_no, "Refund cancelled");
        Ok(refund)
    }

    /// Refunds a paid order in full immediately, bypassing the provider.
    pub async fn force_refund(
        &self,
        operator: &Operator,
        order_id: i64,
        note: Option<&str>,
    ) -> Result<Refund, ApiError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let order = self.lock_order(&mut tx, order_id).await?;
        order.status.ensure_transition(OrderStatus::Refunded)?;
        if self.refunds.has_in_flight(&mut tx, order.id).await? {
            return Err(ApiError::Conflict(IN_FLIGHT_MESSAGE.to_string()));
        }

        let (amount, refund_type) = resolve_refund_amount(None, order.final_amount)?;
        let refund_no = numbering::refund_no(now);
        let refund = self
            .insert(
                &mut tx,
                &NewRefund {
                    refund_no: &refund_no,
                    order_id: order.id,
                    amount,
                    refund_type,
                    reason: note.unwrap_or("forced refund"),
                    status: RefundStatus::Success,
                    operator_id: Some(operator.id),
                    operator_name: Some(&operator.username),
                },
            )
            .await?;
        self.orders
            .set_refund_state(&mut tx, order.id, OrderStatus::Refunded)
            .await?;
        self.settle_success(&mut tx, &order, refund.id, now).await?;
        tx.commit().await?;

        info!(
            refund_no = %refund.refund_no,
            order_no = %order.order_no,
            operator_id = operator.id,
            "Order force refunded"
        );
        Ok(refund)
    }

    pub async fn get(&self, id: i64) -> Result<Refund, ApiError> {
        self.refunds
            .find_by_id(id)
            .await?
            .map(Into::into)
            .ok_or_else(|| ApiError::NotFound(format!("Refund {} not found", id)))
    }

    pub async fn list(
        &self,
        status: Option<RefundStatus>,
        order_id: Option<i64>,
        page: &PageRequest,
    ) -> Result<PageResult<Refund>, ApiError> {
        let (rows, total) = self.refunds.list(status, order_id, page).await?;
        Ok(PageResult::new(rows.into_iter().map(Into::into).collect(), total, page))
    }

    async fn settle_success(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        refund_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), ApiError> {
        self.commission
            .compensate_refund(conn, order, refund_id, now)
            .await?;
        let cancelled = self.memberships.cancel_for_order(conn, order.id).await?;
        if cancelled > 0 {
            info!(order_id = order.id, "Membership cancelled after refund");
        }
        Ok(())
    }

    async fn insert(&self, conn: &mut PgConnection, refund: &NewRefund<'_>) -> Result<Refund, ApiError> {
        Ok(self
            .refunds
            .insert(conn, refund)
            .await
            .map_err(in_flight_conflict)?
            .into())
    }

    async fn lock_refund(&self, conn: &mut PgConnection, id: i64) -> Result<Refund, ApiError> {
        self.refunds
            .lock(conn, id)
            .await?
            .map(Into::into)
            .ok_or_else(|| ApiError::NotFound(format!("Refund {} not found", id)))
    }

    async fn lock_order(&self, conn: &mut PgConnection, id: i64) -> Result<Order, ApiError> {
        self.orders
            .lock(conn, id)
            .await?
            .map(Into::into)
            .ok_or_else(|| ApiError::NotFound(format!("Order {} not found", id)))
    }
}

fn stamp_operator(refund: &mut Refund, operator: &Operator) {
    refund.operator_id = Some(operator.id);
    refund.operator_name = Some(operator.username.clone());
}

fn in_flight_conflict(err: sqlx::Error) -> ApiError {
    if is_unique_violation(&err, Some(IN_FLIGHT_INDEX)) {
        ApiError::Conflict(IN_FLIGHT_MESSAGE.to_string())
    } else {
        err.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_stamp_operator() {
        let operator = Operator {
            id: 9,
            uuid: Uuid::new_v4(),
            username: "finance".into(),
            nick_name: "Finance".into(),
            password_hash: String::new(),
            totp_secret: None,
            enabled: true,
        };
        let now = Utc::now();
        let mut refund = Refund {
            id: 1,
            refund_no: "RF1".into(),
            order_id: 2,
            refund_amount: rust_decimal::Decimal::ONE,
            refund_type: domain::models::refund::RefundType::Full,
            reason: None,
            status: RefundStatus::Pending,
            third_party_refund_id: None,
            operator_id: None,
            operator_name: None,
            processed_at: None,
            completed_at: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        };
        stamp_operator(&mut refund, &operator);
        assert_eq!(refund.operator_id, Some(9));
        assert_eq!(refund.operator_name.as_deref(), Some("finance"));
    }

    #[test]
    fn test_non_index_errors_keep_default_mapping() {
        assert!(matches!(
            in_flight_conflict(sqlx::Error::RowNotFound),
            ApiError::NotFound(_)
        ));
    }
}
