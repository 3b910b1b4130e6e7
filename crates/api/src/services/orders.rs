//! Order lifecycle: placement, payment callbacks, operator processing,
//! cancellation and expiry.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use domain::models::membership_plan::MembershipPlan;
use domain::models::order::{
    classify_callback, CallbackAction, ManualProcessRequest, ManualProcessType, NewOrder, Order,
    OrderFilter, OrderStatus, PaymentCallback, PlaceOrderRequest, EXPIRED_REASON,
};
use domain::models::payment::PaymentAccount;
use domain::models::user::Operator;
use domain::services::ports::CallbackVerifier;
use domain::services::pricing::quote_order;
use persistence::error::is_unique_violation;
use persistence::repositories::order::PENDING_UPGRADE_CONSTRAINT;
use persistence::repositories::{
    MembershipPlanRepository, OrderRepository, PaymentAccountRepository, UserMembershipRepository,
};
use shared::numbering;
use shared::pagination::{PageRequest, PageResult};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics::record_order_paid;
use crate::services::auth::ensure_totp;
use crate::services::commission::CommissionService;
use crate::services::memberships::MembershipService;
use crate::services::refunds::RefundService;

const ORDER_NO_CONSTRAINT: &str = "orders_order_no_key";
const ORDER_NO_ATTEMPTS: usize = 3;
const EXPIRE_BATCH: i64 = 500;

/// How a callback or confirmation was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Paid,
    Failed,
    /// Replayed notification; nothing changed.
    Unchanged,
}

#[derive(Clone)]
pub struct OrderService {
    pool: PgPool,
    orders: OrderRepository,
    plans: MembershipPlanRepository,
    memberships: UserMembershipRepository,
    payment_accounts: PaymentAccountRepository,
    membership_service: MembershipService,
    commission: CommissionService,
    refunds: RefundService,
    verifier: Arc<dyn CallbackVerifier>,
    pending_expiry: Duration,
    callback_window_secs: i64,
}

impl OrderService {
    pub fn new(state: &AppState) -> Self {
        let pool = state.pool.clone();
        Self {
            orders: OrderRepository::new(pool.clone()),
            plans: MembershipPlanRepository::new(pool.clone()),
            memberships: UserMembershipRepository::new(pool.clone()),
            payment_accounts: PaymentAccountRepository::new(pool.clone()),
            membership_service: MembershipService::new(pool.clone(), state.calendar),
            commission: CommissionService::new(pool.clone()),
            refunds: RefundService::new(state),
            verifier: state.verifier.clone(),
            pending_expiry: Duration::minutes(state.config.orders.pending_expiry_minutes),
            callback_window_secs: state.config.payment.callback_window_secs,
            pool,
        }
    }

    /// Prices and records a pending order for the customer.
    pub async fn place_order(&self, user_id: i64, request: &PlaceOrderRequest) -> Result<Order, ApiError> {
        request.validate()?;
        let now = Utc::now();

        let plan: MembershipPlan = self
            .plans
            .find_by_id(request.plan_id, false)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Plan {} not found", request.plan_id)))?
            .into();
        let memberships = self.memberships.find_effective_with_plans(user_id, now).await?;
        let quote = quote_order(&plan, request.order_type, request.platform, &memberships, now)?;

        let mut draft = NewOrder {
            order_no: String::new(),
            user_id,
            plan_id: plan.id,
            plan_code: plan.plan_code.clone(),
            plan_name: plan.plan_name.clone(),
            platform: request.platform,
            order_type: request.order_type,
            original_price: quote.original_price,
            discount_amount: quote.discount_amount,
            upgrade_credit: quote.upgrade_credit,
            final_amount: quote.final_amount,
            currency: plan.currency.clone(),
            payment_method: request.payment_method.clone(),
            expires_at: now + self.pending_expiry,
            previous_membership_id: quote.previous_membership_id,
        };

        let mut attempt = 0;
        let order: Order = loop {
            attempt += 1;
            draft.order_no = numbering::order_no(Utc::now());
            match self.orders.insert(&draft).await {
                Ok(entity) => break entity.into(),
                Err(e) if attempt < ORDER_NO_ATTEMPTS && is_unique_violation(&e, Some(ORDER_NO_CONSTRAINT)) => {
                    warn!(order_no = %draft.order_no, attempt, "Order number collision, retrying");
                }
                Err(e) if is_unique_violation(&e, Some(PENDING_UPGRADE_CONSTRAINT)) => {
                    return Err(ApiError::Conflict(
                        "An upgrade of this membership is already awaiting payment".to_string(),
                    ));
                }
                Err(e) => return Err(e.into()),
            }
        };

        info!(
            order_id = order.id,
            order_no = %order.order_no,
            user_id,
            plan = %plan.plan_code,
            order_type = order.order_type.as_str(),
            final_amount = %order.final_amount,
            "Order placed"
        );
        Ok(order)
    }

    /// Applies a signed provider notification.
    pub async fn handle_callback(
        &self,
        provider: &str,
        callback: &PaymentCallback,
    ) -> Result<PaymentOutcome, ApiError> {
        let now = Utc::now();
        callback.ensure_fresh(now, self.callback_window_secs)?;

        let account: PaymentAccount = self
            .payment_accounts
            .find_enabled_by_provider(provider)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Payment provider {} is not enabled", provider)))?
            .into();
        if let Err(e) = self.verifier.verify(&account, callback) {
            warn!(provider, order_no = %callback.order_no, "Rejected payment callback signature");
            return Err(e.into());
        }

        let mut tx = self.pool.begin().await?;
        let order: Order = self
            .orders
            .lock_by_no(&mut tx, &callback.order_no)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Order {} not found", callback.order_no)))?
            .into();

        let outcome = match classify_callback(&order, callback)? {
            CallbackAction::MarkPaid => {
                self.settle_paid(&mut tx, &order, &callback.payment_id, Some(account.id), "callback", now)
                    .await?;
                PaymentOutcome::Paid
            }
            CallbackAction::MarkFailed(reason) => {
                self.orders
                    .close_pending(&mut tx, order.id, OrderStatus::Failed, &reason)
                    .await?;
                info!(order_no = %order.order_no, reason = %reason, "Order payment failed");
                PaymentOutcome::Failed
            }
            CallbackAction::NoOp => {
                info!(order_no = %order.order_no, status = order.status.as_str(), "Duplicate payment callback ignored");
                PaymentOutcome::Unchanged
            }
        };
        tx.commit().await?;
        Ok(outcome)
    }

    /// Operator escape hatch: confirm a payment, fail an order, or refund it
    /// without going through the provider.
    pub async fn manual_process(
        &self,
        operator: &Operator,
        request: &ManualProcessRequest,
    ) -> Result<Order, ApiError> {
        request.validate()?;
        ensure_totp(operator, request.totp_code.as_deref())?;
        let now = Utc::now();

        match request.process_type {
            ManualProcessType::ConfirmPayment => {
                let payment_id = request
                    .payment_id
                    .as_deref()
                    .filter(|p| !p.trim().is_empty())
                    .ok_or_else(|| ApiError::Validation("Payment id is required".to_string()))?;

                let mut tx = self.pool.begin().await?;
                let order = self.lock_order(&mut tx, request.order_id).await?;
                if order.status == OrderStatus::Paid {
                    if order.payment_id.as_deref() != Some(payment_id) {
                        warn!(
                            order_no = %order.order_no,
                            recorded = ?order.payment_id,
                            supplied = payment_id,
                            "Order already paid under another payment id, keeping the recorded one"
                        );
                    }
                    return Ok(order);
                }
                order.status.ensure_transition(OrderStatus::Paid)?;

                let account_id = match order.payment_method.as_deref() {
                    Some(method) => self
                        .payment_accounts
                        .find_enabled_by_provider(method)
                        .await?
                        .map(|a| a.id),
                    None => None,
                };
                let paid = self
                    .settle_paid(&mut tx, &order, payment_id, account_id, "manual", now)
                    .await?;
                tx.commit().await?;

                info!(order_no = %paid.order_no, operator_id = operator.id, "Payment confirmed manually");
                Ok(paid)
            }
            ManualProcessType::MarkFailed => {
                let reason = request
                    .note
                    .clone()
                    .filter(|n| !n.trim().is_empty())
                    .unwrap_or_else(|| "marked failed by operator".to_string());

                let mut tx = self.pool.begin().await?;
                let order = self.lock_order(&mut tx, request.order_id).await?;
                order.status.ensure_transition(OrderStatus::Failed)?;
                let failed: Order = self
                    .orders
                    .close_pending(&mut tx, order.id, OrderStatus::Failed, &reason)
                    .await?
                    .into();
                tx.commit().await?;

                info!(order_no = %failed.order_no, operator_id = operator.id, "Order marked failed");
                Ok(failed)
            }
            ManualProcessType::ForceRefund => {
                self.refunds
                    .force_refund(operator, request.order_id, request.note.as_deref())
                    .await?;
                self.get(request.order_id).await
            }
        }
    }

    /// Customer cancels their own pending order.
    pub async fn cancel_own(&self, user_id: i64, order_id: i64) -> Result<Order, ApiError> {
        let mut tx = self.pool.begin().await?;
        let order = self.lock_order(&mut tx, order_id).await?;
        if order.user_id != user_id {
            return Err(ApiError::NotFound(format!("Order {} not found", order_id)));
        }
        let cancelled = self.close(&mut tx, &order, "cancelled by user").await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    pub async fn cancel(&self, order_id: i64, reason: &str) -> Result<Order, ApiError> {
        let mut tx = self.pool.begin().await?;
        let order = self.lock_order(&mut tx, order_id).await?;
        let cancelled = self.close(&mut tx, &order, reason).await?;
        tx.commit().await?;
        Ok(cancelled)
    }

    /// Cancels every listed order or none of them.
    pub async fn batch_cancel(&self, ids: &[i64], reason: &str) -> Result<Vec<Order>, ApiError> {
        if ids.is_empty() {
            return Err(ApiError::Validation("No orders selected".to_string()));
        }
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut tx = self.pool.begin().await?;
        let orders: Vec<Order> = self
            .orders
            .lock_many(&mut tx, &ids)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        if orders.len() != ids.len() {
            return Err(ApiError::NotFound("Some orders were not found".to_string()));
        }
        for order in &orders {
            order.status.ensure_transition(OrderStatus::Cancelled)?;
        }

        let mut cancelled = Vec::with_capacity(orders.len());
        for order in &orders {
            cancelled.push(self.close(&mut tx, order, reason).await?);
        }
        tx.commit().await?;
        Ok(cancelled)
    }

    /// Cancels pending orders past their payment window.
    pub async fn expire_pending(&self, now: DateTime<Utc>) -> Result<u64, ApiError> {
        let ids = self.orders.find_expired_pending(now, EXPIRE_BATCH).await?;
        let mut expired = 0;
        for id in ids {
            let mut tx = self.pool.begin().await?;
            let Some(order) = self.orders.lock(&mut tx, id).await? else {
                continue;
            };
            let order: Order = order.into();
            // A callback may have settled it since the scan.
            if order.status != OrderStatus::Pending || order.expires_at > now {
                continue;
            }
            self.orders
                .close_pending(&mut tx, id, OrderStatus::Cancelled, EXPIRED_REASON)
                .await?;
            tx.commit().await?;
            expired += 1;
        }
        Ok(expired)
    }

    pub async fn get(&self, id: i64) -> Result<Order, ApiError> {
        self.orders
            .find_by_id(id)
            .await?
            .map(Into::into)
            .ok_or_else(|| ApiError::NotFound(format!("Order {} not found", id)))
    }

    pub async fn get_own(&self, user_id: i64, id: i64) -> Result<Order, ApiError> {
        let order = self.get(id).await?;
        if order.user_id != user_id {
            return Err(ApiError::NotFound(format!("Order {} not found", id)));
        }
        Ok(order)
    }

    pub async fn list(&self, filter: &OrderFilter, page: &PageRequest) -> Result<PageResult<Order>, ApiError> {
        let (rows, total) = self.orders.list(filter, page).await?;
        Ok(PageResult::new(rows.into_iter().map(Into::into).collect(), total, page))
    }

    pub async fn list_own(&self, user_id: i64, page: &PageRequest) -> Result<PageResult<Order>, ApiError> {
        let filter = OrderFilter {
            user_id: Some(user_id),
            ..Default::default()
        };
        self.list(&filter, page).await
    }

    /// Marks a locked pending order paid and applies everything a payment buys.
    async fn settle_paid(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        payment_id: &str,
        payment_account_id: Option<i64>,
        source: &'static str,
        now: DateTime<Utc>,
    ) -> Result<Order, ApiError> {
        let paid: Order = self
            .orders
            .mark_paid(conn, order.id, payment_id, now)
            .await
            .map_err(|e| {
                if is_unique_violation(&e, None) {
                    ApiError::Conflict(format!("Payment {} is already used by another order", payment_id))
                } else {
                    e.into()
                }
            })?
            .into();

        self.membership_service.grant_for_order(conn, &paid, now).await?;
        self.commission.emit_for_order(conn, &paid, now).await?;

        if let Some(account_id) = payment_account_id {
            if let Some(entity) = self.payment_accounts.lock(conn, account_id).await? {
                let mut account: PaymentAccount = entity.into();
                if account.record_payment(paid.final_amount, now) {
                    warn!(
                        account_id,
                        daily_amount = %account.daily_amount,
                        daily_limit = ?account.daily_limit,
                        "Payment account exceeded its daily limit"
                    );
                }
                self.payment_accounts.save_stats(conn, &account).await?;
            }
        }

        record_order_paid(source);
        info!(
            order_id = paid.id,
            order_no = %paid.order_no,
            payment_id,
            amount = %paid.final_amount,
            source,
            "Order paid"
        );
        Ok(paid)
    }

    async fn lock_order(&self, conn: &mut PgConnection, id: i64) -> Result<Order, ApiError> {
        self.orders
            .lock(conn, id)
            .await?
            .map(Into::into)
            .ok_or_else(|| ApiError::NotFound(format!("Order {} not found", id)))
    }

    async fn close(&self, conn: &mut PgConnection, order: &Order, reason: &str) -> Result<Order, ApiError> {
        order.status.ensure_transition(OrderStatus::Cancelled)?;
        let cancelled: Order = self
            .orders
            .close_pending(conn, order.id, OrderStatus::Cancelled, reason)
            .await?
            .into();
        info!(order_no = %cancelled.order_no, reason, "Order cancelled");
        Ok(cancelled)
    }
}
