//! Membership ledger: grants on payment, customer views and expiry.

use chrono::{DateTime, Utc};
use domain::models::membership_plan::MembershipPlan;
use domain::models::order::{Order, OrderType};
use domain::models::user_membership::{MembershipSummary, NewMembership, UserMembership};
use domain::services::calendar::BusinessCalendar;
use persistence::repositories::{MembershipPlanRepository, UserMembershipRepository};
use sqlx::{PgConnection, PgPool};
use tracing::{info, warn};

use crate::error::ApiError;

#[derive(Clone)]
pub struct MembershipService {
    plans: MembershipPlanRepository,
    memberships: UserMembershipRepository,
    calendar: BusinessCalendar,
}

impl MembershipService {
    pub fn new(pool: PgPool, calendar: BusinessCalendar) -> Self {
        Self {
            plans: MembershipPlanRepository::new(pool.clone()),
            memberships: UserMembershipRepository::new(pool),
            calendar,
        }
    }

    /// Creates the membership a paid order buys.
    ///
    /// Upgrades and renewals replace the membership they were priced against.
    /// Runs inside the caller's transaction. Returns the new membership id.
    pub async fn grant_for_order(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<i64, ApiError> {
        // Deleted plans still back the orders placed on them.
        let plan: MembershipPlan = self
            .plans
            .find_by_id(order.plan_id, true)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Plan {} not found", order.plan_id)))?
            .into();

        let previous: Option<UserMembership> = match order.order_type {
            OrderType::Upgrade => {
                let id = order.previous_membership_id.ok_or_else(|| {
                    ApiError::Internal(format!("Upgrade order {} has no previous membership", order.id))
                })?;
                let previous: UserMembership = self
                    .memberships
                    .lock(conn, id)
                    .await?
                    .ok_or_else(|| ApiError::NotFound(format!("Membership {} not found", id)))?
                    .into();
                Some(previous)
            }
            OrderType::Renew => self
                .memberships
                .lock_effective_on_plan(conn, order.user_id, order.plan_id, now)
                .await?
                .map(Into::into),
            OrderType::New | OrderType::Downgrade => None,
        };
        // The upgrade credit was priced against this membership; it can only be spent once.
        if let Some(previous) = &previous {
            if let Err(e) = previous.ensure_replaceable() {
                warn!(
                    membership_id = previous.id,
                    order_id = order.id,
                    error = %e,
                    "Previous membership already replaced, refusing settlement"
                );
                return Err(e.into());
            }
        }

        let draft = NewMembership::for_paid_order(
            order,
            &plan,
            previous.as_ref(),
            now,
            self.calendar.today(now),
        );
        let granted: UserMembership = self.memberships.insert(conn, &draft).await?.into();

        if let Some(previous) = previous {
            if !self
                .memberships
                .mark_replaced(conn, previous.id, granted.id)
                .await?
            {
                return Err(ApiError::Conflict(format!(
                    "Membership {} changed before it could be replaced",
                    previous.id
                )));
            }
        }

        info!(
            order_id = order.id,
            user_id = order.user_id,
            membership_id = granted.id,
            plan = %plan.plan_code,
            end_date = ?granted.end_date,
            "Membership granted"
        );
        Ok(granted.id)
    }

    /// Effective memberships with remaining quota.
    pub async fn summaries(&self, user_id: i64) -> Result<Vec<MembershipSummary>, ApiError> {
        let now = Utc::now();
        let today = self.calendar.today(now);
        let views = self
            .memberships
            .find_effective_with_plans(user_id, now)
            .await?;
        Ok(views
            .iter()
            .map(|view| MembershipSummary::new(view, today))
            .collect())
    }

    pub async fn expire_due(&self, now: DateTime<Utc>) -> Result<u64, ApiError> {
        Ok(self.memberships.expire_due(now).await?)
    }
}
