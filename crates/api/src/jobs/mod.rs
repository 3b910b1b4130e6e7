//! Background job scheduler and job implementations.

mod expire_memberships;
mod expire_orders;
mod housekeeping;
mod pool_metrics;
mod scheduler;
mod settle_commissions;

pub use expire_memberships::ExpireMembershipsJob;
pub use expire_orders::ExpirePendingOrdersJob;
pub use housekeeping::{PurgeTokenBlacklistJob, ResetPaymentAccountDailyJob};
pub use pool_metrics::PoolMetricsJob;
pub use scheduler::{Job, JobFrequency, JobScheduler};
pub use settle_commissions::SettleHeldCommissionsJob;

use crate::app::AppState;

/// Scheduler with every maintenance job registered.
pub fn build_scheduler(state: &AppState) -> JobScheduler {
    let mut scheduler = JobScheduler::new(state.calendar);
    scheduler.register(PoolMetricsJob::new(state.pool.clone()));
    scheduler.register(ExpirePendingOrdersJob::new(state));
    scheduler.register(ExpireMembershipsJob::new(state));
    scheduler.register(SettleHeldCommissionsJob::new(state.pool.clone()));
    scheduler.register(ResetPaymentAccountDailyJob::new(state.pool.clone()));
    scheduler.register(PurgeTokenBlacklistJob::new(state.pool.clone()));
    scheduler
}
