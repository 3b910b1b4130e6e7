//! Settles commission details whose hold period has passed.

use chrono::Utc;

use super::scheduler::{Job, JobFrequency};
use crate::services::CommissionService;

pub struct SettleHeldCommissionsJob {
    commission: CommissionService,
}

impl SettleHeldCommissionsJob {
    pub fn new(pool: sqlx::PgPool) -> Self {
        Self {
            commission: CommissionService::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl Job for SettleHeldCommissionsJob {
    fn name(&self) -> &'static str {
        "settle_held_commissions"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<u64, String> {
        self.commission
            .settle_due(Utc::now())
            .await
            .map_err(|e| e.to_string())
    }
}
