//! Closes pending orders that outlived their payment window.

use chrono::Utc;

use super::scheduler::{Job, JobFrequency};
use crate::app::AppState;
use crate::services::OrderService;

pub struct ExpirePendingOrdersJob {
    orders: OrderService,
}

impl ExpirePendingOrdersJob {
    pub fn new(state: &AppState) -> Self {
        Self {
            orders: OrderService::new(state),
        }
    }
}

#[async_trait::async_trait]
impl Job for ExpirePendingOrdersJob {
    fn name(&self) -> &'static str {
        "expire_pending_orders"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Minutes(1)
    }

    async fn execute(&self) -> Result<u64, String> {
        self.orders
            .expire_pending(Utc::now())
            .await
            .map_err(|e| e.to_string())
    }
}
