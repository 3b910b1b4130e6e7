//! Marks memberships past their end date as expired.

use chrono::Utc;

use super::scheduler::{Job, JobFrequency};
use crate::app::AppState;
use crate::services::MembershipService;

pub struct ExpireMembershipsJob {
    memberships: MembershipService,
}

impl ExpireMembershipsJob {
    pub fn new(state: &AppState) -> Self {
        Self {
            memberships: MembershipService::new(state.pool.clone(), state.calendar),
        }
    }
}

#[async_trait::async_trait]
impl Job for ExpireMembershipsJob {
    fn name(&self) -> &'static str {
        "expire_memberships"
    }

    fn frequency(&self) -> JobFrequency {
        JobFrequency::Hourly
    }

    async fn execute(&self) -> Result<u64, String> {
        self.memberships
            .expire_due(Utc::now())
            .await
            .map_err(|e| e.to_string())
    }
}
