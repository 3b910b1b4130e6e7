//! Download engine: decides, charges quota and hands out the artifact.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use domain::models::app_package::AppPackage;
use domain::models::application::Application;
use domain::models::download::{DownloadDecision, DownloadLog};
use domain::models::platform::Platform;
use domain::models::sys_config::{parse_ios_accounts, KEY_IOS_ACCOUNT, SCOPE_WEBSITE};
use domain::models::user_membership::{MembershipWithPlan, UserMembership};
use domain::services::calendar::BusinessCalendar;
use domain::services::entitlement::{
    decide, download_candidates, Entitlement, EntitlementInput, NO_POOL_ACCOUNT_MESSAGE,
    UPGRADE_REQUIRED_MESSAGE,
};
use domain::services::ports::ObjectStore;
use domain::DomainError;
use persistence::repositories::{
    AppAccountRepository, AppPackageRepository, ApplicationRepository, DownloadLogRepository,
    SysConfigRepository, UserMembershipRepository,
};
use shared::validation::is_public_key;
use sqlx::PgPool;
use tracing::{debug, warn};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ClientMeta;
use crate::middleware::metrics::record_download;

#[derive(Clone)]
pub struct DownloadService {
    pool: PgPool,
    applications: ApplicationRepository,
    packages: AppPackageRepository,
    memberships: UserMembershipRepository,
    app_accounts: AppAccountRepository,
    sys_config: SysConfigRepository,
    logs: DownloadLogRepository,
    object_store: Arc<dyn ObjectStore>,
    calendar: BusinessCalendar,
    signed_url_ttl_secs: u64,
}

impl DownloadService {
    pub fn new(state: &AppState) -> Self {
        let pool = state.pool.clone();
        Self {
            applications: ApplicationRepository::new(pool.clone()),
            packages: AppPackageRepository::new(pool.clone()),
            memberships: UserMembershipRepository::new(pool.clone()),
            app_accounts: AppAccountRepository::new(pool.clone(), state.cipher.clone()),
            sys_config: SysConfigRepository::new(pool.clone()),
            logs: DownloadLogRepository::new(pool.clone()),
            object_store: state.object_store.clone(),
            calendar: state.calendar,
            signed_url_ttl_secs: state.config.storage.signed_url_ttl_secs,
            pool,
        }
    }

    /// Authorizes a download of `app_id` and returns what the client needs.
    ///
    /// Denials come back as a decision with `allow = false`; hard failures
    /// (unknown app, unsupported platform, storage outage) are errors.
    pub async fn decide(
        &self,
        user_id: i64,
        app_id: &str,
        platform: Option<Platform>,
        client: &ClientMeta,
    ) -> Result<DownloadDecision, ApiError> {
        let platform = platform
            .or_else(|| client.platform())
            .ok_or_else(|| ApiError::Validation("Unable to detect the device platform".to_string()))?;

        let result = self.run(user_id, app_id, platform).await;
        let label = match &result {
            Ok(decision) => decision.outcome(),
            Err(_) => "error",
        };
        record_download(platform.as_str(), label);

        self.log_async(DownloadLog {
            user_id,
            app_id: app_id.to_string(),
            platform,
            success: matches!(&result, Ok(d) if d.allow),
            ip: client.ip.clone(),
            user_agent: client.user_agent.clone(),
            created_at: Utc::now(),
        });
        result
    }

    async fn run(&self, user_id: i64, app_id: &str, platform: Platform) -> Result<DownloadDecision, ApiError> {
        let now = Utc::now();
        let application: Application = self
            .applications
            .find_by_app_id(app_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Application {} not found", app_id)))?
            .into();
        let packages: Vec<AppPackage> = self
            .packages
            .list_published(app_id, platform)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        let memberships = if application.is_free {
            Vec::new()
        } else {
            self.effective_memberships(user_id, now).await?
        };
        let ios_accounts = if application.is_free && platform == Platform::Ios {
            self.sys_config
                .get(SCOPE_WEBSITE, KEY_IOS_ACCOUNT)
                .await?
                .map(|raw| parse_ios_accounts(&raw))
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        let package_plan_ids = match packages.first() {
            Some(package) if !application.is_free && platform == Platform::Android => {
                self.packages.plan_ids(package.id).await?
            }
            _ => Vec::new(),
        };

        let entitlement = decide(
            EntitlementInput {
                application: &application,
                platform,
                packages: &packages,
                memberships: &memberships,
                ios_accounts: &ios_accounts,
                package_plan_ids: &package_plan_ids,
            },
            &mut rand::thread_rng(),
        )?;
        debug!(user_id, app_id, platform = platform.as_str(), ?entitlement, "Download decided");

        match entitlement {
            Entitlement::SignPackage {
                package,
                membership_id: None,
            } => Ok(DownloadDecision::url(self.artifact_url(&package).await?)),
            Entitlement::SignPackage {
                package,
                membership_id: Some(membership_id),
            } => {
                // Chosen first, then the ones after it in case the choice ran dry concurrently.
                let candidates: Vec<&MembershipWithPlan> =
                    download_candidates(&memberships, platform, &package_plan_ids)
                        .into_iter()
                        .skip_while(|m| m.membership.id != membership_id)
                        .collect();
                if candidates.is_empty() {
                    return Err(ApiError::Internal("Chosen membership vanished".to_string()));
                }
                self.charged_download(&candidates, &package, now).await
            }
            Entitlement::Credential(detail) => Ok(DownloadDecision::credential(detail)),
            Entitlement::PoolCredential { membership_id } => {
                match self.app_accounts.pick_shared(app_id).await? {
                    Some(account) => Ok(DownloadDecision::credential(account.account_detail)),
                    None => {
                        warn!(app_id, membership_id, "App account pool is empty");
                        Ok(DownloadDecision::deny(NO_POOL_ACCOUNT_MESSAGE))
                    }
                }
            }
            Entitlement::Denied(reason) => Ok(DownloadDecision::deny(reason)),
        }
    }

    /// Effective memberships with today's counter resets applied.
    async fn effective_memberships(
        &self,
        user_id: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<MembershipWithPlan>, ApiError> {
        let mut memberships = self.memberships.find_effective_with_plans(user_id, now).await?;
        memberships.retain(|view| view.membership.is_effective(now));
        for view in &mut memberships {
            self.calendar.reset_membership(&mut view.membership, now);
        }
        Ok(memberships)
    }

    /// Counts the download against the first candidate with quota left and
    /// signs the package.
    ///
    /// Counter rows stay locked until the URL is ready, so a signing failure
    /// does not cost the user a download.
    async fn charged_download(
        &self,
        candidates: &[&MembershipWithPlan],
        package: &AppPackage,
        now: DateTime<Utc>,
    ) -> Result<DownloadDecision, ApiError> {
        let mut tx = self.pool.begin().await?;
        let mut denial = None;
        for view in candidates {
            let Some(locked) = self.memberships.lock(&mut tx, view.membership.id).await? else {
                continue;
            };
            let mut membership: UserMembership = locked.into();
            if !membership.is_effective(now) {
                continue;
            }
            self.calendar.reset_membership(&mut membership, now);

            match membership.record_download(view.limits()) {
                Ok(()) => {}
                Err(DomainError::QuotaExceeded(reason)) => {
                    debug!(membership_id = membership.id, reason = %reason, "Membership ran out of quota, trying next");
                    denial = Some(reason);
                    continue;
                }
                Err(e) => return Err(e.into()),
            }
            self.memberships.save_counters(&mut tx, &membership).await?;

            let url = self.artifact_url(package).await?;
            tx.commit().await?;
            return Ok(DownloadDecision::url(url));
        }

        Ok(DownloadDecision::deny(
            denial.unwrap_or_else(|| UPGRADE_REQUIRED_MESSAGE.to_string()),
        ))
    }

    /// Public objects get a plain URL; private ones a short-lived signature.
    async fn artifact_url(&self, package: &AppPackage) -> Result<String, ApiError> {
        let Some(key) = package.object_name.as_deref().filter(|k| !k.is_empty()) else {
            return package
                .file_url
                .clone()
                .ok_or_else(|| ApiError::Internal(format!("Package {} has no artifact", package.id)));
        };
        if is_public_key(key) {
            return Ok(self.object_store.public_url(key));
        }

        let disposition = package.content_disposition();
        match self
            .object_store
            .sign_get(key, self.signed_url_ttl_secs, &disposition)
            .await
        {
            Ok(url) => Ok(url),
            Err(DomainError::ExternalDependency(first)) => {
                warn!(object_key = key, error = %first, "Signing failed, retrying once");
                Ok(self
                    .object_store
                    .sign_get(key, self.signed_url_ttl_secs, &disposition)
                    .await?)
            }
            Err(e) => Err(e.into()),
        }
    }

    fn log_async(&self, log: DownloadLog) {
        let logs = self.logs.clone();
        tokio::spawn(async move {
            if let Err(e) = logs.insert(&log).await {
                warn!(user_id = log.user_id, app_id = %log.app_id, error = %e, "Failed to write download log");
            }
        });
    }
}
