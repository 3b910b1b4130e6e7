//! Membership plans, applications and their packages.

use domain::models::app_package::{AppPackage, CreatePackageRequest, UpdatePackageRequest};
use domain::models::application::{place_category, Application, Category, CreateApplicationRequest};
use domain::models::membership_plan::{MembershipPlan, PlanDraft, PlanFilter, UpdatePlanRequest};
use persistence::repositories::{AppPackageRepository, ApplicationRepository, MembershipPlanRepository};
use shared::pagination::{PageRequest, PageResult};
use sqlx::PgPool;
use tracing::info;
use validator::Validate;

use crate::error::ApiError;

#[derive(Clone)]
pub struct CatalogService {
    plans: MembershipPlanRepository,
    applications: ApplicationRepository,
    packages: AppPackageRepository,
}

impl CatalogService {
    pub fn new(pool: PgPool) -> Self {
        Self {
            plans: MembershipPlanRepository::new(pool.clone()),
            applications: ApplicationRepository::new(pool.clone()),
            packages: AppPackageRepository::new(pool),
        }
    }

    pub async fn create_plan(&self, draft: PlanDraft) -> Result<MembershipPlan, ApiError> {
        draft.validate()?;
        let draft = draft.into_checked()?;
        let plan: MembershipPlan = self.plans.create(&draft).await?.into();
        info!(plan_id = plan.id, code = %plan.plan_code, "Plan created");
        Ok(plan)
    }

    /// Merges the patch into the stored plan and rechecks every invariant.
    pub async fn update_plan(&self, id: i64, patch: UpdatePlanRequest) -> Result<MembershipPlan, ApiError> {
        let current = self.get_plan(id).await?;
        let draft = patch.apply_to(&current);
        draft.validate()?;
        let draft = draft.into_checked()?;
        let plan: MembershipPlan = self
            .plans
            .update(id, &draft)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Plan {} not found", id)))?
            .into();
        info!(plan_id = id, "Plan updated");
        Ok(plan)
    }

    /// Plans referenced by a membership or an order stay.
    pub async fn delete_plan(&self, id: i64) -> Result<(), ApiError> {
        if self.plans.is_in_use(id).await? {
            return Err(ApiError::PreconditionFailed(
                "Plan is referenced by memberships or orders".to_string(),
            ));
        }
        if !self.plans.soft_delete(id).await? {
            return Err(ApiError::NotFound(format!("Plan {} not found", id)));
        }
        info!(plan_id = id, "Plan deleted");
        Ok(())
    }

    pub async fn get_plan(&self, id: i64) -> Result<MembershipPlan, ApiError> {
        self.plans
            .find_by_id(id, false)
            .await?
            .map(Into::into)
            .ok_or_else(|| ApiError::NotFound(format!("Plan {} not found", id)))
    }

    pub async fn list_plans(
        &self,
        filter: &PlanFilter,
        page: &PageRequest,
    ) -> Result<PageResult<MembershipPlan>, ApiError> {
        let platforms = filter.platform_names()?;
        let platforms = (!platforms.is_empty()).then_some(platforms.as_slice());
        let (rows, total) = self.plans.list(filter, platforms, page).await?;
        Ok(PageResult::new(rows.into_iter().map(Into::into).collect(), total, page))
    }

    pub async fn list_active_plans(&self) -> Result<Vec<MembershipPlan>, ApiError> {
        Ok(self
            .plans
            .list_active()
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub async fn create_application(&self, request: &CreateApplicationRequest) -> Result<Application, ApiError> {
        request.validate()?;
        let placement = match request.category_id {
            Some(id) => {
                let leaf: Category = self
                    .applications
                    .find_category(id)
                    .await?
                    .ok_or_else(|| ApiError::PreconditionFailed(format!("Category {} does not exist", id)))?
                    .into();
                Some(place_category(&leaf))
            }
            None => None,
        };
        let app: Application = self.applications.create(request, placement).await?.into();
        info!(app_id = %app.app_id, "Application created");
        Ok(app)
    }

    pub async fn get_application(&self, app_id: &str) -> Result<Application, ApiError> {
        self.applications
            .find_by_app_id(app_id)
            .await?
            .map(Into::into)
            .ok_or_else(|| ApiError::NotFound(format!("Application {} not found", app_id)))
    }

    pub async fn list_applications(
        &self,
        keyword: Option<&str>,
        page: &PageRequest,
    ) -> Result<PageResult<Application>, ApiError> {
        let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());
        let (rows, total) = self.applications.list(keyword, page).await?;
        Ok(PageResult::new(rows.into_iter().map(Into::into).collect(), total, page))
    }

    pub async fn create_package(&self, request: &CreatePackageRequest) -> Result<AppPackage, ApiError> {
        request.validate()?;
        self.get_application(&request.app_id).await?;
        self.ensure_plans_exist(&request.plan_ids).await?;
        let package: AppPackage = self.packages.create(request).await?.into();
        info!(package_id = package.id, app_id = %package.app_id, version = %package.version_name, "Package created");
        Ok(package)
    }

    pub async fn update_package(&self, id: i64, request: &UpdatePackageRequest) -> Result<AppPackage, ApiError> {
        request.validate()?;
        self.packages
            .update(id, request)
            .await?
            .map(Into::into)
            .ok_or_else(|| ApiError::NotFound(format!("Package {} not found", id)))
    }

    pub async fn delete_package(&self, id: i64) -> Result<(), ApiError> {
        if !self.packages.delete(id).await? {
            return Err(ApiError::NotFound(format!("Package {} not found", id)));
        }
        info!(package_id = id, "Package deleted");
        Ok(())
    }

    pub async fn list_packages(&self, app_id: &str) -> Result<Vec<AppPackage>, ApiError> {
        Ok(self
            .packages
            .list_for_app(app_id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect())
    }

    pub async fn package_plans(&self, package_id: i64) -> Result<Vec<i64>, ApiError> {
        self.ensure_package(package_id).await?;
        Ok(self.packages.plan_ids(package_id).await?)
    }

    /// Replaces (`replace = true`) or extends the plans linked to a package.
    pub async fn link_plans(&self, package_id: i64, plan_ids: &[i64], replace: bool) -> Result<Vec<i64>, ApiError> {
        self.ensure_package(package_id).await?;
        self.ensure_plans_exist(plan_ids).await?;
        if replace {
            self.packages.set_plans(package_id, plan_ids).await?;
        } else {
            self.packages.add_plans(package_id, plan_ids).await?;
        }
        Ok(self.packages.plan_ids(package_id).await?)
    }

    async fn ensure_package(&self, id: i64) -> Result<(), ApiError> {
        match self.packages.find_by_id(id).await? {
            Some(_) => Ok(()),
            None => Err(ApiError::NotFound(format!("Package {} not found", id))),
        }
    }

    async fn ensure_plans_exist(&self, plan_ids: &[i64]) -> Result<(), ApiError> {
        if plan_ids.is_empty() {
            return Ok(());
        }
        let mut wanted = plan_ids.to_vec();
        wanted.sort_unstable();
        wanted.dedup();
        let found = self.plans.find_by_ids(&wanted).await?;
        if found.len() != wanted.len() {
            return Err(ApiError::PreconditionFailed(
                "Some linked plans do not exist".to_string(),
            ));
        }
        Ok(())
    }
}
