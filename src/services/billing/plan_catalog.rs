use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::BillingError;
use crate::db::plan_repository::PlanRepository;
use crate::models::plan::{ExternalPlanRefs, NewPlan, Plan, PlanPatch};
use crate::services::stripe::{CreateProductRequest, StripeService};

fn validate(name: &str, price_cents: i64, max_members: i32, max_projects: i32) -> Result<(), BillingError> {
    if name.trim().is_empty() {
        return Err(BillingError::InvalidPlan("name must not be empty"));
    }
    if price_cents < 0 {
        return Err(BillingError::InvalidPlan("price must not be negative"));
    }
    if max_members < 1 || max_projects < 1 {
        return Err(BillingError::InvalidPlan("limits must be at least 1"));
    }
    Ok(())
}

/// Admin-managed catalog of subscription tiers, each mirrored to a Stripe product and price.
#[derive(Clone)]
pub struct PlanCatalog {
    plans: Arc<dyn PlanRepository>,
    stripe: Arc<dyn StripeService>,
}

impl PlanCatalog {
    pub fn new(plans: Arc<dyn PlanRepository>, stripe: Arc<dyn StripeService>) -> Self {
        Self { plans, stripe }
    }

    /// Registers the product/price pair first; nothing is stored locally if Stripe refuses.
    pub async fn create_plan(&self, new_plan: NewPlan) -> Result<Plan, BillingError> {
        validate(
            &new_plan.name,
            new_plan.price_cents,
            new_plan.max_members,
            new_plan.max_projects,
        )?;

        if self
            .plans
            .find_plan_by_name_and_interval(&new_plan.name, new_plan.interval)
            .await?
            .is_some()
        {
            return Err(BillingError::PlanAlreadyExists);
        }

        let registered = self
            .stripe
            .create_product_with_price(CreateProductRequest {
                name: new_plan.name.clone(),
                unit_amount: new_plan.price_cents,
                interval: new_plan.interval,
            })
            .await?;

        let external = ExternalPlanRefs {
            product_id: registered.product_id,
            price_id: registered.price_id,
        };
        let plan = self
            .plans
            .create_plan(&new_plan, &external)
            .await
            .map_err(map_unique_violation)?;

        info!(
            plan_id = %plan.id,
            name = %plan.name,
            interval = plan.interval.as_str(),
            price_id = %external.price_id,
            "plan created"
        );
        Ok(plan)
    }

    pub async fn update_plan(&self, plan_id: Uuid, patch: PlanPatch) -> Result<Plan, BillingError> {
        let mut plan = self.get_plan(plan_id).await?;
        patch.apply_to(&mut plan);
        validate(&plan.name, plan.price_cents, plan.max_members, plan.max_projects)?;

        if let Some(existing) = self
            .plans
            .find_plan_by_name_and_interval(&plan.name, plan.interval)
            .await?
        {
            if existing.id != plan.id {
                return Err(BillingError::PlanAlreadyExists);
            }
        }

        if patch.price_cents.is_some() {
            // the Stripe price is immutable; new checkouts keep billing the registered amount
            warn!(%plan_id, "plan price edited locally; stripe price left unchanged");
        }

        let updated = self
            .plans
            .update_plan(&plan)
            .await
            .map_err(map_unique_violation)?;
        info!(%plan_id, active = updated.is_active, "plan updated");
        Ok(updated)
    }

    pub async fn get_plan(&self, plan_id: Uuid) -> Result<Plan, BillingError> {
        self.plans
            .find_plan(plan_id)
            .await?
            .ok_or(BillingError::PlanNotFound)
    }

    pub async fn get_active_plans(&self) -> Result<Vec<Plan>, BillingError> {
        Ok(self.plans.list_plans(true).await?)
    }

    pub async fn get_all_plans(&self) -> Result<Vec<Plan>, BillingError> {
        Ok(self.plans.list_plans(false).await?)
    }
}

fn map_unique_violation(err: sqlx::Error) -> BillingError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => BillingError::PlanAlreadyExists,
        _ => BillingError::Database(err),
    }
}
