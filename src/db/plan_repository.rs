use async_trait::async_trait;
use uuid::Uuid;

use crate::models::plan::{BillingInterval, ExternalPlanRefs, NewPlan, Plan};

#[async_trait]
pub trait PlanRepository: Send + Sync {
    async fn create_plan(
        &self,
        plan: &NewPlan,
        external: &ExternalPlanRefs,
    ) -> Result<Plan, sqlx::Error>;

    async fn find_plan(&self, plan_id: Uuid) -> Result<Option<Plan>, sqlx::Error>;

    async fn find_plan_by_name_and_interval(
        &self,
        name: &str,
        interval: BillingInterval,
    ) -> Result<Option<Plan>, sqlx::Error>;

    async fn find_plan_by_stripe_price_id(
        &self,
        price_id: &str,
    ) -> Result<Option<Plan>, sqlx::Error>;

    async fn list_plans(&self, active_only: bool) -> Result<Vec<Plan>, sqlx::Error>;

    /// Persists the editable fields of `plan`. Stripe references are never written here.
    async fn update_plan(&self, plan: &Plan) -> Result<Plan, sqlx::Error>;
}
