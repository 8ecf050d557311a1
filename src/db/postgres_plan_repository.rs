use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::plan_repository::PlanRepository;
use crate::models::plan::{BillingInterval, ExternalPlanRefs, NewPlan, Plan};

const PLAN_COLUMNS: &str = r#"
    id, name, price_cents, interval, max_members, max_projects, features, is_active,
    stripe_product_id, stripe_price_id, created_at, updated_at
"#;

pub struct PostgresPlanRepository {
    pub pool: PgPool,
}

#[async_trait]
impl PlanRepository for PostgresPlanRepository {
    async fn create_plan(
        &self,
        plan: &NewPlan,
        external: &ExternalPlanRefs,
    ) -> Result<Plan, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO plans (name, price_cents, interval, max_members, max_projects, features,
                               is_active, stripe_product_id, stripe_price_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
            RETURNING {PLAN_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Plan>(&sql)
            .bind(&plan.name)
            .bind(plan.price_cents)
            .bind(plan.interval)
            .bind(plan.max_members)
            .bind(plan.max_projects)
            .bind(&plan.features)
            .bind(plan.is_active)
            .bind(&external.product_id)
            .bind(&external.price_id)
            .fetch_one(&self.pool)
            .await
    }

    async fn find_plan(&self, plan_id: Uuid) -> Result<Option<Plan>, sqlx::Error> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM plans WHERE id = $1");
        sqlx::query_as::<_, Plan>(&sql)
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_plan_by_name_and_interval(
        &self,
        name: &str,
        interval: BillingInterval,
    ) -> Result<Option<Plan>, sqlx::Error> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM plans WHERE name = $1 AND interval = $2");
        sqlx::query_as::<_, Plan>(&sql)
            .bind(name)
            .bind(interval)
            .fetch_optional(&self.pool)
            .await
    }

    async fn find_plan_by_stripe_price_id(
        &self,
        price_id: &str,
    ) -> Result<Option<Plan>, sqlx::Error> {
        let sql = format!("SELECT {PLAN_COLUMNS} FROM plans WHERE stripe_price_id = $1");
        sqlx::query_as::<_, Plan>(&sql)
            .bind(price_id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn list_plans(&self, active_only: bool) -> Result<Vec<Plan>, sqlx::Error> {
        let sql = format!(
            r#"
            SELECT {PLAN_COLUMNS} FROM plans
            WHERE ($1 = false OR is_active = true)
            ORDER BY price_cents ASC, name ASC
            "#
        );
        sqlx::query_as::<_, Plan>(&sql)
            .bind(active_only)
            .fetch_all(&self.pool)
            .await
    }

    async fn update_plan(&self, plan: &Plan) -> Result<Plan, sqlx::Error> {
        let sql = format!(
            r#"
            UPDATE plans
            SET name = $2, price_cents = $3, max_members = $4, max_projects = $5,
                features = $6, is_active = $7, updated_at = now()
            WHERE id = $1
            RETURNING {PLAN_COLUMNS}
            "#
        );
        sqlx::query_as::<_, Plan>(&sql)
            .bind(plan.id)
            .bind(&plan.name)
            .bind(plan.price_cents)
            .bind(plan.max_members)
            .bind(plan.max_projects)
            .bind(&plan.features)
            .bind(plan.is_active)
            .fetch_one(&self.pool)
            .await
    }
}
