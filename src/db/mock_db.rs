use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use time::OffsetDateTime;
use uuid::Uuid;

use super::plan_repository::PlanRepository;
use super::subscription_repository::SubscriptionRepository;
use super::workspace_repository::WorkspaceRepository;
use crate::models::plan::{BillingInterval, ExternalPlanRefs, NewPlan, Plan};
use crate::models::subscription::{NewSubscription, Subscription, SubscriptionSync};
use crate::models::workspace::{NewWorkspace, Workspace};

fn mock_failure() -> sqlx::Error {
    sqlx::Error::Protocol("Mock DB failure".into())
}

fn unique_violation(constraint: &str) -> sqlx::Error {
    sqlx::Error::Protocol(format!("duplicate key value violates unique constraint \"{constraint}\""))
}

/// Vec-backed plan catalog that enforces the `(name, interval)` uniqueness of the real table.
#[derive(Clone, Default)]
pub struct InMemoryPlanRepository {
    pub plans: Arc<Mutex<Vec<Plan>>>,
    pub should_fail: Arc<AtomicBool>,
}

impl InMemoryPlanRepository {
    pub fn with_plans(plans: Vec<Plan>) -> Self {
        Self {
            plans: Arc::new(Mutex::new(plans)),
            ..Default::default()
        }
    }

    pub fn all(&self) -> Vec<Plan> {
        self.plans.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(mock_failure());
        }
        Ok(())
    }
}

#[async_trait]
impl PlanRepository for InMemoryPlanRepository {
    async fn create_plan(
        &self,
        plan: &NewPlan,
        external: &ExternalPlanRefs,
    ) -> Result<Plan, sqlx::Error> {
        self.check()?;
        let mut plans = self.plans.lock().unwrap();
        if plans
            .iter()
            .any(|p| p.name == plan.name && p.interval == plan.interval)
        {
            return Err(unique_violation("plans_name_interval_key"));
        }
        let now = OffsetDateTime::now_utc();
        let created = Plan {
            id: Uuid::new_v4(),
            name: plan.name.clone(),
            price_cents: plan.price_cents,
            interval: plan.interval,
            max_members: plan.max_members,
            max_projects: plan.max_projects,
            features: plan.features.clone(),
            is_active: plan.is_active,
            stripe_product_id: Some(external.product_id.clone()),
            stripe_price_id: Some(external.price_id.clone()),
            created_at: now,
            updated_at: now,
        };
        plans.push(created.clone());
        Ok(created)
    }

    async fn find_plan(&self, plan_id: Uuid) -> Result<Option<Plan>, sqlx::Error> {
        self.check()?;
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == plan_id)
            .cloned())
    }

    async fn find_plan_by_name_and_interval(
        &self,
        name: &str,
        interval: BillingInterval,
    ) -> Result<Option<Plan>, sqlx::Error> {
        self.check()?;
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == name && p.interval == interval)
            .cloned())
    }

    async fn find_plan_by_stripe_price_id(
        &self,
        price_id: &str,
    ) -> Result<Option<Plan>, sqlx::Error> {
        self.check()?;
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.stripe_price_id.as_deref() == Some(price_id))
            .cloned())
    }

    async fn list_plans(&self, active_only: bool) -> Result<Vec<Plan>, sqlx::Error> {
        self.check()?;
        let mut plans: Vec<Plan> = self
            .plans
            .lock()
            .unwrap()
            .iter()
            .filter(|p| !active_only || p.is_active)
            .cloned()
            .collect();
        plans.sort_by_key(|p| p.price_cents);
        Ok(plans)
    }

    async fn update_plan(&self, plan: &Plan) -> Result<Plan, sqlx::Error> {
        self.check()?;
        let mut plans = self.plans.lock().unwrap();
        if plans
            .iter()
            .any(|p| p.id != plan.id && p.name == plan.name && p.interval == plan.interval)
        {
            return Err(unique_violation("plans_name_interval_key"));
        }
        let stored = plans
            .iter_mut()
            .find(|p| p.id == plan.id)
            .ok_or(sqlx::Error::RowNotFound)?;
        stored.name = plan.name.clone();
        stored.price_cents = plan.price_cents;
        stored.max_members = plan.max_members;
        stored.max_projects = plan.max_projects;
        stored.features = plan.features.clone();
        stored.is_active = plan.is_active;
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryWorkspaceRepository {
    pub workspaces: Arc<Mutex<Vec<Workspace>>>,
    pub should_fail: Arc<AtomicBool>,
}

impl InMemoryWorkspaceRepository {
    pub fn all(&self) -> Vec<Workspace> {
        self.workspaces.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(mock_failure());
        }
        Ok(())
    }

    fn update<F>(&self, workspace_id: Uuid, apply: F) -> Result<Workspace, sqlx::Error>
    where
        F: FnOnce(&mut Workspace),
    {
        self.check()?;
        let mut workspaces = self.workspaces.lock().unwrap();
        let stored = workspaces
            .iter_mut()
            .find(|w| w.id == workspace_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        apply(stored);
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }
}

#[async_trait]
impl WorkspaceRepository for InMemoryWorkspaceRepository {
    async fn create_workspace(&self, workspace: &NewWorkspace) -> Result<Workspace, sqlx::Error> {
        self.check()?;
        let mut workspaces = self.workspaces.lock().unwrap();
        if workspaces.iter().any(|w| w.name == workspace.name) {
            return Err(unique_violation("workspaces_name_key"));
        }
        let now = OffsetDateTime::now_utc();
        let created = Workspace {
            id: Uuid::new_v4(),
            name: workspace.name.clone(),
            description: workspace.description.clone(),
            owner_id: workspace.owner_id,
            member_ids: workspace.member_ids.clone(),
            plan_id: workspace.plan_id,
            subscription_id: None,
            created_at: now,
            updated_at: now,
        };
        workspaces.push(created.clone());
        Ok(created)
    }

    async fn find_workspace(&self, workspace_id: Uuid) -> Result<Option<Workspace>, sqlx::Error> {
        self.check()?;
        Ok(self
            .workspaces
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.id == workspace_id)
            .cloned())
    }

    async fn find_workspace_by_name(&self, name: &str) -> Result<Option<Workspace>, sqlx::Error> {
        self.check()?;
        Ok(self
            .workspaces
            .lock()
            .unwrap()
            .iter()
            .find(|w| w.name == name)
            .cloned())
    }

    async fn update_workspace_plan(
        &self,
        workspace_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Workspace, sqlx::Error> {
        self.update(workspace_id, |w| w.plan_id = Some(plan_id))
    }

    async fn set_workspace_subscription(
        &self,
        workspace_id: Uuid,
        subscription_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Workspace, sqlx::Error> {
        self.update(workspace_id, |w| {
            w.subscription_id = Some(subscription_id);
            w.plan_id = Some(plan_id);
        })
    }
}

#[derive(Clone, Default)]
pub struct InMemorySubscriptionRepository {
    pub subscriptions: Arc<Mutex<Vec<Subscription>>>,
    pub should_fail: Arc<AtomicBool>,
    /// Fails only `create_subscription`, leaving reads working.
    pub fail_create: Arc<AtomicBool>,
}

impl InMemorySubscriptionRepository {
    pub fn all(&self) -> Vec<Subscription> {
        self.subscriptions.lock().unwrap().clone()
    }

    /// Seeds a row directly, bypassing uniqueness checks.
    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions.lock().unwrap().push(subscription);
    }

    fn check(&self) -> Result<(), sqlx::Error> {
        if self.should_fail.load(Ordering::SeqCst) {
            return Err(mock_failure());
        }
        Ok(())
    }
}

#[async_trait]
impl SubscriptionRepository for InMemorySubscriptionRepository {
    async fn create_subscription(
        &self,
        subscription: &NewSubscription,
    ) -> Result<Subscription, sqlx::Error> {
        self.check()?;
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(mock_failure());
        }
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if subscriptions
            .iter()
            .any(|s| s.stripe_subscription_id == subscription.stripe_subscription_id)
        {
            return Err(unique_violation("subscriptions_stripe_subscription_id_key"));
        }
        let now = OffsetDateTime::now_utc();
        let created = Subscription {
            id: Uuid::new_v4(),
            user_id: subscription.user_id,
            workspace_id: subscription.workspace_id,
            plan_id: subscription.plan_id,
            stripe_subscription_id: subscription.stripe_subscription_id.clone(),
            stripe_customer_id: subscription.stripe_customer_id.clone(),
            status: subscription.status,
            start_date: subscription.period.start,
            end_date: subscription.period.end,
            synced_at: subscription.synced_at,
            created_at: now,
            updated_at: now,
        };
        subscriptions.push(created.clone());
        Ok(created)
    }

    async fn find_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        self.check()?;
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == subscription_id)
            .cloned())
    }

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        self.check()?;
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.stripe_subscription_id == stripe_subscription_id)
            .cloned())
    }

    async fn find_by_workspace_id(
        &self,
        workspace_id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        self.check()?;
        Ok(self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.workspace_id == workspace_id)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn sync_subscription(
        &self,
        subscription_id: Uuid,
        sync: &SubscriptionSync,
    ) -> Result<Subscription, sqlx::Error> {
        self.check()?;
        let mut subscriptions = self.subscriptions.lock().unwrap();
        let stored = subscriptions
            .iter_mut()
            .find(|s| s.id == subscription_id)
            .ok_or(sqlx::Error::RowNotFound)?;
        if let Some(plan_id) = sync.plan_id {
            stored.plan_id = plan_id;
        }
        stored.start_date = sync.period.start;
        stored.end_date = sync.period.end;
        stored.status = sync.status;
        stored.synced_at = stored.synced_at.max(sync.synced_at);
        stored.updated_at = OffsetDateTime::now_utc();
        Ok(stored.clone())
    }
}
