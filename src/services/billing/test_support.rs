use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use super::provisioning::CheckoutRequest;
use super::{PlanUpgrader, WebhookDispatcher, WorkspaceProvisioner};
use crate::db::memory_workspace_stage_repository::InMemoryWorkspaceStageRepository;
use crate::db::mock_db::{
    InMemoryPlanRepository, InMemorySubscriptionRepository, InMemoryWorkspaceRepository,
};
use crate::db::mock_stripe_event_log_repository::MockStripeEventLogRepository;
use crate::db::plan_repository::PlanRepository;
use crate::db::workspace_stage_repository::WorkspaceStageRepository;
use crate::models::plan::{BillingInterval, ExternalPlanRefs, NewPlan, Plan};
use crate::models::subscription::{Subscription, SubscriptionStatus};
use crate::models::workspace::{StagedWorkspace, Workspace};
use crate::services::stripe::{MockStripeService, StripeEvent, SubscriptionInfo};

/// In-memory wiring of every billing service, with direct access to the backing stores.
pub struct Harness {
    pub plans: InMemoryPlanRepository,
    pub workspaces: InMemoryWorkspaceRepository,
    pub subscriptions: InMemorySubscriptionRepository,
    pub stages: Arc<InMemoryWorkspaceStageRepository>,
    pub events: MockStripeEventLogRepository,
    pub stripe: MockStripeService,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            plans: InMemoryPlanRepository::default(),
            workspaces: InMemoryWorkspaceRepository::default(),
            subscriptions: InMemorySubscriptionRepository::default(),
            stages: Arc::new(InMemoryWorkspaceStageRepository::new(Duration::from_secs(1800))),
            events: MockStripeEventLogRepository::default(),
            stripe: MockStripeService::new(),
        }
    }

    pub fn provisioner(&self) -> WorkspaceProvisioner {
        WorkspaceProvisioner::new(
            Arc::new(self.plans.clone()),
            Arc::new(self.workspaces.clone()),
            self.stages.clone(),
            Arc::new(self.stripe.clone()),
        )
    }

    pub fn upgrader(&self) -> PlanUpgrader {
        PlanUpgrader::new(
            Arc::new(self.plans.clone()),
            Arc::new(self.workspaces.clone()),
            Arc::new(self.subscriptions.clone()),
            Arc::new(self.stripe.clone()),
        )
    }

    pub fn dispatcher(&self) -> WebhookDispatcher {
        WebhookDispatcher::with_default_handlers(
            Arc::new(self.stripe.clone()),
            Arc::new(self.events.clone()),
            Arc::new(self.plans.clone()),
            Arc::new(self.workspaces.clone()),
            Arc::new(self.subscriptions.clone()),
            self.stages.clone(),
        )
        .unwrap()
    }

    fn new_plan(name: &str, is_active: bool) -> NewPlan {
        NewPlan {
            name: name.into(),
            price_cents: 1200,
            interval: BillingInterval::Monthly,
            max_members: 10,
            max_projects: 10,
            features: vec![],
            is_active,
        }
    }

    async fn insert_plan(&self, name: &str, price_id: &str, is_active: bool) -> Plan {
        self.plans
            .create_plan(
                &Self::new_plan(name, is_active),
                &ExternalPlanRefs {
                    product_id: format!("prod_{name}"),
                    price_id: price_id.into(),
                },
            )
            .await
            .unwrap()
    }

    pub async fn plan(&self, name: &str, price_id: &str) -> Plan {
        self.insert_plan(name, price_id, true).await
    }

    pub async fn inactive_plan(&self, name: &str, price_id: &str) -> Plan {
        self.insert_plan(name, price_id, false).await
    }

    /// A plan created before the Stripe integration existed.
    pub async fn plan_without_price(&self, name: &str) -> Plan {
        let mut plan = self.insert_plan(name, &format!("price_{name}"), true).await;
        plan.stripe_product_id = None;
        plan.stripe_price_id = None;
        let mut plans = self.plans.plans.lock().unwrap();
        if let Some(stored) = plans.iter_mut().find(|p| p.id == plan.id) {
            *stored = plan.clone();
        }
        plan
    }

    pub async fn stage(&self, name: &str, user: Uuid, plan_id: Option<Uuid>) -> StagedWorkspace {
        self.stages
            .save_stage(&StagedWorkspace {
                name: name.into(),
                description: None,
                requested_by: user,
                plan_id,
            })
            .await
            .unwrap()
    }

    pub async fn durable_workspace(
        &self,
        name: &str,
        owner: Uuid,
        plan_id: Option<Uuid>,
        subscription_id: Option<Uuid>,
    ) -> Workspace {
        let now = OffsetDateTime::now_utc();
        let workspace = Workspace {
            id: Uuid::new_v4(),
            name: name.into(),
            description: None,
            owner_id: owner,
            member_ids: vec![owner],
            plan_id,
            subscription_id,
            created_at: now,
            updated_at: now,
        };
        self.workspaces
            .workspaces
            .lock()
            .unwrap()
            .push(workspace.clone());
        workspace
    }

    /// Seeds an active subscription for `workspace` and links it back.
    pub async fn subscription(
        &self,
        workspace: &Workspace,
        plan_id: Uuid,
        external_id: &str,
        synced_at: i64,
    ) -> Subscription {
        let now = OffsetDateTime::now_utc();
        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: workspace.owner_id,
            workspace_id: workspace.id,
            plan_id,
            stripe_subscription_id: external_id.into(),
            stripe_customer_id: Some("cus_1".into()),
            status: SubscriptionStatus::Active,
            start_date: now,
            end_date: now + time::Duration::days(30),
            synced_at,
            created_at: now,
            updated_at: now,
        };
        self.subscriptions.insert(subscription.clone());
        let mut workspaces = self.workspaces.workspaces.lock().unwrap();
        if let Some(stored) = workspaces.iter_mut().find(|w| w.id == workspace.id) {
            stored.subscription_id = Some(subscription.id);
        }
        subscription
    }

    /// What Stripe reports for `id` when a handler or the upgrader asks.
    pub fn provider_subscription(
        &self,
        id: &str,
        price_id: &str,
        period_start: Option<i64>,
        period_end: Option<i64>,
    ) {
        self.stripe.insert_subscription(SubscriptionInfo {
            id: id.into(),
            customer_id: Some("cus_1".into()),
            status: "active".into(),
            current_period_start: period_start,
            current_period_end: period_end,
            price_id: Some(price_id.into()),
        });
    }

    pub fn checkout_request(&self, name: &str, user: Uuid, plan_id: Option<Uuid>) -> CheckoutRequest {
        CheckoutRequest {
            workspace_name: name.into(),
            user_id: user,
            user_email: "owner@example.com".into(),
            plan_id,
            success_url: "https://app.example.test/billing/success".into(),
            cancel_url: "https://app.example.test/billing/cancel".into(),
        }
    }

    pub fn event(id: &str, event_type: &str, created: i64, object: Value) -> StripeEvent {
        StripeEvent {
            id: id.into(),
            r#type: event_type.into(),
            created,
            payload: json!({
                "id": id,
                "type": event_type,
                "created": created,
                "data": { "object": object }
            }),
        }
    }
}
