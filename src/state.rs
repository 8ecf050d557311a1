use std::sync::Arc;

use crate::config::Config;
use crate::db::{
    plan_repository::PlanRepository, stripe_event_log_repository::StripeEventLogRepository,
    subscription_repository::SubscriptionRepository, workspace_repository::WorkspaceRepository,
    workspace_stage_repository::WorkspaceStageRepository,
};
use crate::services::billing::{PlanCatalog, PlanUpgrader, WebhookDispatcher, WorkspaceProvisioner};
use crate::services::stripe::StripeService;
use crate::utils::jwt::{JwtKeyProvider, JwtKeys};

/// Storage the billing services are wired against.
#[derive(Clone)]
pub struct Repositories {
    pub plans: Arc<dyn PlanRepository>,
    pub workspaces: Arc<dyn WorkspaceRepository>,
    pub subscriptions: Arc<dyn SubscriptionRepository>,
    pub stages: Arc<dyn WorkspaceStageRepository>,
    pub stripe_events: Arc<dyn StripeEventLogRepository>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub jwt_keys: Arc<JwtKeys>,
    pub stages: Arc<dyn WorkspaceStageRepository>,
    pub plan_catalog: PlanCatalog,
    pub provisioner: WorkspaceProvisioner,
    pub upgrader: PlanUpgrader,
    pub webhooks: Arc<WebhookDispatcher>,
}

impl AppState {
    pub fn new(
        config: Config,
        repos: Repositories,
        stripe: Arc<dyn StripeService>,
    ) -> anyhow::Result<Self> {
        let jwt_keys = JwtKeys::from_secret(&config.jwt_secret)?;
        let webhooks = WebhookDispatcher::with_default_handlers(
            stripe.clone(),
            repos.stripe_events.clone(),
            repos.plans.clone(),
            repos.workspaces.clone(),
            repos.subscriptions.clone(),
            repos.stages.clone(),
        )?;

        Ok(Self {
            config: Arc::new(config),
            jwt_keys: Arc::new(jwt_keys),
            stages: repos.stages.clone(),
            plan_catalog: PlanCatalog::new(repos.plans.clone(), stripe.clone()),
            provisioner: WorkspaceProvisioner::new(
                repos.plans.clone(),
                repos.workspaces.clone(),
                repos.stages.clone(),
                stripe.clone(),
            ),
            upgrader: PlanUpgrader::new(repos.plans, repos.workspaces, repos.subscriptions, stripe),
            webhooks: Arc::new(webhooks),
        })
    }
}

impl JwtKeyProvider for AppState {
    fn jwt_keys(&self) -> &JwtKeys {
        &self.jwt_keys
    }

    fn jwt_issuer(&self) -> &str {
        &self.config.jwt_issuer
    }

    fn jwt_audience(&self) -> &str {
        &self.config.jwt_audience
    }
}
