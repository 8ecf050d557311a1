use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::{event_object, id_at, BillingEventHandler, BillingEventKind};
use crate::db::plan_repository::PlanRepository;
use crate::db::subscription_repository::SubscriptionRepository;
use crate::db::workspace_repository::WorkspaceRepository;
use crate::db::workspace_stage_repository::WorkspaceStageRepository;
use crate::models::subscription::{BillingPeriod, NewSubscription, SubscriptionStatus};
use crate::models::workspace::Workspace;
use crate::services::billing::{metadata, BillingError};
use crate::services::stripe::{StripeEvent, StripeService};

struct CheckoutMetadata {
    workspace_name: String,
    user_id: Uuid,
    plan_id: Uuid,
}

impl CheckoutMetadata {
    fn from_session(session: &Value) -> Result<Self, BillingError> {
        let meta = session
            .get("metadata")
            .ok_or(BillingError::MissingMetadata(metadata::WORKSPACE_NAME))?;
        let field = move |key: &'static str| {
            meta.get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(BillingError::MissingMetadata(key))
        };
        let uuid_field = move |key: &'static str| {
            field(key)?
                .parse::<Uuid>()
                .map_err(|_| BillingError::MissingMetadata(key))
        };

        Ok(Self {
            workspace_name: field(metadata::WORKSPACE_NAME)?.to_string(),
            user_id: uuid_field(metadata::USER_ID)?,
            plan_id: uuid_field(metadata::PLAN_ID)?,
        })
    }
}

/// Activation: promotes the staged workspace and creates its subscription.
///
/// The sequence is resumable. A redelivery after a partial failure picks up an already-promoted
/// workspace or an already-created subscription instead of creating a second one.
pub struct CheckoutCompletedHandler {
    plans: Arc<dyn PlanRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    stages: Arc<dyn WorkspaceStageRepository>,
    stripe: Arc<dyn StripeService>,
}

impl CheckoutCompletedHandler {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        stages: Arc<dyn WorkspaceStageRepository>,
        stripe: Arc<dyn StripeService>,
    ) -> Self {
        Self {
            plans,
            workspaces,
            subscriptions,
            stages,
            stripe,
        }
    }

    /// Reuses a workspace left behind by an earlier, interrupted delivery, else promotes the stage.
    async fn promote(&self, meta: &CheckoutMetadata) -> Result<Workspace, BillingError> {
        if let Some(existing) = self
            .workspaces
            .find_workspace_by_name(&meta.workspace_name)
            .await?
        {
            if !existing.is_owned_by(meta.user_id) {
                return Err(BillingError::WorkspaceNameTaken);
            }
            if existing.subscription_id.is_some() {
                return Err(BillingError::WorkspaceAlreadySubscribed);
            }
            info!(workspace_id = %existing.id, "reusing unpaid workspace for checkout");
            return Ok(existing);
        }

        let stage = self
            .stages
            .find_stage_by_name(&meta.workspace_name)
            .await?
            .ok_or(BillingError::WorkspaceNotFound)?;
        let workspace = self
            .workspaces
            .create_workspace(&stage.promote(meta.user_id, meta.plan_id))
            .await?;
        info!(
            workspace_id = %workspace.id,
            workspace_name = %workspace.name,
            owner_id = %workspace.owner_id,
            "staged workspace promoted"
        );
        Ok(workspace)
    }
}

#[async_trait]
impl BillingEventHandler for CheckoutCompletedHandler {
    fn kind(&self) -> BillingEventKind {
        BillingEventKind::CheckoutSessionCompleted
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), BillingError> {
        let session = event_object(event)?;
        let meta = CheckoutMetadata::from_session(session)?;
        let external_id = id_at(session, "/subscription")
            .ok_or(BillingError::MissingEventField("subscription"))?
            .to_string();

        if let Some(existing) = self
            .subscriptions
            .find_by_stripe_subscription_id(&external_id)
            .await?
        {
            self.workspaces
                .set_workspace_subscription(existing.workspace_id, existing.id, existing.plan_id)
                .await?;
            self.stages.delete_stage(&meta.workspace_name).await?;
            info!(
                event_id = %event.id,
                subscription_id = %existing.id,
                "checkout already applied; relinked workspace"
            );
            return Ok(());
        }

        self.plans
            .find_plan(meta.plan_id)
            .await?
            .ok_or(BillingError::PlanNotFound)?;

        // read before any write so a provider outage leaves nothing half-done
        let remote = self.stripe.retrieve_subscription(&external_id).await?;
        let period = BillingPeriod::from_unix(remote.current_period_start, remote.current_period_end)
            .unwrap_or_else(|| BillingPeriod::fallback_from(OffsetDateTime::now_utc()));
        let customer_id = id_at(session, "/customer")
            .map(str::to_string)
            .or(remote.customer_id);

        let workspace = self.promote(&meta).await?;

        let subscription = self
            .subscriptions
            .create_subscription(&NewSubscription {
                user_id: meta.user_id,
                workspace_id: workspace.id,
                plan_id: meta.plan_id,
                stripe_subscription_id: external_id,
                stripe_customer_id: customer_id,
                status: SubscriptionStatus::Active,
                period,
                synced_at: event.created,
            })
            .await?;

        self.workspaces
            .set_workspace_subscription(workspace.id, subscription.id, meta.plan_id)
            .await?;
        self.stages.delete_stage(&meta.workspace_name).await?;

        info!(
            event_id = %event.id,
            workspace_id = %workspace.id,
            subscription_id = %subscription.id,
            plan_id = %meta.plan_id,
            "workspace activated"
        );
        Ok(())
    }
}
