use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use super::{event_object, i64_at, str_at, BillingEventHandler, BillingEventKind};
use crate::db::plan_repository::PlanRepository;
use crate::db::subscription_repository::SubscriptionRepository;
use crate::db::workspace_repository::WorkspaceRepository;
use crate::models::subscription::{BillingPeriod, SubscriptionSync};
use crate::services::billing::BillingError;
use crate::services::stripe::StripeEvent;

/// Period bounds moved from the subscription onto its items in newer API versions.
fn period_of(subscription: &Value) -> Option<BillingPeriod> {
    BillingPeriod::from_unix(
        i64_at(subscription, "/current_period_start"),
        i64_at(subscription, "/current_period_end"),
    )
    .or_else(|| {
        BillingPeriod::from_unix(
            i64_at(subscription, "/items/data/0/current_period_start"),
            i64_at(subscription, "/items/data/0/current_period_end"),
        )
    })
}

/// Plan change made on the provider side (customer portal, dashboard, or our own upgrade echo).
pub struct SubscriptionUpdatedHandler {
    plans: Arc<dyn PlanRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
}

impl SubscriptionUpdatedHandler {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
    ) -> Self {
        Self {
            plans,
            workspaces,
            subscriptions,
        }
    }
}

#[async_trait]
impl BillingEventHandler for SubscriptionUpdatedHandler {
    fn kind(&self) -> BillingEventKind {
        BillingEventKind::SubscriptionUpdated
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), BillingError> {
        let object = event_object(event)?;
        let external_id = str_at(object, "/id").ok_or(BillingError::MissingEventField("id"))?;

        let Some(local) = self
            .subscriptions
            .find_by_stripe_subscription_id(external_id)
            .await?
        else {
            info!(event_id = %event.id, external_id, "update for untracked subscription; skipping");
            return Ok(());
        };

        if local.is_newer_than(event.created) {
            warn!(
                event_id = %event.id,
                subscription_id = %local.id,
                event_created = event.created,
                synced_at = local.synced_at,
                "stale subscription update dropped"
            );
            return Ok(());
        }

        let Some(price_id) = str_at(object, "/items/data/0/price/id") else {
            warn!(event_id = %event.id, subscription_id = %local.id, "subscription update without price; dropped");
            return Ok(());
        };
        let Some(plan) = self.plans.find_plan_by_stripe_price_id(price_id).await? else {
            warn!(event_id = %event.id, price_id, "subscription moved to unknown price; dropped");
            return Ok(());
        };

        let period = period_of(object).unwrap_or(BillingPeriod {
            start: local.start_date,
            end: local.end_date,
        });

        let synced = self
            .subscriptions
            .sync_subscription(
                local.id,
                &SubscriptionSync {
                    plan_id: Some(plan.id),
                    period,
                    status: local.status,
                    synced_at: event.created,
                },
            )
            .await?;

        if self.workspaces.find_workspace(synced.workspace_id).await?.is_some() {
            self.workspaces
                .update_workspace_plan(synced.workspace_id, plan.id)
                .await?;
        } else {
            warn!(subscription_id = %synced.id, workspace_id = %synced.workspace_id, "subscription references missing workspace");
        }

        info!(
            event_id = %event.id,
            subscription_id = %synced.id,
            workspace_id = %synced.workspace_id,
            plan_id = %plan.id,
            "subscription plan synced from provider"
        );
        Ok(())
    }
}
