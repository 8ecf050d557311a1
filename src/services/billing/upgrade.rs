use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use super::BillingError;
use crate::db::plan_repository::PlanRepository;
use crate::db::subscription_repository::SubscriptionRepository;
use crate::db::workspace_repository::WorkspaceRepository;
use crate::models::subscription::{BillingPeriod, Subscription, SubscriptionStatus, SubscriptionSync};
use crate::models::workspace::Workspace;
use crate::services::stripe::{ProrationBehavior, StripeService};

/// How far this host's clock may run ahead of Stripe's. The upgrade stamps `synced_at` this much
/// in the past so a provider change made right after it is not mistaken for a stale one.
const PROVIDER_CLOCK_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct UpgradeOutcome {
    pub workspace: Workspace,
    pub subscription: Subscription,
}

/// Owner-initiated plan change. Local records are written right after Stripe accepts the new
/// price; the `customer.subscription.updated` echo that follows is reconciled via `synced_at`.
#[derive(Clone)]
pub struct PlanUpgrader {
    plans: Arc<dyn PlanRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    subscriptions: Arc<dyn SubscriptionRepository>,
    stripe: Arc<dyn StripeService>,
}

impl PlanUpgrader {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        stripe: Arc<dyn StripeService>,
    ) -> Self {
        Self {
            plans,
            workspaces,
            subscriptions,
            stripe,
        }
    }

    pub async fn upgrade(
        &self,
        workspace_id: Uuid,
        user_id: Uuid,
        plan_id: Uuid,
    ) -> Result<UpgradeOutcome, BillingError> {
        let workspace = self
            .workspaces
            .find_workspace(workspace_id)
            .await?
            .ok_or(BillingError::WorkspaceNotFound)?;
        if !workspace.is_owned_by(user_id) {
            return Err(BillingError::Unauthorized);
        }

        let plan = match self.plans.find_plan(plan_id).await? {
            Some(plan) if plan.is_active => plan,
            _ => return Err(BillingError::PlanNotFound),
        };
        let price_id = plan
            .stripe_price_id
            .as_deref()
            .ok_or(BillingError::StripePriceIdMissing)?;

        let subscription_id = workspace
            .subscription_id
            .ok_or(BillingError::SubscriptionNotFound)?;
        let subscription = self
            .subscriptions
            .find_subscription(subscription_id)
            .await?
            .ok_or(BillingError::SubscriptionNotFound)?;

        if subscription.plan_id == plan.id && workspace.plan_id == Some(plan.id) {
            return Ok(UpgradeOutcome {
                workspace,
                subscription,
            });
        }

        let remote = self
            .stripe
            .update_subscription_price(
                &subscription.stripe_subscription_id,
                price_id,
                ProrationBehavior::AlwaysInvoice,
            )
            .await?;

        let period = BillingPeriod::from_unix(remote.current_period_start, remote.current_period_end)
            .unwrap_or(BillingPeriod {
                start: subscription.start_date,
                end: subscription.end_date,
            });
        let subscription = self
            .subscriptions
            .sync_subscription(
                subscription.id,
                &SubscriptionSync {
                    plan_id: Some(plan.id),
                    period,
                    status: SubscriptionStatus::Active,
                    synced_at: OffsetDateTime::now_utc().unix_timestamp()
                        - PROVIDER_CLOCK_SKEW_SECS,
                },
            )
            .await?;
        let workspace = self
            .workspaces
            .update_workspace_plan(workspace.id, plan.id)
            .await?;

        info!(
            %workspace_id,
            %user_id,
            plan_id = %plan.id,
            subscription_id = %subscription.id,
            "workspace plan upgraded"
        );
        Ok(UpgradeOutcome {
            workspace,
            subscription,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::billing::test_support::Harness;
    use crate::services::stripe::{
        CheckoutSession, CreateCheckoutSessionRequest, CreateProductRequest, ProductWithPrice,
        StripeEvent, StripeServiceError, SubscriptionInfo,
    };
    use async_trait::async_trait;
    use mockall::mock;
    use serde_json::json;

    mock! {
        StrictStripe {}

        #[async_trait]
        impl StripeService for StrictStripe {
            async fn create_product_with_price(
                &self,
                req: CreateProductRequest,
            ) -> Result<ProductWithPrice, StripeServiceError>;
            async fn create_checkout_session(
                &self,
                req: CreateCheckoutSessionRequest,
            ) -> Result<CheckoutSession, StripeServiceError>;
            fn verify_webhook(
                &self,
                payload: &[u8],
                signature_header: &str,
            ) -> Result<StripeEvent, StripeServiceError>;
            async fn retrieve_subscription(
                &self,
                subscription_id: &str,
            ) -> Result<SubscriptionInfo, StripeServiceError>;
            async fn update_subscription_price(
                &self,
                subscription_id: &str,
                price_id: &str,
                proration: ProrationBehavior,
            ) -> Result<SubscriptionInfo, StripeServiceError>;
        }
    }

    struct Subscribed {
        h: Harness,
        workspace: Workspace,
        owner: Uuid,
        pro_id: Uuid,
        team_id: Uuid,
    }

    async fn subscribed_workspace() -> Subscribed {
        let h = Harness::new();
        let team = h.plan("Team", "price_team").await;
        let pro = h.plan("Pro", "price_pro").await;
        let owner = Uuid::new_v4();
        let ws = h.durable_workspace("acme", owner, Some(team.id), None).await;
        h.subscription(&ws, team.id, "sub_1", 1_000).await;
        h.provider_subscription("sub_1", "price_team", Some(1_700_000_000), Some(1_702_592_000));
        let workspace = h.workspaces.all()[0].clone();
        Subscribed {
            h,
            workspace,
            owner,
            pro_id: pro.id,
            team_id: team.id,
        }
    }

    #[tokio::test]
    async fn non_owner_is_rejected_before_any_call() {
        let s = subscribed_workspace().await;
        // no expectations: any call on the strict mock panics
        let strict = MockStrictStripe::new();
        let upgrader = PlanUpgrader::new(
            Arc::new(s.h.plans.clone()),
            Arc::new(s.h.workspaces.clone()),
            Arc::new(s.h.subscriptions.clone()),
            Arc::new(strict),
        );
        let before_sub = s.h.subscriptions.all();

        let result = upgrader
            .upgrade(s.workspace.id, Uuid::new_v4(), s.pro_id)
            .await;
        assert!(matches!(result, Err(BillingError::Unauthorized)));

        let after_sub = s.h.subscriptions.all();
        assert_eq!(after_sub[0].plan_id, before_sub[0].plan_id);
        assert_eq!(after_sub[0].updated_at, before_sub[0].updated_at);
        assert_eq!(s.h.workspaces.all()[0].plan_id, Some(s.team_id));
    }

    #[tokio::test]
    async fn owner_upgrade_updates_stripe_and_both_plan_pointers() {
        let s = subscribed_workspace().await;

        let outcome = s
            .h
            .upgrader()
            .upgrade(s.workspace.id, s.owner, s.pro_id)
            .await
            .unwrap();

        assert_eq!(
            s.h.stripe.price_updates(),
            vec![(
                "sub_1".to_string(),
                "price_pro".to_string(),
                ProrationBehavior::AlwaysInvoice
            )]
        );
        assert_eq!(outcome.subscription.plan_id, s.pro_id);
        assert_eq!(outcome.workspace.plan_id, Some(s.pro_id));
        assert_eq!(outcome.subscription.status, SubscriptionStatus::Active);
        assert_eq!(
            outcome.subscription.end_date.unix_timestamp(),
            1_702_592_000
        );
        assert!(outcome.subscription.synced_at > 1_000);
    }

    #[tokio::test]
    async fn upgrade_without_subscription_fails() {
        let h = Harness::new();
        let pro = h.plan("Pro", "price_pro").await;
        let owner = Uuid::new_v4();
        let ws = h.durable_workspace("acme", owner, None, None).await;

        let result = h.upgrader().upgrade(ws.id, owner, pro.id).await;
        assert!(matches!(result, Err(BillingError::SubscriptionNotFound)));
        assert!(h.stripe.price_updates().is_empty());
    }

    #[tokio::test]
    async fn upgrade_to_plan_without_price_fails() {
        let s = subscribed_workspace().await;
        let legacy = s.h.plan_without_price("Legacy").await;

        let result = s
            .h
            .upgrader()
            .upgrade(s.workspace.id, s.owner, legacy.id)
            .await;
        assert!(matches!(result, Err(BillingError::StripePriceIdMissing)));
        assert!(s.h.stripe.price_updates().is_empty());
    }

    #[tokio::test]
    async fn stale_provider_echo_after_upgrade_keeps_pointers_consistent() {
        let s = subscribed_workspace().await;
        s.h.upgrader()
            .upgrade(s.workspace.id, s.owner, s.pro_id)
            .await
            .unwrap();

        // an update from before the upgrade arrives late and carries the old price
        let late = Harness::event(
            "evt_late",
            "customer.subscription.updated",
            1_500,
            json!({ "id": "sub_1", "items": { "data": [ { "price": { "id": "price_team" } } ] } }),
        );
        s.h.dispatcher().dispatch(&late).await.unwrap();

        let sub = &s.h.subscriptions.all()[0];
        let ws = &s.h.workspaces.all()[0];
        assert_eq!(sub.plan_id, s.pro_id);
        assert_eq!(ws.plan_id, Some(sub.plan_id));
    }

    #[tokio::test]
    async fn provider_change_within_clock_skew_after_upgrade_is_applied() {
        let s = subscribed_workspace().await;
        s.h.upgrader()
            .upgrade(s.workspace.id, s.owner, s.pro_id)
            .await
            .unwrap();

        // Stripe's clock trails ours: a portal change made just after the upgrade looks older
        let portal_change = Harness::event(
            "evt_portal",
            "customer.subscription.updated",
            OffsetDateTime::now_utc().unix_timestamp() - 10,
            json!({ "id": "sub_1", "items": { "data": [ { "price": { "id": "price_team" } } ] } }),
        );
        s.h.dispatcher().dispatch(&portal_change).await.unwrap();

        let sub = &s.h.subscriptions.all()[0];
        assert_eq!(sub.plan_id, s.team_id);
        assert_eq!(s.h.workspaces.all()[0].plan_id, Some(s.team_id));
    }

    #[tokio::test]
    async fn newer_provider_update_after_upgrade_wins_on_both_records() {
        let s = subscribed_workspace().await;
        s.h.upgrader()
            .upgrade(s.workspace.id, s.owner, s.pro_id)
            .await
            .unwrap();

        let later = Harness::event(
            "evt_later",
            "customer.subscription.updated",
            OffsetDateTime::now_utc().unix_timestamp() + 60,
            json!({ "id": "sub_1", "items": { "data": [ { "price": { "id": "price_team" } } ] } }),
        );
        s.h.dispatcher().dispatch(&later).await.unwrap();

        let sub = &s.h.subscriptions.all()[0];
        let ws = &s.h.workspaces.all()[0];
        assert_eq!(sub.plan_id, s.team_id);
        assert_eq!(ws.plan_id, Some(sub.plan_id));
    }
}
