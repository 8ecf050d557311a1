use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{event_object, id_at, BillingEventHandler, BillingEventKind};
use crate::db::subscription_repository::SubscriptionRepository;
use crate::models::subscription::{BillingPeriod, SubscriptionStatus, SubscriptionSync};
use crate::services::billing::BillingError;
use crate::services::stripe::{StripeEvent, StripeService};

/// Renewal: refreshes the billing period from the provider. Plan and workspace links are untouched.
pub struct InvoicePaymentSucceededHandler {
    subscriptions: Arc<dyn SubscriptionRepository>,
    stripe: Arc<dyn StripeService>,
}

impl InvoicePaymentSucceededHandler {
    pub fn new(
        subscriptions: Arc<dyn SubscriptionRepository>,
        stripe: Arc<dyn StripeService>,
    ) -> Self {
        Self {
            subscriptions,
            stripe,
        }
    }
}

#[async_trait]
impl BillingEventHandler for InvoicePaymentSucceededHandler {
    fn kind(&self) -> BillingEventKind {
        BillingEventKind::InvoicePaymentSucceeded
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), BillingError> {
        let invoice = event_object(event)?;
        // newer API versions moved the reference under `parent`
        let Some(external_id) = id_at(invoice, "/subscription")
            .or_else(|| id_at(invoice, "/parent/subscription_details/subscription"))
        else {
            debug!(event_id = %event.id, "invoice without subscription; nothing to renew");
            return Ok(());
        };

        let Some(local) = self
            .subscriptions
            .find_by_stripe_subscription_id(external_id)
            .await?
        else {
            info!(event_id = %event.id, external_id, "invoice for untracked subscription; skipping");
            return Ok(());
        };

        let remote = self.stripe.retrieve_subscription(external_id).await?;
        let period = BillingPeriod::from_unix(remote.current_period_start, remote.current_period_end)
            .unwrap_or(BillingPeriod {
                start: local.start_date,
                end: local.end_date,
            });

        let synced = self
            .subscriptions
            .sync_subscription(
                local.id,
                &SubscriptionSync {
                    plan_id: None,
                    period,
                    status: SubscriptionStatus::Active,
                    // period only; `synced_at` versions the plan and stays put
                    synced_at: local.synced_at,
                },
            )
            .await?;

        info!(
            event_id = %event.id,
            subscription_id = %synced.id,
            period_end = %synced.end_date,
            "subscription renewed"
        );
        Ok(())
    }
}
