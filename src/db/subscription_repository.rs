use async_trait::async_trait;
use uuid::Uuid;

use crate::models::subscription::{NewSubscription, Subscription, SubscriptionSync};

#[async_trait]
pub trait SubscriptionRepository: Send + Sync {
    async fn create_subscription(
        &self,
        subscription: &NewSubscription,
    ) -> Result<Subscription, sqlx::Error>;

    async fn find_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error>;

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, sqlx::Error>;

    async fn find_by_workspace_id(
        &self,
        workspace_id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error>;

    /// Overwrites period, status and `synced_at`; the plan only when `sync.plan_id` is set.
    async fn sync_subscription(
        &self,
        subscription_id: Uuid,
        sync: &SubscriptionSync,
    ) -> Result<Subscription, sqlx::Error>;
}
