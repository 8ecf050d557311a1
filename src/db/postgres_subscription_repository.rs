use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::subscription_repository::SubscriptionRepository;
use crate::models::subscription::{NewSubscription, Subscription, SubscriptionSync};

pub struct PostgresSubscriptionRepository {
    pub pool: PgPool,
}

#[async_trait]
impl SubscriptionRepository for PostgresSubscriptionRepository {
    async fn create_subscription(
        &self,
        subscription: &NewSubscription,
    ) -> Result<Subscription, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            INSERT INTO subscriptions (user_id, workspace_id, plan_id, stripe_subscription_id,
                                       stripe_customer_id, status, start_date, end_date, synced_at,
                                       created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, now(), now())
            RETURNING id, user_id, workspace_id, plan_id, stripe_subscription_id, stripe_customer_id,
                      status, start_date, end_date, synced_at, created_at, updated_at
            "#,
        )
        .bind(subscription.user_id)
        .bind(subscription.workspace_id)
        .bind(subscription.plan_id)
        .bind(&subscription.stripe_subscription_id)
        .bind(&subscription.stripe_customer_id)
        .bind(subscription.status)
        .bind(subscription.period.start)
        .bind(subscription.period.end)
        .bind(subscription.synced_at)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_subscription(
        &self,
        subscription_id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, workspace_id, plan_id, stripe_subscription_id, stripe_customer_id,
                   status, start_date, end_date, synced_at, created_at, updated_at
            FROM subscriptions
            WHERE id = $1
            "#,
        )
        .bind(subscription_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_stripe_subscription_id(
        &self,
        stripe_subscription_id: &str,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, workspace_id, plan_id, stripe_subscription_id, stripe_customer_id,
                   status, start_date, end_date, synced_at, created_at, updated_at
            FROM subscriptions
            WHERE stripe_subscription_id = $1
            "#,
        )
        .bind(stripe_subscription_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_by_workspace_id(
        &self,
        workspace_id: Uuid,
    ) -> Result<Option<Subscription>, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            SELECT id, user_id, workspace_id, plan_id, stripe_subscription_id, stripe_customer_id,
                   status, start_date, end_date, synced_at, created_at, updated_at
            FROM subscriptions
            WHERE workspace_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn sync_subscription(
        &self,
        subscription_id: Uuid,
        sync: &SubscriptionSync,
    ) -> Result<Subscription, sqlx::Error> {
        sqlx::query_as::<_, Subscription>(
            r#"
            UPDATE subscriptions
            SET plan_id = COALESCE($2, plan_id),
                start_date = $3,
                end_date = $4,
                status = $5,
                synced_at = GREATEST(synced_at, $6),
                updated_at = now()
            WHERE id = $1
            RETURNING id, user_id, workspace_id, plan_id, stripe_subscription_id, stripe_customer_id,
                      status, start_date, end_date, synced_at, created_at, updated_at
            "#,
        )
        .bind(subscription_id)
        .bind(sync.plan_id)
        .bind(sync.period.start)
        .bind(sync.period.end)
        .bind(sync.status)
        .bind(sync.synced_at)
        .fetch_one(&self.pool)
        .await
    }
}
