use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "subscription_status")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum SubscriptionStatus {
    Active,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Subscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub plan_id: Uuid,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
    /// Unix seconds of the newest state applied, from either a provider event or an upgrade.
    pub synced_at: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Subscription {
    /// True when a provider event created at `event_created` predates state already applied.
    pub fn is_newer_than(&self, event_created: i64) -> bool {
        self.synced_at > event_created
    }
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub user_id: Uuid,
    pub workspace_id: Uuid,
    pub plan_id: Uuid,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    pub period: BillingPeriod,
    pub synced_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPeriod {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
}

pub const FALLBACK_PERIOD_DAYS: i64 = 30;

impl BillingPeriod {
    /// Builds a period from provider unix timestamps; `None` if either bound is missing or invalid.
    pub fn from_unix(start: Option<i64>, end: Option<i64>) -> Option<Self> {
        let start = OffsetDateTime::from_unix_timestamp(start?).ok()?;
        let end = OffsetDateTime::from_unix_timestamp(end?).ok()?;
        Some(Self { start, end })
    }

    /// `now` to `now + 30 days`, used when the provider reports no period bounds.
    pub fn fallback_from(now: OffsetDateTime) -> Self {
        Self {
            start: now,
            end: now + Duration::days(FALLBACK_PERIOD_DAYS),
        }
    }
}

/// Fields a renewal or plan change overwrites on an existing subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionSync {
    pub plan_id: Option<Uuid>,
    pub period: BillingPeriod,
    pub status: SubscriptionStatus,
    pub synced_at: i64,
}
