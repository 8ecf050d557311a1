use async_trait::async_trait;

/// Ids of provider events whose effects have been committed.
#[async_trait]
pub trait StripeEventLogRepository: Send + Sync {
    async fn has_processed_event(&self, event_id: &str) -> Result<bool, sqlx::Error>;

    /// Recording an id twice is not an error.
    async fn record_event(&self, event_id: &str, event_type: &str) -> Result<(), sqlx::Error>;
}
