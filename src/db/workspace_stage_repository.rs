use async_trait::async_trait;

use crate::models::workspace::StagedWorkspace;

/// Short-lived holding area for workspaces that are waiting on payment.
///
/// Entries are addressed only by workspace name and expire after a fixed TTL. Reads never
/// delete; removal is either explicit (`delete_stage`, after promotion) or passive (expiry).
#[async_trait]
pub trait WorkspaceStageRepository: Send + Sync {
    /// Writes or overwrites the entry for `stage.name` and restarts its TTL.
    async fn save_stage(&self, stage: &StagedWorkspace) -> Result<StagedWorkspace, sqlx::Error>;

    async fn find_stage_by_name(&self, name: &str)
        -> Result<Option<StagedWorkspace>, sqlx::Error>;

    /// Returns whether an unexpired entry was removed.
    async fn delete_stage(&self, name: &str) -> Result<bool, sqlx::Error>;

    /// Drops every expired entry and reports how many were removed.
    async fn purge_expired(&self) -> Result<u64, sqlx::Error>;
}
