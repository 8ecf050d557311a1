use async_trait::async_trait;
use uuid::Uuid;

use crate::models::workspace::{NewWorkspace, Workspace};

#[async_trait]
pub trait WorkspaceRepository: Send + Sync {
    async fn create_workspace(&self, workspace: &NewWorkspace) -> Result<Workspace, sqlx::Error>;

    async fn find_workspace(&self, workspace_id: Uuid) -> Result<Option<Workspace>, sqlx::Error>;

    async fn find_workspace_by_name(&self, name: &str) -> Result<Option<Workspace>, sqlx::Error>;

    async fn update_workspace_plan(
        &self,
        workspace_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Workspace, sqlx::Error>;

    /// Links the paid subscription and the plan it was bought for in one write.
    async fn set_workspace_subscription(
        &self,
        workspace_id: Uuid,
        subscription_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Workspace, sqlx::Error>;
}
