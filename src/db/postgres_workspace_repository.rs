use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::workspace_repository::WorkspaceRepository;
use crate::models::workspace::{NewWorkspace, Workspace};

pub struct PostgresWorkspaceRepository {
    pub pool: PgPool,
}

#[async_trait]
impl WorkspaceRepository for PostgresWorkspaceRepository {
    async fn create_workspace(&self, workspace: &NewWorkspace) -> Result<Workspace, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(
            r#"
            INSERT INTO workspaces (name, description, owner_id, member_ids, plan_id, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, now(), now())
            RETURNING id, name, description, owner_id, member_ids, plan_id, subscription_id,
                      created_at, updated_at
            "#,
        )
        .bind(&workspace.name)
        .bind(&workspace.description)
        .bind(workspace.owner_id)
        .bind(&workspace.member_ids)
        .bind(workspace.plan_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_workspace(&self, workspace_id: Uuid) -> Result<Option<Workspace>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(
            r#"
            SELECT id, name, description, owner_id, member_ids, plan_id, subscription_id,
                   created_at, updated_at
            FROM workspaces
            WHERE id = $1
            "#,
        )
        .bind(workspace_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn find_workspace_by_name(&self, name: &str) -> Result<Option<Workspace>, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(
            r#"
            SELECT id, name, description, owner_id, member_ids, plan_id, subscription_id,
                   created_at, updated_at
            FROM workspaces
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn update_workspace_plan(
        &self,
        workspace_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Workspace, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(
            r#"
            UPDATE workspaces
            SET plan_id = $2, updated_at = now()
            WHERE id = $1
            RETURNING id, name, description, owner_id, member_ids, plan_id, subscription_id,
                      created_at, updated_at
            "#,
        )
        .bind(workspace_id)
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
    }

    async fn set_workspace_subscription(
        &self,
        workspace_id: Uuid,
        subscription_id: Uuid,
        plan_id: Uuid,
    ) -> Result<Workspace, sqlx::Error> {
        sqlx::query_as::<_, Workspace>(
            r#"
            UPDATE workspaces
            SET subscription_id = $2, plan_id = $3, updated_at = now()
            WHERE id = $1
            RETURNING id, name, description, owner_id, member_ids, plan_id, subscription_id,
                      created_at, updated_at
            "#,
        )
        .bind(workspace_id)
        .bind(subscription_id)
        .bind(plan_id)
        .fetch_one(&self.pool)
        .await
    }
}
