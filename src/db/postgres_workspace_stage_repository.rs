use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;

use super::workspace_stage_repository::WorkspaceStageRepository;
use crate::models::workspace::StagedWorkspace;

/// Table-backed stage store. Rows outlive their TTL until `purge_expired` runs, but reads
/// filter on `expires_at` so a stale row is never returned.
pub struct PostgresWorkspaceStageRepository {
    pub pool: PgPool,
    pub ttl: Duration,
}

impl PostgresWorkspaceStageRepository {
    pub fn new(pool: PgPool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    fn ttl_seconds(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }
}

#[async_trait]
impl WorkspaceStageRepository for PostgresWorkspaceStageRepository {
    async fn save_stage(&self, stage: &StagedWorkspace) -> Result<StagedWorkspace, sqlx::Error> {
        sqlx::query_as::<_, StagedWorkspace>(
            r#"
            INSERT INTO workspace_stages (name, description, requested_by, plan_id, expires_at)
            VALUES ($1, $2, $3, $4, now() + make_interval(secs => $5))
            ON CONFLICT (name) DO UPDATE
            SET description = EXCLUDED.description,
                requested_by = EXCLUDED.requested_by,
                plan_id = EXCLUDED.plan_id,
                expires_at = EXCLUDED.expires_at
            RETURNING name, description, requested_by, plan_id
            "#,
        )
        .bind(&stage.name)
        .bind(&stage.description)
        .bind(stage.requested_by)
        .bind(stage.plan_id)
        .bind(self.ttl_seconds() as f64)
        .fetch_one(&self.pool)
        .await
    }

    async fn find_stage_by_name(
        &self,
        name: &str,
    ) -> Result<Option<StagedWorkspace>, sqlx::Error> {
        sqlx::query_as::<_, StagedWorkspace>(
            r#"
            SELECT name, description, requested_by, plan_id
            FROM workspace_stages
            WHERE name = $1 AND expires_at > now()
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_stage(&self, name: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            DELETE FROM workspace_stages
            WHERE name = $1 AND expires_at > now()
            "#,
        )
        .bind(name)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workspace_stages WHERE expires_at <= now()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
