use async_trait::async_trait;
use dashmap::DashMap;
use std::time::{Duration, Instant};

use super::workspace_stage_repository::WorkspaceStageRepository;
use crate::models::workspace::StagedWorkspace;

#[derive(Clone, Debug)]
struct StageEntry {
    stage: StagedWorkspace,
    expires_at: Instant,
}

/// Process-local TTL store. Expired entries are evicted lazily on read and by `purge_expired`.
pub struct InMemoryWorkspaceStageRepository {
    entries: DashMap<String, StageEntry>,
    ttl: Duration,
}

impl InMemoryWorkspaceStageRepository {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

#[async_trait]
impl WorkspaceStageRepository for InMemoryWorkspaceStageRepository {
    async fn save_stage(&self, stage: &StagedWorkspace) -> Result<StagedWorkspace, sqlx::Error> {
        let entry = StageEntry {
            stage: stage.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.entries.insert(stage.name.clone(), entry);
        Ok(stage.clone())
    }

    async fn find_stage_by_name(
        &self,
        name: &str,
    ) -> Result<Option<StagedWorkspace>, sqlx::Error> {
        if let Some(entry) = self.entries.get(name) {
            if entry.expires_at > Instant::now() {
                return Ok(Some(entry.stage.clone()));
            }
            drop(entry);
            self.entries
                .remove_if(name, |_, e| e.expires_at <= Instant::now());
        }
        Ok(None)
    }

    async fn delete_stage(&self, name: &str) -> Result<bool, sqlx::Error> {
        Ok(self
            .entries
            .remove(name)
            .map(|(_, entry)| entry.expires_at > Instant::now())
            .unwrap_or(false))
    }

    async fn purge_expired(&self) -> Result<u64, sqlx::Error> {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.expires_at > now);
        Ok(before.saturating_sub(self.entries.len()) as u64)
    }
}
