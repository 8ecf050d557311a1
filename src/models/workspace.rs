use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub member_ids: Vec<Uuid>,
    pub plan_id: Option<Uuid>,
    pub subscription_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Workspace {
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.owner_id == user_id
    }
}

#[derive(Debug, Clone)]
pub struct NewWorkspace {
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub member_ids: Vec<Uuid>,
    pub plan_id: Option<Uuid>,
}

/// Pre-payment copy of a workspace. Keyed by name, never visible to durable queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StagedWorkspace {
    pub name: String,
    pub description: Option<String>,
    /// User who started the setup. Ownership is only granted on promotion.
    pub requested_by: Uuid,
    pub plan_id: Option<Uuid>,
}

impl StagedWorkspace {
    /// Durable shape of this stage once `owner_id` has paid.
    pub fn promote(&self, owner_id: Uuid, plan_id: Uuid) -> NewWorkspace {
        NewWorkspace {
            name: self.name.clone(),
            description: self.description.clone(),
            owner_id,
            member_ids: vec![owner_id],
            plan_id: Some(plan_id),
        }
    }
}
