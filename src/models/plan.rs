use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(type_name = "billing_interval")]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "UPPERCASE")]
pub enum BillingInterval {
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Monthly => "monthly",
            BillingInterval::Yearly => "yearly",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    /// Price in the smallest currency unit (cents).
    pub price_cents: i64,
    pub interval: BillingInterval,
    pub max_members: i32,
    pub max_projects: i32,
    pub features: Vec<String>,
    pub is_active: bool,
    pub stripe_product_id: Option<String>,
    pub stripe_price_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Admin input for a new catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewPlan {
    pub name: String,
    pub price_cents: i64,
    pub interval: BillingInterval,
    pub max_members: i32,
    pub max_projects: i32,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Editable plan fields. External references are deliberately absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanPatch {
    pub name: Option<String>,
    pub price_cents: Option<i64>,
    pub max_members: Option<i32>,
    pub max_projects: Option<i32>,
    pub features: Option<Vec<String>>,
    pub is_active: Option<bool>,
}

impl PlanPatch {
    pub fn apply_to(&self, plan: &mut Plan) {
        if let Some(name) = &self.name {
            plan.name = name.clone();
        }
        if let Some(price) = self.price_cents {
            plan.price_cents = price;
        }
        if let Some(max_members) = self.max_members {
            plan.max_members = max_members;
        }
        if let Some(max_projects) = self.max_projects {
            plan.max_projects = max_projects;
        }
        if let Some(features) = &self.features {
            plan.features = features.clone();
        }
        if let Some(active) = self.is_active {
            plan.is_active = active;
        }
    }
}

/// Product/price pair registered with the billing provider for a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalPlanRefs {
    pub product_id: String,
    pub price_id: String,
}
