use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::{metadata, BillingError};
use crate::db::plan_repository::PlanRepository;
use crate::db::workspace_repository::WorkspaceRepository;
use crate::db::workspace_stage_repository::WorkspaceStageRepository;
use crate::models::plan::Plan;
use crate::models::workspace::StagedWorkspace;
use crate::services::stripe::{
    CheckoutLineItem, CheckoutMode, CreateCheckoutSessionRequest, StripeService, StripeServiceError,
};

#[derive(Debug, Clone)]
pub struct StageWorkspaceRequest {
    pub name: String,
    pub description: Option<String>,
    pub requested_by: Uuid,
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub workspace_name: String,
    pub user_id: Uuid,
    pub user_email: String,
    pub plan_id: Option<Uuid>,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutStarted {
    pub session_id: String,
    pub checkout_url: String,
}

/// Where the plan choice for a checkout comes from.
enum CheckoutTarget {
    Staged(StagedWorkspace),
    Durable { plan_id: Option<Uuid> },
}

/// Names are compared trimmed; blank ones are rejected.
fn workspace_name(raw: &str) -> Result<&str, BillingError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(BillingError::InvalidWorkspaceName);
    }
    Ok(name)
}

/// First half of deferred workspace creation: park the workspace in the stage store and send
/// the user to a hosted checkout page. Promotion happens later, in the checkout webhook.
#[derive(Clone)]
pub struct WorkspaceProvisioner {
    plans: Arc<dyn PlanRepository>,
    workspaces: Arc<dyn WorkspaceRepository>,
    stages: Arc<dyn WorkspaceStageRepository>,
    stripe: Arc<dyn StripeService>,
}

impl WorkspaceProvisioner {
    pub fn new(
        plans: Arc<dyn PlanRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
        stages: Arc<dyn WorkspaceStageRepository>,
        stripe: Arc<dyn StripeService>,
    ) -> Self {
        Self {
            plans,
            workspaces,
            stages,
            stripe,
        }
    }

    async fn active_plan(&self, plan_id: Uuid) -> Result<Plan, BillingError> {
        match self.plans.find_plan(plan_id).await? {
            Some(plan) if plan.is_active => Ok(plan),
            _ => Err(BillingError::PlanNotFound),
        }
    }

    /// Saves (or overwrites) the stage for `req.name`. Durable names are never shadowed.
    pub async fn stage_workspace(
        &self,
        req: StageWorkspaceRequest,
    ) -> Result<StagedWorkspace, BillingError> {
        let name = workspace_name(&req.name)?;
        if self.workspaces.find_workspace_by_name(name).await?.is_some() {
            return Err(BillingError::WorkspaceNameTaken);
        }
        if let Some(plan_id) = req.plan_id {
            self.active_plan(plan_id).await?;
        }

        let stage = StagedWorkspace {
            name: name.to_string(),
            description: req.description,
            requested_by: req.requested_by,
            plan_id: req.plan_id,
        };
        let saved = self.stages.save_stage(&stage).await?;
        info!(workspace_name = %saved.name, requested_by = %saved.requested_by, "workspace staged");
        Ok(saved)
    }

    pub async fn select_plan(
        &self,
        name: &str,
        plan_id: Uuid,
        user_id: Uuid,
    ) -> Result<StagedWorkspace, BillingError> {
        let name = workspace_name(name)?;
        let mut stage = self
            .stages
            .find_stage_by_name(name)
            .await?
            .ok_or(BillingError::WorkspaceNotFound)?;
        if stage.requested_by != user_id {
            return Err(BillingError::Unauthorized);
        }
        self.active_plan(plan_id).await?;

        stage.plan_id = Some(plan_id);
        Ok(self.stages.save_stage(&stage).await?)
    }

    async fn resolve_target(
        &self,
        workspace_name: &str,
        user_id: Uuid,
    ) -> Result<CheckoutTarget, BillingError> {
        if let Some(stage) = self.stages.find_stage_by_name(workspace_name).await? {
            if stage.requested_by != user_id {
                return Err(BillingError::Unauthorized);
            }
            return Ok(CheckoutTarget::Staged(stage));
        }

        let workspace = self
            .workspaces
            .find_workspace_by_name(workspace_name)
            .await?
            .ok_or(BillingError::WorkspaceNotFound)?;
        if !workspace.is_owned_by(user_id) {
            return Err(BillingError::Unauthorized);
        }
        if workspace.subscription_id.is_some() {
            return Err(BillingError::WorkspaceAlreadySubscribed);
        }
        Ok(CheckoutTarget::Durable {
            plan_id: workspace.plan_id,
        })
    }

    /// Opens a hosted checkout session. Safe to repeat: the only side effect is a new session.
    pub async fn start_checkout(
        &self,
        mut req: CheckoutRequest,
    ) -> Result<CheckoutStarted, BillingError> {
        req.workspace_name = workspace_name(&req.workspace_name)?.to_string();
        let target = self.resolve_target(&req.workspace_name, req.user_id).await?;
        let remembered = match &target {
            CheckoutTarget::Staged(stage) => stage.plan_id,
            CheckoutTarget::Durable { plan_id } => *plan_id,
        };
        let plan_id = req.plan_id.or(remembered).ok_or(BillingError::PlanNotSelected)?;

        let plan = self.active_plan(plan_id).await?;
        let price_id = plan
            .stripe_price_id
            .clone()
            .ok_or(BillingError::StripePriceIdMissing)?;

        let meta: BTreeMap<String, String> = [
            (metadata::WORKSPACE_NAME, req.workspace_name.clone()),
            (metadata::USER_ID, req.user_id.to_string()),
            (metadata::PLAN_ID, plan.id.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        let session = self
            .stripe
            .create_checkout_session(CreateCheckoutSessionRequest {
                success_url: req.success_url,
                cancel_url: req.cancel_url,
                mode: CheckoutMode::Subscription,
                line_items: vec![CheckoutLineItem {
                    price: price_id,
                    quantity: 1,
                }],
                client_reference_id: Some(req.user_id.to_string()),
                customer_email: Some(req.user_email),
                metadata: Some(meta),
            })
            .await?;

        let checkout_url = session.url.ok_or_else(|| {
            StripeServiceError::Other(format!("checkout session {} has no url", session.id))
        })?;

        info!(
            workspace_name = %req.workspace_name,
            user_id = %req.user_id,
            %plan_id,
            session_id = %session.id,
            staged = matches!(target, CheckoutTarget::Staged(_)),
            "checkout session created"
        );
        Ok(CheckoutStarted {
            session_id: session.id,
            checkout_url,
        })
    }
}
