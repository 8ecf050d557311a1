use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::responses::JsonResponse;
use crate::services::stripe::StripeServiceError;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("a plan with this name and interval already exists")]
    PlanAlreadyExists,
    #[error("plan not found")]
    PlanNotFound,
    #[error("no plan selected for this workspace")]
    PlanNotSelected,
    #[error("plan has no stripe price")]
    StripePriceIdMissing,
    #[error("invalid plan: {0}")]
    InvalidPlan(&'static str),
    #[error("checkout metadata is missing `{0}`")]
    MissingMetadata(&'static str),
    #[error("event payload is missing `{0}`")]
    MissingEventField(&'static str),
    #[error("workspace not found")]
    WorkspaceNotFound,
    #[error("workspace name must not be empty")]
    InvalidWorkspaceName,
    #[error("workspace name is already taken")]
    WorkspaceNameTaken,
    #[error("workspace already has a subscription")]
    WorkspaceAlreadySubscribed,
    #[error("subscription not found")]
    SubscriptionNotFound,
    #[error("only the workspace owner may do this")]
    Unauthorized,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("a handler for `{0}` is already registered")]
    DuplicateHandler(String),
    #[error(transparent)]
    Stripe(#[from] StripeServiceError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl BillingError {
    pub fn code(&self) -> &'static str {
        match self {
            BillingError::PlanAlreadyExists => "plan_already_exists",
            BillingError::PlanNotFound => "plan_not_found",
            BillingError::PlanNotSelected => "plan_not_selected",
            BillingError::StripePriceIdMissing => "stripe_price_id_missing",
            BillingError::InvalidPlan(_) => "invalid_plan",
            BillingError::MissingMetadata(_) => "missing_metadata",
            BillingError::MissingEventField(_) => "missing_event_field",
            BillingError::WorkspaceNotFound => "workspace_not_found",
            BillingError::InvalidWorkspaceName => "invalid_workspace_name",
            BillingError::WorkspaceNameTaken => "workspace_name_taken",
            BillingError::WorkspaceAlreadySubscribed => "workspace_already_subscribed",
            BillingError::SubscriptionNotFound => "subscription_not_found",
            BillingError::Unauthorized => "unauthorized",
            BillingError::InvalidSignature => "invalid_signature",
            BillingError::DuplicateHandler(_) => "duplicate_handler",
            BillingError::Stripe(_) => "stripe_error",
            BillingError::Database(_) => "database_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            BillingError::PlanNotSelected
            | BillingError::StripePriceIdMissing
            | BillingError::InvalidPlan(_)
            | BillingError::InvalidWorkspaceName
            | BillingError::MissingMetadata(_)
            | BillingError::MissingEventField(_)
            | BillingError::InvalidSignature => StatusCode::BAD_REQUEST,
            BillingError::PlanNotFound
            | BillingError::WorkspaceNotFound
            | BillingError::SubscriptionNotFound => StatusCode::NOT_FOUND,
            BillingError::Unauthorized => StatusCode::FORBIDDEN,
            BillingError::PlanAlreadyExists
            | BillingError::WorkspaceNameTaken
            | BillingError::WorkspaceAlreadySubscribed => StatusCode::CONFLICT,
            BillingError::DuplicateHandler(_)
            | BillingError::Stripe(_)
            | BillingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BillingError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            // internals stay in the log, not the response body
            error!(err = ?self, code = self.code(), "billing request failed");
            return JsonResponse::error_with_code(status, "Billing operation failed", self.code())
                .into_response();
        }
        JsonResponse::error_with_code(status, &self.to_string(), self.code()).into_response()
    }
}
