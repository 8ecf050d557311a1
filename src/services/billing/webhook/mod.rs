//! Inbound billing events: signature check, routing by event type, and replay suppression.
//!
//! Each handler owns exactly one [`BillingEventKind`]; the registry refuses a second handler for
//! a kind, so routing never depends on registration order.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::BillingError;
use crate::db::plan_repository::PlanRepository;
use crate::db::stripe_event_log_repository::StripeEventLogRepository;
use crate::db::subscription_repository::SubscriptionRepository;
use crate::db::workspace_repository::WorkspaceRepository;
use crate::db::workspace_stage_repository::WorkspaceStageRepository;
use crate::services::stripe::{StripeEvent, StripeService};

mod checkout_completed;
mod invoice_payment_succeeded;
mod subscription_updated;

pub use checkout_completed::CheckoutCompletedHandler;
pub use invoice_payment_succeeded::InvoicePaymentSucceededHandler;
pub use subscription_updated::SubscriptionUpdatedHandler;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BillingEventKind {
    CheckoutSessionCompleted,
    InvoicePaymentSucceeded,
    SubscriptionUpdated,
    Other(String),
}

impl BillingEventKind {
    pub fn parse(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            "invoice.payment_succeeded" => Self::InvoicePaymentSucceeded,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutSessionCompleted => "checkout.session.completed",
            Self::InvoicePaymentSucceeded => "invoice.payment_succeeded",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for BillingEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[async_trait]
pub trait BillingEventHandler: Send + Sync {
    fn kind(&self) -> BillingEventKind;

    fn supports(&self, kind: &BillingEventKind) -> bool {
        self.kind() == *kind
    }

    async fn handle(&self, event: &StripeEvent) -> Result<(), BillingError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchOutcome {
    Applied,
    /// No handler owns the event type.
    Ignored,
    /// The event id was already applied by an earlier delivery.
    Duplicate,
}

pub struct WebhookDispatcher {
    stripe: Arc<dyn StripeService>,
    event_log: Arc<dyn StripeEventLogRepository>,
    handlers: Vec<Arc<dyn BillingEventHandler>>,
}

impl WebhookDispatcher {
    pub fn new(stripe: Arc<dyn StripeService>, event_log: Arc<dyn StripeEventLogRepository>) -> Self {
        Self {
            stripe,
            event_log,
            handlers: Vec::new(),
        }
    }

    /// Dispatcher with the checkout, renewal and plan-change handlers registered.
    pub fn with_default_handlers(
        stripe: Arc<dyn StripeService>,
        event_log: Arc<dyn StripeEventLogRepository>,
        plans: Arc<dyn PlanRepository>,
        workspaces: Arc<dyn WorkspaceRepository>,
        subscriptions: Arc<dyn SubscriptionRepository>,
        stages: Arc<dyn WorkspaceStageRepository>,
    ) -> Result<Self, BillingError> {
        let mut dispatcher = Self::new(stripe.clone(), event_log);
        dispatcher.register(Arc::new(CheckoutCompletedHandler::new(
            plans.clone(),
            workspaces.clone(),
            subscriptions.clone(),
            stages,
            stripe.clone(),
        )))?;
        dispatcher.register(Arc::new(InvoicePaymentSucceededHandler::new(
            subscriptions.clone(),
            stripe,
        )))?;
        dispatcher.register(Arc::new(SubscriptionUpdatedHandler::new(
            plans,
            workspaces,
            subscriptions,
        )))?;
        Ok(dispatcher)
    }

    pub fn register(&mut self, handler: Arc<dyn BillingEventHandler>) -> Result<(), BillingError> {
        let kind = handler.kind();
        if self.handlers.iter().any(|h| h.supports(&kind)) {
            return Err(BillingError::DuplicateHandler(kind.to_string()));
        }
        self.handlers.push(handler);
        Ok(())
    }

    /// Verifies the raw body against `Stripe-Signature` and dispatches the event.
    pub async fn dispatch_raw(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<DispatchOutcome, BillingError> {
        let event = self.stripe.verify_webhook(payload, signature).map_err(|err| {
            warn!(?err, "rejected webhook with invalid signature");
            BillingError::InvalidSignature
        })?;
        self.dispatch(&event).await
    }

    pub async fn dispatch(&self, event: &StripeEvent) -> Result<DispatchOutcome, BillingError> {
        let kind = BillingEventKind::parse(&event.r#type);
        let Some(handler) = self.handlers.iter().find(|h| h.supports(&kind)) else {
            debug!(event_id = %event.id, event_type = %kind, "no handler for event type");
            return Ok(DispatchOutcome::Ignored);
        };

        if self.event_log.has_processed_event(&event.id).await? {
            info!(event_id = %event.id, event_type = %kind, "event already processed; skipping");
            return Ok(DispatchOutcome::Duplicate);
        }

        handler.handle(event).await.inspect_err(|err| {
            warn!(event_id = %event.id, event_type = %kind, ?err, "billing event handler failed");
        })?;

        self.event_log.record_event(&event.id, kind.as_str()).await?;
        info!(event_id = %event.id, event_type = %kind, "billing event applied");
        Ok(DispatchOutcome::Applied)
    }
}

/// `data.object` of a provider event.
pub(crate) fn event_object(event: &StripeEvent) -> Result<&Value, BillingError> {
    event
        .payload
        .pointer("/data/object")
        .ok_or(BillingError::MissingEventField("data.object"))
}

pub(crate) fn str_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

pub(crate) fn i64_at(value: &Value, pointer: &str) -> Option<i64> {
    value.pointer(pointer).and_then(Value::as_i64)
}

/// An expandable reference: either a bare id string or an object carrying `id`.
pub(crate) fn id_at<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    let field = value.pointer(pointer)?;
    field
        .as_str()
        .or_else(|| field.get("id").and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}
