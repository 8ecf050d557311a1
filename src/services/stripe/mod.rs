// NOTE: async-stripe is compiled with a minimal feature set (runtime-tokio-hyper, checkout,
// billing, webhook-events, and connect to satisfy webhook payload types). Touching APIs outside
// those features will require updating Cargo.toml explicitly.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::plan::BillingInterval;

#[derive(Debug, thiserror::Error)]
pub enum StripeServiceError {
    #[error("stripe api error: {0}")]
    Api(String),
    #[error("webhook verification failed: {0}")]
    Webhook(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("other error: {0}")]
    Other(String),
}

impl From<stripe::StripeError> for StripeServiceError {
    fn from(err: stripe::StripeError) -> Self {
        StripeServiceError::Api(err.to_string())
    }
}

impl From<stripe::WebhookError> for StripeServiceError {
    fn from(err: stripe::WebhookError) -> Self {
        StripeServiceError::Webhook(err.to_string())
    }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutMode {
    Payment,
    Subscription,
    Setup,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutLineItem {
    pub price: String,
    pub quantity: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateCheckoutSessionRequest {
    pub success_url: String,
    pub cancel_url: String,
    pub mode: CheckoutMode,
    pub line_items: Vec<CheckoutLineItem>,
    pub client_reference_id: Option<String>,
    pub customer_email: Option<String>,
    /// Copied onto the session and onto the subscription it creates.
    pub metadata: Option<BTreeMap<String, String>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub unit_amount: i64,
    pub interval: BillingInterval,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductWithPrice {
    pub product_id: String,
    pub price_id: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProrationBehavior {
    CreateProrations,
    AlwaysInvoice,
    None,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    pub r#type: String,
    /// Unix timestamp (seconds) at which the provider created the event
    pub created: i64,
    pub payload: serde_json::Value,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionInfo {
    pub id: String,
    pub customer_id: Option<String>,
    pub status: String,
    /// Unix timestamp (seconds) when the current period started, if reported
    pub current_period_start: Option<i64>,
    /// Unix timestamp (seconds) when the current period ends, if reported
    pub current_period_end: Option<i64>,
    /// Price of the first subscription item
    pub price_id: Option<String>,
}

#[async_trait]
pub trait StripeService: Send + Sync {
    async fn create_product_with_price(
        &self,
        req: CreateProductRequest,
    ) -> Result<ProductWithPrice, StripeServiceError>;

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError>;

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError>;

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError>;

    /// Swaps the price of the subscription's first item.
    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        price_id: &str,
        proration: ProrationBehavior,
    ) -> Result<SubscriptionInfo, StripeServiceError>;
}

mod live;
mod mock;

pub use live::LiveStripeService;
pub use mock::MockStripeService;
