use super::{
    CheckoutSession, CreateCheckoutSessionRequest, CreateProductRequest, ProductWithPrice,
    ProrationBehavior, StripeEvent, StripeService, StripeServiceError, SubscriptionInfo,
};
use crate::utils::webhook_signature::verify_signature;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// In-process stand-in for the provider. Records every outbound request so tests can
/// assert on what would have been sent.
#[derive(Clone, Default)]
pub struct MockStripeService {
    pub created_sessions: Arc<Mutex<Vec<CheckoutSession>>>,
    pub last_create_requests: Arc<Mutex<Vec<CreateCheckoutSessionRequest>>>,
    pub product_requests: Arc<Mutex<Vec<CreateProductRequest>>>,
    pub subscriptions: Arc<Mutex<HashMap<String, SubscriptionInfo>>>,
    pub subscription_lookups: Arc<Mutex<Vec<String>>>,
    pub price_updates: Arc<Mutex<Vec<(String, String, ProrationBehavior)>>>,
    pub fail_product_creation: Arc<Mutex<bool>>,
    webhook_secret: Option<String>,
    counter: Arc<AtomicU64>,
}

impl MockStripeService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Require real `t=,v1=` signatures instead of accepting any header.
    pub fn with_webhook_secret(mut self, secret: impl Into<String>) -> Self {
        self.webhook_secret = Some(secret.into());
        self
    }

    pub fn with_subscription(self, sub: SubscriptionInfo) -> Self {
        self.insert_subscription(sub);
        self
    }

    pub fn insert_subscription(&self, sub: SubscriptionInfo) {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(sub.id.clone(), sub);
    }

    pub fn set_fail_product_creation(&self, fail: bool) {
        *self.fail_product_creation.lock().unwrap() = fail;
    }

    pub fn checkout_requests(&self) -> Vec<CreateCheckoutSessionRequest> {
        self.last_create_requests.lock().unwrap().clone()
    }

    pub fn price_updates(&self) -> Vec<(String, String, ProrationBehavior)> {
        self.price_updates.lock().unwrap().clone()
    }

    fn make_id(&self, prefix: &str) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}_{}", prefix, n)
    }
}

#[async_trait]
impl StripeService for MockStripeService {
    async fn create_product_with_price(
        &self,
        req: CreateProductRequest,
    ) -> Result<ProductWithPrice, StripeServiceError> {
        if *self.fail_product_creation.lock().unwrap() {
            return Err(StripeServiceError::Api("product creation rejected".into()));
        }
        self.product_requests.lock().unwrap().push(req);
        Ok(ProductWithPrice {
            product_id: self.make_id("prod_test"),
            price_id: self.make_id("price_test"),
        })
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        self.last_create_requests.lock().unwrap().push(req);

        let session = CheckoutSession {
            id: self.make_id("cs_test"),
            url: Some("https://example.test/checkout".into()),
        };
        self.created_sessions.lock().unwrap().push(session.clone());
        Ok(session)
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        if let Some(secret) = &self.webhook_secret {
            verify_signature(secret, payload, signature_header)
                .map_err(|e| StripeServiceError::Webhook(e.to_string()))?;
        }

        let val: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        let id = match val.get("id").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => self.make_id("evt"),
        };
        let ty = val
            .get("type")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown")
            .to_string();
        let created = val.get("created").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(StripeEvent {
            id,
            r#type: ty,
            created,
            payload: val,
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        self.subscription_lookups
            .lock()
            .unwrap()
            .push(subscription_id.to_string());
        self.subscriptions
            .lock()
            .unwrap()
            .get(subscription_id)
            .cloned()
            .ok_or_else(|| {
                StripeServiceError::NotFound(format!("subscription {} not found", subscription_id))
            })
    }

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        price_id: &str,
        proration: ProrationBehavior,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        self.price_updates.lock().unwrap().push((
            subscription_id.to_string(),
            price_id.to_string(),
            proration,
        ));

        let mut guard = self.subscriptions.lock().unwrap();
        let sub = guard.get_mut(subscription_id).ok_or_else(|| {
            StripeServiceError::NotFound(format!("subscription {} not found", subscription_id))
        })?;
        sub.price_id = Some(price_id.to_string());
        Ok(sub.clone())
    }
}
