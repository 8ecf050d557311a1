use super::{
    CheckoutLineItem, CheckoutMode, CheckoutSession, CreateCheckoutSessionRequest,
    CreateProductRequest, ProductWithPrice, ProrationBehavior, StripeEvent, StripeService,
    StripeServiceError, SubscriptionInfo,
};
use crate::models::plan::BillingInterval;
use async_trait::async_trait;
use std::collections::HashMap;

pub struct LiveStripeService {
    client: stripe::Client,
    webhook_secret: String,
}

impl LiveStripeService {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        let client = stripe::Client::new(secret_key);
        Self {
            client,
            webhook_secret: webhook_secret.into(),
        }
    }

    pub fn from_settings(settings: &crate::config::StripeSettings) -> Self {
        Self::new(settings.secret_key.clone(), settings.webhook_secret.clone())
    }

    async fn fetch_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<stripe::Subscription, StripeServiceError> {
        let sub_id = parse_subscription_id(subscription_id)?;
        Ok(stripe::Subscription::retrieve(&self.client, &sub_id, &[]).await?)
    }
}

fn parse_subscription_id(id: &str) -> Result<stripe::SubscriptionId, StripeServiceError> {
    id.parse::<stripe::SubscriptionId>()
        .map_err(|e| StripeServiceError::Other(e.to_string()))
}

fn map_mode(mode: CheckoutMode) -> stripe::CheckoutSessionMode {
    match mode {
        CheckoutMode::Payment => stripe::CheckoutSessionMode::Payment,
        CheckoutMode::Subscription => stripe::CheckoutSessionMode::Subscription,
        CheckoutMode::Setup => stripe::CheckoutSessionMode::Setup,
    }
}

fn map_interval(interval: BillingInterval) -> stripe::CreatePriceRecurringInterval {
    match interval {
        BillingInterval::Monthly => stripe::CreatePriceRecurringInterval::Month,
        BillingInterval::Yearly => stripe::CreatePriceRecurringInterval::Year,
    }
}

fn map_line_items(items: &[CheckoutLineItem]) -> Vec<stripe::CreateCheckoutSessionLineItems> {
    items
        .iter()
        .map(|li| stripe::CreateCheckoutSessionLineItems {
            price: Some(li.price.clone()),
            quantity: Some(li.quantity),
            ..Default::default()
        })
        .collect()
}

fn map_subscription(sub: &stripe::Subscription) -> SubscriptionInfo {
    let customer_id = match &sub.customer {
        stripe::Expandable::Id(id) => id.to_string(),
        stripe::Expandable::Object(c) => c.id.to_string(),
    };
    let price_id = sub
        .items
        .data
        .first()
        .and_then(|item| item.price.as_ref())
        .map(|price| price.id.to_string());

    SubscriptionInfo {
        id: sub.id.to_string(),
        customer_id: Some(customer_id),
        status: sub.status.to_string(),
        current_period_start: Some(sub.current_period_start),
        current_period_end: Some(sub.current_period_end),
        price_id,
    }
}

#[async_trait]
impl StripeService for LiveStripeService {
    async fn create_product_with_price(
        &self,
        req: CreateProductRequest,
    ) -> Result<ProductWithPrice, StripeServiceError> {
        let product =
            stripe::Product::create(&self.client, stripe::CreateProduct::new(&req.name)).await?;
        let product_id = product.id.to_string();

        let mut params = stripe::CreatePrice::new(stripe::Currency::USD);
        params.product = Some(stripe::IdOrCreate::Id(&product_id));
        params.unit_amount = Some(req.unit_amount);
        params.recurring = Some(stripe::CreatePriceRecurring {
            interval: map_interval(req.interval),
            ..Default::default()
        });
        let price = stripe::Price::create(&self.client, params).await?;

        Ok(ProductWithPrice {
            product_id,
            price_id: price.id.to_string(),
        })
    }

    async fn create_checkout_session(
        &self,
        req: CreateCheckoutSessionRequest,
    ) -> Result<CheckoutSession, StripeServiceError> {
        let mut params = stripe::CreateCheckoutSession::new();
        params.mode = Some(map_mode(req.mode));
        params.success_url = Some(&req.success_url);
        params.cancel_url = Some(&req.cancel_url);
        if let Some(ref id) = req.client_reference_id {
            params.client_reference_id = Some(id);
        }
        if let Some(ref email) = req.customer_email {
            params.customer_email = Some(email);
        }
        if let Some(ref meta) = req.metadata {
            let m: HashMap<String, String> =
                meta.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            if req.mode == CheckoutMode::Subscription {
                params.subscription_data = Some(stripe::CreateCheckoutSessionSubscriptionData {
                    metadata: Some(m.clone()),
                    ..Default::default()
                });
            }
            params.metadata = Some(m);
        }
        if !req.line_items.is_empty() {
            params.line_items = Some(map_line_items(&req.line_items));
        }

        let session = stripe::CheckoutSession::create(&self.client, params).await?;
        Ok(CheckoutSession {
            id: session.id.to_string(),
            url: session.url.clone(),
        })
    }

    fn verify_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<StripeEvent, StripeServiceError> {
        let payload_str =
            std::str::from_utf8(payload).map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        let event =
            stripe::Webhook::construct_event(payload_str, signature_header, &self.webhook_secret)?;
        // Keep the raw body so handlers read exactly what the provider sent.
        let payload: serde_json::Value = serde_json::from_str(payload_str)
            .map_err(|e| StripeServiceError::Serde(e.to_string()))?;
        Ok(StripeEvent {
            id: event.id.to_string(),
            r#type: event.type_.to_string(),
            created: event.created,
            payload,
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        let sub = self.fetch_subscription(subscription_id).await?;
        Ok(map_subscription(&sub))
    }

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        price_id: &str,
        proration: ProrationBehavior,
    ) -> Result<SubscriptionInfo, StripeServiceError> {
        let current = self.fetch_subscription(subscription_id).await?;
        let item_id = current
            .items
            .data
            .first()
            .map(|item| item.id.to_string())
            .ok_or_else(|| {
                StripeServiceError::NotFound(format!(
                    "subscription {} has no items",
                    subscription_id
                ))
            })?;

        let mut params = stripe::UpdateSubscription::new();
        {
            use stripe::generated::billing::subscription::SubscriptionProrationBehavior as SPB;
            params.proration_behavior = Some(match proration {
                ProrationBehavior::CreateProrations => SPB::CreateProrations,
                ProrationBehavior::AlwaysInvoice => SPB::AlwaysInvoice,
                ProrationBehavior::None => SPB::None,
            });
        }
        params.items = Some(vec![stripe::UpdateSubscriptionItems {
            id: Some(item_id),
            price: Some(price_id.to_string()),
            ..Default::default()
        }]);

        let sub_id = parse_subscription_id(subscription_id)?;
        let updated = stripe::Subscription::update(&self.client, &sub_id, params).await?;
        Ok(map_subscription(&updated))
    }
}
