use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::responses::JsonResponse;
use crate::services::billing::BillingError;
use crate::state::AppState;

// POST /api/stripe/webhook
pub async fn webhook(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let sig = match headers
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    {
        Some(s) => s,
        None => return JsonResponse::bad_request("Missing Stripe-Signature").into_response(),
    };

    match app_state.webhooks.dispatch_raw(&body, sig).await {
        Ok(outcome) => {
            Json(serde_json::json!({ "received": true, "outcome": outcome })).into_response()
        }
        Err(BillingError::InvalidSignature) => {
            (StatusCode::BAD_REQUEST, "invalid webhook").into_response()
        }
        // any other failure is a non-2xx so Stripe redelivers
        Err(err) => err.into_response(),
    }
}
