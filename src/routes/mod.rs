pub mod auth;
pub mod plans;
pub mod stripe;
pub mod workspaces;

use axum::{
    response::{IntoResponse, Response},
    routing::{get, patch, post, put},
    Router,
};

use crate::responses::JsonResponse;
use crate::state::AppState;

async fn health() -> Response {
    JsonResponse::success("ok").into_response()
}

/// Application routes with state applied. Transport layers (CORS, tracing, rate limiting)
/// are added by the binary.
pub fn router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/plans",
            get(plans::list_all_plans).post(plans::create_plan),
        )
        .route("/plans/{plan_id}", patch(plans::update_plan));

    let workspace_routes = Router::new()
        .route("/stage", post(workspaces::stage_workspace))
        .route("/stage/{name}/plan", put(workspaces::select_plan))
        .route("/checkout", post(workspaces::start_checkout))
        .route("/{workspace_id}/upgrade", post(workspaces::upgrade_plan));

    Router::new()
        .route("/health", get(health))
        .route("/api/plans", get(plans::list_active_plans))
        .route("/api/stripe/webhook", post(stripe::webhook))
        .nest("/api/admin", admin_routes)
        .nest("/api/workspaces", workspace_routes)
        .with_state(state)
}
