use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::models::plan::{NewPlan, PlanPatch};
use crate::responses::JsonResponse;
use crate::routes::auth::AuthSession;
use crate::state::AppState;

fn require_admin(session: &AuthSession) -> Result<(), Response> {
    if session.0.is_admin() {
        Ok(())
    } else {
        Err(JsonResponse::forbidden("Admin access required").into_response())
    }
}

// GET /api/plans
pub async fn list_active_plans(State(state): State<AppState>) -> Response {
    match state.plan_catalog.get_active_plans().await {
        Ok(plans) => Json(plans).into_response(),
        Err(err) => err.into_response(),
    }
}

// GET /api/admin/plans
pub async fn list_all_plans(State(state): State<AppState>, session: AuthSession) -> Response {
    if let Err(resp) = require_admin(&session) {
        return resp;
    }
    match state.plan_catalog.get_all_plans().await {
        Ok(plans) => Json(plans).into_response(),
        Err(err) => err.into_response(),
    }
}

// POST /api/admin/plans
pub async fn create_plan(
    State(state): State<AppState>,
    session: AuthSession,
    Json(payload): Json<NewPlan>,
) -> Response {
    if let Err(resp) = require_admin(&session) {
        return resp;
    }
    match state.plan_catalog.create_plan(payload).await {
        Ok(plan) => (StatusCode::CREATED, Json(plan)).into_response(),
        Err(err) => err.into_response(),
    }
}

// PATCH /api/admin/plans/{plan_id}
pub async fn update_plan(
    State(state): State<AppState>,
    session: AuthSession,
    Path(plan_id): Path<Uuid>,
    Json(patch): Json<PlanPatch>,
) -> Response {
    if let Err(resp) = require_admin(&session) {
        return resp;
    }
    match state.plan_catalog.update_plan(plan_id, patch).await {
        Ok(plan) => Json(plan).into_response(),
        Err(err) => err.into_response(),
    }
}
