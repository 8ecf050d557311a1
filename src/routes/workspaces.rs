use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::routes::auth::AuthSession;
use crate::services::billing::provisioning::{CheckoutRequest, StageWorkspaceRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StageWorkspaceBody {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub plan_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SelectPlanBody {
    pub plan_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
    pub workspace_name: String,
    #[serde(default)]
    pub plan_id: Option<Uuid>,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpgradeBody {
    pub plan_id: Uuid,
}

// POST /api/workspaces/stage
pub async fn stage_workspace(
    State(state): State<AppState>,
    session: AuthSession,
    Json(body): Json<StageWorkspaceBody>,
) -> Response {
    let req = StageWorkspaceRequest {
        name: body.name,
        description: body.description,
        requested_by: session.user_id(),
        plan_id: body.plan_id,
    };
    match state.provisioner.stage_workspace(req).await {
        Ok(stage) => (StatusCode::CREATED, Json(stage)).into_response(),
        Err(err) => err.into_response(),
    }
}

// PUT /api/workspaces/stage/{name}/plan
pub async fn select_plan(
    State(state): State<AppState>,
    session: AuthSession,
    Path(name): Path<String>,
    Json(body): Json<SelectPlanBody>,
) -> Response {
    match state
        .provisioner
        .select_plan(&name, body.plan_id, session.user_id())
        .await
    {
        Ok(stage) => Json(stage).into_response(),
        Err(err) => err.into_response(),
    }
}

// POST /api/workspaces/checkout
pub async fn start_checkout(
    State(state): State<AppState>,
    session: AuthSession,
    Json(body): Json<CheckoutBody>,
) -> Response {
    let origin = state.config.frontend_origin.trim_end_matches('/');
    let req = CheckoutRequest {
        workspace_name: body.workspace_name,
        user_id: session.user_id(),
        user_email: session.0.email.clone(),
        plan_id: body.plan_id,
        success_url: body
            .success_url
            .unwrap_or_else(|| format!("{origin}/billing/success")),
        cancel_url: body
            .cancel_url
            .unwrap_or_else(|| format!("{origin}/billing/cancel")),
    };
    match state.provisioner.start_checkout(req).await {
        Ok(started) => Json(started).into_response(),
        Err(err) => err.into_response(),
    }
}

// POST /api/workspaces/{workspace_id}/upgrade
pub async fn upgrade_plan(
    State(state): State<AppState>,
    session: AuthSession,
    Path(workspace_id): Path<Uuid>,
    Json(body): Json<UpgradeBody>,
) -> Response {
    match state
        .upgrader
        .upgrade(workspace_id, session.user_id(), body.plan_id)
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::routes::auth::claims::UserRole;
    use crate::routes::test_app::TestApp;

    fn post(uri: &str, token: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), 8192).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn stage_then_checkout_returns_hosted_url() {
        let app = TestApp::new();
        let plan = app.seed_plan("Team", "price_team").await;
        let user = Uuid::new_v4();
        let token = app.token(user, UserRole::User);

        let staged = app
            .router()
            .oneshot(post(
                "/api/workspaces/stage",
                &token,
                json!({ "name": "acme", "plan_id": plan.id }),
            ))
            .await
            .unwrap();
        assert_eq!(staged.status(), StatusCode::CREATED);

        let resp = app
            .router()
            .oneshot(post(
                "/api/workspaces/checkout",
                &token,
                json!({ "workspace_name": "acme" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let body = json_body(resp).await;
        assert_eq!(body["checkout_url"], "https://example.test/checkout");

        let sent = app.stripe.checkout_requests();
        assert_eq!(sent[0].success_url, "https://app.example.test/billing/success");
        assert_eq!(sent[0].customer_email.as_deref(), Some("member@example.com"));
    }

    #[tokio::test]
    async fn checkout_without_plan_is_a_bad_request() {
        let app = TestApp::new();
        let token = app.token(Uuid::new_v4(), UserRole::User);
        app.router()
            .oneshot(post("/api/workspaces/stage", &token, json!({ "name": "acme" })))
            .await
            .unwrap();

        let resp = app
            .router()
            .oneshot(post(
                "/api/workspaces/checkout",
                &token,
                json!({ "workspace_name": "acme" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(resp).await["code"], "plan_not_selected");
    }

    #[tokio::test]
    async fn upgrade_by_non_owner_is_forbidden() {
        let app = TestApp::new();
        let plan = app.seed_plan("Pro", "price_pro").await;
        let workspace = app.seed_workspace("acme", Uuid::new_v4()).await;
        let token = app.token(Uuid::new_v4(), UserRole::User);

        let resp = app
            .router()
            .oneshot(post(
                &format!("/api/workspaces/{}/upgrade", workspace.id),
                &token,
                json!({ "plan_id": plan.id }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        assert!(app.stripe.price_updates().is_empty());
    }

    #[tokio::test]
    async fn requests_without_session_are_rejected() {
        let app = TestApp::new();
        let resp = app
            .router()
            .oneshot(
                Request::post("/api/workspaces/stage")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(json!({ "name": "acme" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }
}
