use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::response::IntoResponse;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use planboard_backend::config::{Config, LogFormat, StageBackend};
use planboard_backend::db::{
    memory_workspace_stage_repository::InMemoryWorkspaceStageRepository,
    postgres_plan_repository::PostgresPlanRepository,
    postgres_stripe_event_log_repository::PostgresStripeEventLogRepository,
    postgres_subscription_repository::PostgresSubscriptionRepository,
    postgres_workspace_repository::PostgresWorkspaceRepository,
    postgres_workspace_stage_repository::PostgresWorkspaceStageRepository,
    workspace_stage_repository::WorkspaceStageRepository,
};
use planboard_backend::responses::JsonResponse;
use planboard_backend::routes;
use planboard_backend::services::stripe::LiveStripeService;
use planboard_backend::state::{AppState, Repositories};

const STAGE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let pg_pool = establish_connection(&config.database_url).await?;

    let stages: Arc<dyn WorkspaceStageRepository> = match config.stage_backend {
        StageBackend::Memory => Arc::new(InMemoryWorkspaceStageRepository::new(config.stage_ttl)),
        StageBackend::Postgres => Arc::new(PostgresWorkspaceStageRepository::new(
            pg_pool.clone(),
            config.stage_ttl,
        )),
    };
    info!(backend = ?config.stage_backend, ttl_secs = config.stage_ttl.as_secs(), "workspace stage store ready");

    let repos = Repositories {
        plans: Arc::new(PostgresPlanRepository {
            pool: pg_pool.clone(),
        }),
        workspaces: Arc::new(PostgresWorkspaceRepository {
            pool: pg_pool.clone(),
        }),
        subscriptions: Arc::new(PostgresSubscriptionRepository {
            pool: pg_pool.clone(),
        }),
        stages: stages.clone(),
        stripe_events: Arc::new(PostgresStripeEventLogRepository {
            pool: pg_pool.clone(),
        }),
    };
    let stripe = Arc::new(LiveStripeService::from_settings(&config.stripe));

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_origin
                .parse::<HeaderValue>()
                .context("FRONTEND_ORIGIN is not a valid header value")?,
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let addr = config.bind_addr;
    let state = AppState::new(config, repos, stripe)?;

    spawn_stage_purger(stages);

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .finish()
            .context("invalid rate limiter settings")?,
    );

    let governor_limiter = governor_conf.limiter().clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(60));
        loop {
            ticker.tick().await;
            governor_limiter.retain_recent();
        }
    });

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer::new(governor_conf).error_handler(|_err| {
            JsonResponse::too_many_requests(
                "Too many requests. Please wait a moment and try again.",
            )
            .into_response()
        }))
        .layer(cors);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "listening");
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPool::connect(database_url)
        .await
        .context("failed to connect to the database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("failed to verify database connection")?;

    info!("connected to the database");
    Ok(pool)
}

/// Drops abandoned workspace setups so their names become available again.
fn spawn_stage_purger(stages: Arc<dyn WorkspaceStageRepository>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(STAGE_PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            match stages.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged expired workspace stages"),
                Err(err) => warn!(?err, "failed to purge workspace stages"),
            }
        }
    });
}
