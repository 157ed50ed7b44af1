//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use courier_core::{CourierConfig, Result};
use courier_scheduler::{EngineContext, SchedulerEngine};

/// Shared state for the gateway server.
pub struct AppState {
    pub config: CourierConfig,
    /// Engine context — store, transport gate, run flag.
    pub ctx: Arc<EngineContext>,
    /// Scheduler engine — owns every armed trigger and timer.
    pub engine: Arc<tokio::sync::Mutex<SchedulerEngine>>,
    /// Handle of the running scheduler loop, if any.
    pub loop_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    pub start_time: std::time::Instant,
}

impl AppState {
    pub fn new(config: CourierConfig, ctx: Arc<EngineContext>) -> Self {
        let engine = Arc::new(tokio::sync::Mutex::new(SchedulerEngine::new(ctx.clone())));
        Self {
            config,
            ctx,
            engine,
            loop_task: tokio::sync::Mutex::new(None),
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(super::routes::dashboard))
        .route("/api/v1/health", get(super::routes::health_check))
        .route("/api/v1/bot/start", post(super::routes::start_bot))
        .route("/api/v1/bot/stop", post(super::routes::stop_bot))
        .route(
            "/api/v1/recipients",
            get(super::routes::list_recipients).post(super::routes::add_recipient),
        )
        .route(
            "/api/v1/templates",
            get(super::routes::list_templates).post(super::routes::add_template),
        )
        .route(
            "/api/v1/schedules",
            get(super::routes::list_schedules).post(super::routes::create_schedule),
        )
        .route("/api/v1/schedules/check", post(super::routes::check_schedules))
        .route("/api/v1/send", post(super::routes::send_now))
        .route("/api/v1/history", get(super::routes::history))
        .route("/api/v1/stats", get(super::routes::stats))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<AppState>) -> Result<()> {
    let addr = format!(
        "{}:{}",
        state.config.gateway.host, state.config.gateway.port
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("🌐 Gateway listening on http://{addr}");
    axum::serve(listener, build_router(state))
        .await
        .map_err(courier_core::CourierError::Io)?;
    Ok(())
}
