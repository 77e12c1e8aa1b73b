//! HTTP gateway for Parley.
//!
//! Exposes the health check and the v1 API (sessions, messages, websocket,
//! event stream, rule administration). Built on Axum.

pub mod api_v1;
pub mod runtime;

pub use runtime::{Backends, Runtime, open_stores};

use axum::extract::{DefaultBodyLimit, State};
use axum::{Router, response::Json, routing::get};
use parley_config::AppConfig;
use parley_core::knowledge::KnowledgeIndex;
use parley_rules::RuleAdmin;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Build the full router.
///
/// Layers applied:
/// - CORS for browser chat clients
/// - Request body size limit (`gateway.body_limit`)
/// - HTTP trace logging
pub fn build_router(runtime: &Runtime) -> Router {
    let api_state = Arc::new(api_v1::ApiState::from(runtime));
    let health_state = HealthState {
        admin: runtime.admin.clone(),
        knowledge: runtime.knowledge.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::PUT,
            axum::http::Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::CONTENT_TYPE,
            axum::http::header::AUTHORIZATION,
        ])
        .max_age(std::time::Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health_handler))
        .with_state(health_state)
        .nest("/v1", api_v1::v1_router(api_state))
        .layer(DefaultBodyLimit::max(runtime.config.gateway.body_limit))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Build the runtime from `config` and serve until the process exits.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    let runtime = Runtime::from_config(config).await?;
    serve(runtime, &addr).await
}

/// Serve an already-built runtime on `addr`.
pub async fn serve(runtime: Runtime, addr: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let app = build_router(&runtime);

    info!(
        addr = %addr,
        model = %runtime.config.default_model,
        admin_auth = runtime.config.gateway.admin_token.is_some(),
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[derive(Clone)]
struct HealthState {
    admin: Arc<RuleAdmin>,
    knowledge: Arc<dyn KnowledgeIndex>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    active_rules: usize,
    rule_generation: u64,
    /// `None` when the knowledge index cannot be counted.
    passages: Option<usize>,
}

async fn health_handler(State(state): State<HealthState>) -> Json<HealthResponse> {
    let cache = state.admin.cache();
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        active_rules: cache.len(),
        rule_generation: cache.generation(),
        passages: state.knowledge.count().await.ok(),
    })
}
