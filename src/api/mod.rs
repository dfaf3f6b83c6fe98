//! HTTP API surface.

mod handlers;

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::get,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::service::QueryService;

/// Presence of each credential, captured at startup for the health check.
#[derive(Debug, Clone, serde::Serialize)]
pub struct KeyStatus {
    pub tavily: bool,
    pub openrouter_1: bool,
    pub openrouter_2: bool,
    pub openrouter_3: bool,
}

impl KeyStatus {
    pub fn from_env(config: &AppConfig) -> Self {
        let present = |var: &str| std::env::var(var).is_ok();
        Self {
            tavily: present(&config.search.api_key_env),
            openrouter_1: present(&config.models.generator.api_key_env),
            openrouter_2: present(&config.models.verifier.api_key_env),
            openrouter_3: present(&config.models.synthesizer.api_key_env),
        }
    }
}

pub struct AppState {
    pub service: QueryService,
    pub key_status: KeyStatus,
}

/// Build the router with all API routes and middleware.
pub fn router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    let cors = cors_layer(allowed_origins);

    Router::new()
        .route("/api/query", axum::routing::post(handlers::post_query))
        .route("/api/chats", get(handlers::list_chats))
        .route(
            "/api/chats/{chat_id}",
            get(handlers::get_chat_messages).delete(handlers::delete_chat),
        )
        .route("/api/domains", get(handlers::list_domains))
        .route("/api/example-queries", get(handlers::example_queries))
        .route("/api/health", get(handlers::health))
        .route("/api/test-models", get(handlers::test_models))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
}

/// Serve the API until ctrl-c.
pub async fn run(state: Arc<AppState>, config: &AppConfig) -> anyhow::Result<()> {
    let app = router(state, &config.server.allowed_origins);
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install ctrl-c handler");
        return;
    }
    info!("shutdown signal received");
}
