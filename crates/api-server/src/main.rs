//! API Server for the remote test runner
//!
//! Exposes list/run/rerun operations over REST on port 8081 and forwards
//! them to the remote test executor.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use test_runner::{HttpTransport, PollerConfig, RetryConfig, TestOrchestrator, TracingProgress};

use crate::config::ServerConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "api_server=debug,test_runner=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;
    let poller_config = PollerConfig::from_env();
    tracing::info!("Using test executor at {}", config.executor_url);
    tracing::debug!("Poller settings: {:?}", poller_config);

    let transport = Arc::new(HttpTransport::new(
        config.executor_url.clone(),
        RetryConfig::from_env(),
    ));
    let orchestrator = TestOrchestrator::new(transport, Arc::new(TracingProgress), poller_config);
    let app_state = AppState::new(orchestrator, config.executor_url.clone());

    let app = Router::new()
        .merge(routes::health::router())
        .merge(routes::test_runs::router())
        .with_state(app_state)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("REST API listening on {}", config.bind_addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
