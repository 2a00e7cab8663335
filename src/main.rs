//! Watch Relay - chat relay between a Pebble watch and Claude
//!
//! Decodes the conversation the watch sends, calls the Messages API and
//! forwards the reply back as small key/value frames.

mod api;
mod config;
mod connectors;
mod conversation;
mod llm;
mod relay;
mod runtime;
mod settings;
mod sink;

use api::{create_router, AppState};
use config::RelayConfig;
use runtime::RelayRuntime;
use settings::SqliteSettingsStore;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "watch_relay=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = RelayConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening settings store");
    let store = Arc::new(SqliteSettingsStore::open(&config.db_path)?);

    if !settings::is_ready(store.as_ref()) {
        tracing::warn!("No API key configured. Submit one through /settings.");
    }

    let runtime = RelayRuntime::new(store, &config)?;
    let shutdown = runtime.shutdown_token();
    let state = AppState::new(runtime);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(
        %addr,
        streaming = config.streaming_default,
        timeout_secs = config.request_timeout.as_secs(),
        "Watch relay listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
                return;
            }
            tracing::info!("Shutting down");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
