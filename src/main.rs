//! Sticker bot - token-metered sticker conversion over a chat bridge
//!
//! Receives inbound chat events over HTTP, greets new contacts with a free
//! token grant and turns media from known contacts into stickers, one
//! token each.

mod api;
mod config;
mod contacts;
mod db;
mod error;
mod flow;
mod ledger;
mod message_log;
mod runtime;
mod transport;

use api::{create_router, AppState};
use config::BotConfig;
use db::Database;
use runtime::{DatabaseStorage, ProductionDispatcher};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transport::BridgeTransport;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stickerbot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = BotConfig::from_env();

    // Ensure database directory exists
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %config.db_path.display(), "Opening database");
    let db = Database::open(&config.db_path)?;

    let transport = BridgeTransport::new(
        &config.bridge_url,
        config.bridge_token.clone(),
        config.call_timeout,
    )?;
    tracing::info!(bridge = %config.bridge_url, "Chat bridge configured");

    let dispatcher: Arc<ProductionDispatcher> = Arc::new(
        runtime::Dispatcher::new(
            DatabaseStorage::new(db),
            Arc::new(transport),
            config.script.clone(),
            config.call_timeout,
        )
        .with_lane_idle(config.lane_idle),
    );

    let state = AppState::new(Arc::clone(&dispatcher), config.files_dir.clone());

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new().gzip(true).br(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Sticker bot listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    dispatcher.shutdown();
    tracing::info!("Sticker bot stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
