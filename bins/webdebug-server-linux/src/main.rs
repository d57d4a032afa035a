mod demo;
mod http;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use webdebug_server::{BridgeServer, BridgeState, ServerConfig, SimBoard};

use crate::storage::FileConfigStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,webdebug_server=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("webdebug bridge starting...");

    // Configuration
    let storage = FileConfigStorage::from_env();
    let settings = storage
        .load_or_default()
        .with_context(|| format!("loading settings from {}", storage.path().display()))?;
    tracing::info!("Settings: {:?}", settings);

    let ws_addr: SocketAddr = "0.0.0.0:8080".parse()?;
    let http_addr: SocketAddr = "0.0.0.0:8081".parse()?;

    let config = ServerConfig {
        name: "webdebug".to_string(),
        bind_addr: ws_addr,
        ws_path: "/ws".to_string(),
    };

    // Simulated hardware
    let board = SimBoard::new();
    demo::attach_demo_devices(&board);
    let state = Arc::new(BridgeState::simulated(settings, &board)?);

    let server = BridgeServer::new(config, state.clone());

    // Spawn WebSocket server
    let ws_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!("WebSocket server error: {}", e);
        }
    });

    // Start HTTP API server
    let http_handle = tokio::spawn(async move {
        if let Err(e) = http::start_http_server(http_addr, state).await {
            tracing::error!("HTTP server error: {}", e);
        }
    });

    // Start demo stimulus
    let demo_handle = tokio::spawn(demo::generate_demo_stimulus(board));

    tracing::info!("webdebug bridge ready");
    tracing::info!("   WebSocket: ws://localhost:8080/ws");
    tracing::info!("   HTTP API:  http://localhost:8081/api/pins");
    tracing::info!("Try: websocat ws://localhost:8080/ws  then send  MODE:5,OUTPUT  WRITE:5,1");

    // Wait for shutdown signal
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl+C, shutting down...");
        }
        _ = ws_handle => {
            tracing::warn!("WebSocket server stopped");
        }
        _ = http_handle => {
            tracing::warn!("HTTP server stopped");
        }
        _ = demo_handle => {
            tracing::warn!("Demo stimulus stopped");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
