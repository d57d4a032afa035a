//! Read-only HTTP status API.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{extract::State, response::Json, routing::get, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use webdebug_protocol::{pin_snapshot, OscilloscopeMessage, PinEntry, WifiMessage};
use webdebug_server::BridgeState;

/// Session table occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionsInfo {
    pub occupied: usize,
    pub capacity: usize,
}

pub fn router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .route("/api/pins", get(pins_handler))
        .route("/api/pins/compact", get(compact_handler))
        .route("/api/oscilloscope", get(oscilloscope_handler))
        .route("/api/wifi", get(wifi_handler))
        .route("/api/sessions", get(sessions_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
pub async fn start_http_server(addr: SocketAddr, state: Arc<BridgeState>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", addr);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn pins_handler(State(state): State<Arc<BridgeState>>) -> Json<Vec<PinEntry>> {
    Json(pin_snapshot(&state.snapshot().await))
}

/// `"<pin>:<0|1>;"` for every pin.
async fn compact_handler(State(state): State<Arc<BridgeState>>) -> String {
    state.compact_states().await
}

async fn oscilloscope_handler(State(state): State<Arc<BridgeState>>) -> Json<OscilloscopeMessage> {
    Json(OscilloscopeMessage::from(state.analog_reading().await))
}

async fn wifi_handler(State(state): State<Arc<BridgeState>>) -> Json<WifiMessage> {
    Json(state.wifi_message())
}

async fn sessions_handler(State(state): State<Arc<BridgeState>>) -> Json<SessionsInfo> {
    let (occupied, capacity) = state.fanout.occupancy().await;
    Json(SessionsInfo { occupied, capacity })
}
