//! WebSocket server.
//!
//! This module accepts client connections and runs one handler per client:
//! - WebSocket handshake on the configured path
//! - Session registration (rejected when the registry is full)
//! - Initial pin snapshot
//! - Forwarding of queued broadcast frames and dispatch of inbound commands

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use webdebug_core::SessionId;
use webdebug_protocol::{encode_server_message, ErrorMessage, ServerMessage};

use crate::fanout::SessionOutbox;
use crate::interpreter::CommandInterpreter;
use crate::state::BridgeState;
use crate::tasks::spawn_periodic_tasks;

/// Configuration for the WebSocket server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server name used in logs.
    pub name: String,
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Request path accepted for the WebSocket upgrade.
    pub ws_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "webdebug".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            ws_path: "/ws".to_string(),
        }
    }
}

/// The bridge WebSocket server.
pub struct BridgeServer {
    config: ServerConfig,
    state: Arc<BridgeState>,
    next_session: AtomicU64,
}

impl BridgeServer {
    pub fn new(config: ServerConfig, state: Arc<BridgeState>) -> Self {
        Self {
            config,
            state,
            next_session: AtomicU64::new(1),
        }
    }

    /// Shared state, for other front ends such as the HTTP API.
    pub fn state(&self) -> Arc<BridgeState> {
        self.state.clone()
    }

    /// Start the periodic tasks and accept WebSocket connections forever.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            "{} listening on ws://{}{}",
            self.config.name, self.config.bind_addr, self.config.ws_path
        );

        // Stopped when this future is dropped.
        let _tasks = spawn_periodic_tasks(self.state.clone());

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    let id = SessionId::new(self.next_session.fetch_add(1, Ordering::Relaxed));
                    let config = self.config.clone();
                    let state = self.state.clone();

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, addr, id, config, state).await {
                            error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Handle a single WebSocket connection.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: SessionId,
    config: ServerConfig,
    state: Arc<BridgeState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("New connection from {} (session {})", addr, id);

    let ws_path = config.ws_path.clone();
    let ws_stream = tokio_tungstenite::accept_hdr_async(
        stream,
        move |req: &Request, resp: Response| {
            if req.uri().path() == ws_path {
                Ok(resp)
            } else {
                let mut reject = ErrorResponse::new(Some("Not found".to_string()));
                *reject.status_mut() = StatusCode::NOT_FOUND;
                Err(reject)
            }
        },
    )
    .await?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    let (outbox_tx, mut outbox_rx) = mpsc::channel(state.settings.session_queue_depth);
    if let Err(e) = state
        .attach_session(id, SessionOutbox::new(outbox_tx))
        .await
    {
        info!("Rejecting {}: {}", addr, e);
        let reply = encode_server_message(&ServerMessage::Error(ErrorMessage::from(&e)))?;
        ws_tx.send(Message::Text(reply)).await?;
        ws_tx.close().await.ok();
        return Ok(());
    }

    let interpreter = CommandInterpreter::new(state.clone());
    let send_timeout = state.settings.send_timeout();

    loop {
        tokio::select! {
            // Handle incoming messages from client
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        interpreter.handle(id, &text).await;
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("Client {} closed connection", addr);
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if ws_tx.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", addr, e);
                        break;
                    }
                    None => {
                        info!("Client {} disconnected", addr);
                        break;
                    }
                    _ => {} // Ignore other message types
                }
            }

            // Forward frames queued for this session
            frame = outbox_rx.recv() => {
                let Some(frame) = frame else {
                    debug!("Session {} outbox closed", id);
                    break;
                };
                match timeout(send_timeout, ws_tx.send(Message::Text(frame))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        warn!("Failed to send to {}: {}", addr, e);
                        break;
                    }
                    Err(_) => {
                        warn!("Send to {} timed out after {:?}", addr, send_timeout);
                        break;
                    }
                }
            }
        }
    }

    state.detach_session(id).await;
    info!("Session {} ({}) closed", id, addr);
    Ok(())
}
