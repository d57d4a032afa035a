//! Broadcast fan-out over the session registry.
//!
//! Each connection handler owns the receiving half of a bounded queue; the
//! registry holds the sending half as a [`SessionOutbox`]. Delivery is a
//! non-blocking `try_send`, so a slow client only loses its own frames.

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, error};

use webdebug_core::{
    BridgeError, BroadcastReport, DeliveryError, FrameSink, SessionId, SessionRegistry,
};
use webdebug_protocol::{encode_server_message, ServerMessage};

/// Sending half of one session's outbound queue.
#[derive(Debug, Clone)]
pub struct SessionOutbox {
    tx: mpsc::Sender<String>,
}

impl SessionOutbox {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }
}

impl FrameSink for SessionOutbox {
    fn try_deliver(&self, frame: &str) -> Result<(), DeliveryError> {
        self.tx.try_send(frame.to_string()).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Dropped,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Shape-agnostic broadcaster shared by every producer.
#[derive(Debug)]
pub struct Fanout {
    sessions: Mutex<SessionRegistry<SessionOutbox>>,
}

impl Fanout {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Mutex::new(SessionRegistry::with_capacity(capacity)),
        }
    }

    pub async fn register(
        &self,
        id: SessionId,
        outbox: SessionOutbox,
    ) -> Result<usize, BridgeError> {
        self.sessions.lock().await.register(id, outbox)
    }

    pub async fn unregister(&self, id: SessionId) -> bool {
        self.sessions.lock().await.unregister(id)
    }

    /// Push an already encoded frame to every session.
    pub async fn broadcast_frame(&self, frame: &str) -> BroadcastReport {
        let report = self.sessions.lock().await.broadcast(frame);
        debug!(
            "Broadcast to {} sessions ({} dropped, {} pruned)",
            report.delivered,
            report.dropped,
            report.pruned.len()
        );
        report
    }

    /// Encode `msg` once and push it to every session.
    pub async fn broadcast(&self, msg: &ServerMessage) -> BroadcastReport {
        match encode_server_message(msg) {
            Ok(frame) => self.broadcast_frame(&frame).await,
            Err(e) => {
                error!("Failed to encode broadcast: {}", e);
                BroadcastReport::default()
            }
        }
    }

    /// Send `msg` to one session only.
    pub async fn send_to(&self, id: SessionId, msg: &ServerMessage) -> Result<(), BridgeError> {
        let frame = encode_server_message(msg).map_err(|e| {
            error!("Failed to encode reply for session {}: {}", id, e);
            BridgeError::TransportFailure(id)
        })?;
        self.sessions.lock().await.send_to(id, &frame)
    }

    /// Occupied and total slots.
    pub async fn occupancy(&self) -> (usize, usize) {
        let sessions = self.sessions.lock().await;
        (sessions.len(), sessions.capacity())
    }

    pub async fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.lock().await.session_ids()
    }
}
