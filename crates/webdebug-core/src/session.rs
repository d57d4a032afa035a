//! Fixed-capacity session registry with best-effort broadcast.
//!
//! Each connected client occupies one slot. The registry knows nothing about
//! message shapes: it delivers text frames through a [`FrameSink`] and drops
//! sessions whose transport has gone away.

use std::fmt;

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::BridgeError;

/// Opaque identifier of a connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why a frame was not delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The session is alive but cannot take the frame right now; it is lost.
    #[error("frame dropped")]
    Dropped,
    /// The transport behind the session is gone.
    #[error("transport closed")]
    Closed,
}

/// Non-blocking delivery of a text frame to one session.
pub trait FrameSink {
    fn try_deliver(&self, frame: &str) -> Result<(), DeliveryError>;
}

/// Result of one broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    pub dropped: usize,
    /// Sessions removed because their transport was closed.
    pub pruned: Vec<SessionId>,
}

#[derive(Debug)]
struct Session<S> {
    id: SessionId,
    sink: S,
}

/// Slot table of connected sessions.
#[derive(Debug)]
pub struct SessionRegistry<S> {
    slots: Vec<Option<Session<S>>>,
}

impl<S: FrameSink> SessionRegistry<S> {
    /// Create a registry with `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    fn slot_of(&self, id: SessionId) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|s| s.id == id))
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.slot_of(id).is_some()
    }

    /// Ids of the occupied slots, in slot order.
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.slots.iter().flatten().map(|s| s.id).collect()
    }

    /// Place a session in the first free slot and return the slot index.
    ///
    /// Registering an id that is already present returns its current slot.
    pub fn register(&mut self, id: SessionId, sink: S) -> Result<usize, BridgeError> {
        if let Some(slot) = self.slot_of(id) {
            return Ok(slot);
        }

        let slot = self
            .slots
            .iter()
            .position(Option::is_none)
            .ok_or(BridgeError::RegistryFull {
                capacity: self.capacity(),
            })?;

        self.slots[slot] = Some(Session { id, sink });
        debug!("Session {} registered in slot {}", id, slot);
        Ok(slot)
    }

    /// Free the slot held by `id`. Returns whether a slot was freed.
    pub fn unregister(&mut self, id: SessionId) -> bool {
        match self.slot_of(id) {
            Some(slot) => {
                self.slots[slot] = None;
                debug!("Session {} unregistered from slot {}", id, slot);
                true
            }
            None => false,
        }
    }

    /// Deliver `frame` to every registered session.
    ///
    /// A failure on one session never stops delivery to the others. Sessions
    /// whose transport is closed are removed.
    pub fn broadcast(&mut self, frame: &str) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for slot in self.slots.iter_mut() {
            let (id, outcome) = match slot.as_ref() {
                Some(session) => (session.id, session.sink.try_deliver(frame)),
                None => continue,
            };

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(DeliveryError::Dropped) => {
                    debug!("Dropped frame for slow session {}", id);
                    report.dropped += 1;
                }
                Err(DeliveryError::Closed) => {
                    warn!("Session {} transport closed, pruning", id);
                    report.pruned.push(id);
                    *slot = None;
                }
            }
        }

        report
    }

    /// Deliver `frame` to one session only.
    ///
    /// # Errors
    ///
    /// `TransportFailure` if the session is unknown, closed (it is then
    /// removed) or cannot take the frame.
    pub fn send_to(&mut self, id: SessionId, frame: &str) -> Result<(), BridgeError> {
        let slot = self.slot_of(id).ok_or(BridgeError::TransportFailure(id))?;
        let result = match &self.slots[slot] {
            Some(session) => session.sink.try_deliver(frame),
            None => Err(DeliveryError::Closed),
        };

        match result {
            Ok(()) => Ok(()),
            Err(DeliveryError::Closed) => {
                self.slots[slot] = None;
                Err(BridgeError::TransportFailure(id))
            }
            Err(DeliveryError::Dropped) => Err(BridgeError::TransportFailure(id)),
        }
    }
}
