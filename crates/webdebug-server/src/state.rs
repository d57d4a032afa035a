//! Shared bridge state.
//!
//! One [`BridgeState`] is shared (behind an `Arc`) by the connection handlers,
//! the periodic tasks and the HTTP API. Each table has its own lock; no code
//! path holds more than one of them except session attach, which takes the
//! pin table before the session table.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{info, warn};

use webdebug_core::{
    AnalogInput, AnalogReading, AnalogSampler, BridgeError, BridgeSettings, BusScanner,
    ConfigError, FrameSink, GpioBank, HardwareError, LinkMonitor, LinkStatus, PinRecord,
    PinRegistry, PinStateStore, SerialPort, SessionId, SimBoard,
};
use webdebug_protocol::{encode_server_message, ServerMessage, WifiMessage};

use crate::fanout::{Fanout, SessionOutbox};

/// The platform peripherals the bridge drives.
pub struct Peripherals {
    pub gpio: Box<dyn GpioBank>,
    pub adc: Box<dyn AnalogInput>,
    pub serial: Box<dyn SerialPort>,
    pub bus: Box<dyn BusScanner>,
    pub link: Box<dyn LinkMonitor>,
}

impl Peripherals {
    /// Peripherals backed by a simulated board.
    pub fn simulated(board: &SimBoard) -> Self {
        Self {
            gpio: Box::new(board.gpio()),
            adc: Box::new(board.adc()),
            serial: Box::new(board.serial()),
            bus: Box::new(board.bus()),
            link: Box::new(board.link()),
        }
    }
}

/// Failure to build the shared state.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid settings: {0}")]
    Settings(#[from] ConfigError),

    #[error(transparent)]
    Hardware(#[from] HardwareError),
}

/// State shared by every flow of the bridge.
pub struct BridgeState {
    pub settings: BridgeSettings,
    pub pins: Mutex<PinStateStore>,
    pub analog: Mutex<AnalogSampler>,
    pub serial: Mutex<Box<dyn SerialPort>>,
    /// Shared so a scan can run on the blocking pool while holding the lock.
    pub bus: Arc<Mutex<Box<dyn BusScanner>>>,
    pub link: Box<dyn LinkMonitor>,
    pub fanout: Fanout,
}

impl BridgeState {
    /// Validate the settings, configure every pin as an input and build the
    /// shared tables.
    pub fn new(settings: BridgeSettings, peripherals: Peripherals) -> Result<Self, StateError> {
        settings.validate()?;

        let Peripherals {
            gpio,
            adc,
            serial,
            bus,
            link,
        } = peripherals;

        let pins = PinStateStore::new(PinRegistry::default(), gpio)?;
        info!("Pin store initialized with {} pins", pins.len());

        let analog = AnalogSampler::new(
            adc,
            settings.sample_channel,
            settings.adc_scale(),
            settings.smoothing_factor,
            settings.initial_target_channel,
        );

        Ok(Self {
            fanout: Fanout::new(settings.max_sessions),
            pins: Mutex::new(pins),
            analog: Mutex::new(analog),
            serial: Mutex::new(serial),
            bus: Arc::new(Mutex::new(bus)),
            link,
            settings,
        })
    }

    /// Shared state over a simulated board.
    pub fn simulated(settings: BridgeSettings, board: &SimBoard) -> Result<Self, StateError> {
        Self::new(settings, Peripherals::simulated(board))
    }

    // ------------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------------

    pub async fn snapshot(&self) -> Vec<PinRecord> {
        self.pins.lock().await.snapshot_all()
    }

    pub async fn compact_states(&self) -> String {
        self.pins.lock().await.compact_states()
    }

    pub async fn analog_reading(&self) -> AnalogReading {
        self.analog.lock().await.reading()
    }

    pub fn link_status(&self) -> LinkStatus {
        self.link.status()
    }

    pub fn wifi_message(&self) -> WifiMessage {
        WifiMessage::new(&self.settings.ap_ssid, &self.link_status())
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    /// Register a session and queue the current pin snapshot as its first
    /// frame.
    ///
    /// The pin table stays locked until the session is registered, so
    /// any later pin change is broadcast to the new session as well.
    pub async fn attach_session(
        &self,
        id: SessionId,
        outbox: SessionOutbox,
    ) -> Result<usize, BridgeError> {
        let pins = self.pins.lock().await;
        let msg = ServerMessage::snapshot(&pins.snapshot_all());
        match encode_server_message(&msg) {
            Ok(frame) => {
                if let Err(e) = outbox.try_deliver(&frame) {
                    warn!("Initial snapshot for session {} not queued: {}", id, e);
                }
            }
            Err(e) => warn!("Failed to encode initial snapshot: {}", e),
        }
        let slot = self.fanout.register(id, outbox).await?;
        drop(pins);
        Ok(slot)
    }

    pub async fn detach_session(&self, id: SessionId) -> bool {
        self.fanout.unregister(id).await
    }

    /// Broadcast the full pin snapshot to every session.
    pub async fn broadcast_snapshot(&self) {
        let msg = ServerMessage::snapshot(&self.snapshot().await);
        self.fanout.broadcast(&msg).await;
    }
}

impl std::fmt::Debug for BridgeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BridgeState")
            .field("settings", &self.settings)
            .field("fanout", &self.fanout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn state(board: &SimBoard) -> BridgeState {
        let settings = BridgeSettings {
            max_sessions: 2,
            ..Default::default()
        };
        BridgeState::simulated(settings, board).unwrap()
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let board = SimBoard::new();
        let settings = BridgeSettings {
            session_queue_depth: 0,
            ..Default::default()
        };

        let err = BridgeState::simulated(settings, &board).unwrap_err();
        assert!(matches!(err, StateError::Settings(ConfigError::InvalidData(_))));
    }

    #[test]
    fn test_pin_fault_at_startup() {
        let board = SimBoard::new();
        board.fail_pin(4, true);

        let err = BridgeState::simulated(BridgeSettings::default(), &board).unwrap_err();
        assert!(matches!(
            err,
            StateError::Hardware(HardwareError::Configure { pin: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_attach_queues_snapshot_first() {
        let board = SimBoard::new();
        board.set_input(4, true);
        let state = state(&board);
        let (tx, mut rx) = mpsc::channel(4);

        state
            .attach_session(SessionId::new(1), SessionOutbox::new(tx))
            .await
            .unwrap();

        let first: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let entries = first.as_array().unwrap();
        assert_eq!(entries.len(), 24);
        assert_eq!(entries[2]["pin"], 4);
        assert_eq!(entries[2]["state"], 1);
    }

    #[tokio::test]
    async fn test_attach_rejects_when_full() {
        let board = SimBoard::new();
        let state = state(&board);
        let mut receivers = Vec::new();
        for n in 0..2 {
            let (tx, rx) = mpsc::channel(4);
            receivers.push(rx);
            state
                .attach_session(SessionId::new(n), SessionOutbox::new(tx))
                .await
                .unwrap();
        }

        let (tx, _rx) = mpsc::channel(4);
        let err = state
            .attach_session(SessionId::new(9), SessionOutbox::new(tx))
            .await
            .unwrap_err();
        assert_eq!(err, BridgeError::RegistryFull { capacity: 2 });

        assert!(state.detach_session(SessionId::new(0)).await);
        let (tx, _rx) = mpsc::channel(4);
        assert_eq!(
            state
                .attach_session(SessionId::new(9), SessionOutbox::new(tx))
                .await,
            Ok(0)
        );
    }

    #[tokio::test]
    async fn test_wifi_message_uses_configured_ssid() {
        let board = SimBoard::new();
        board.set_link(LinkStatus {
            connected_stations: 3,
            sta_connected: true,
            rssi: -40,
        });
        let state = state(&board);

        let msg = state.wifi_message();
        assert_eq!(msg.wifi.ap.ssid, "ESP32-Debugger");
        assert_eq!(msg.wifi.ap.connected_stations, 3);
        assert_eq!(msg.wifi.sta.rssi, -40);
    }
}
