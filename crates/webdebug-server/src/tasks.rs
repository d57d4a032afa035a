//! Periodic producers.
//!
//! Three independent tokio tasks, each driven by its own interval:
//! - debounce scan of the input pins (snapshot broadcast on change)
//! - analog sampling (analog message every tick)
//! - link status (wifi message every tick)
//!
//! Ticks of one task are strictly sequential. The first tick fires one period
//! after start.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio::time::{interval_at, MissedTickBehavior};
use tracing::{debug, info};

use webdebug_core::{AnalogReading, DebounceEngine, ScanReport};
use webdebug_protocol::{OscilloscopeMessage, ServerMessage};

use crate::state::BridgeState;

/// Run one debounce scan at `now` and broadcast the snapshot if any pin
/// changed.
pub async fn debounce_tick(
    state: &BridgeState,
    engine: &DebounceEngine,
    now: Instant,
) -> ScanReport {
    let report = {
        let mut pins = state.pins.lock().await;
        engine.scan(&mut pins, now)
    };

    if report.changed() {
        debug!("Debounced transitions on {:?}", report.transitions);
        state.broadcast_snapshot().await;
    }
    report
}

/// Take one analog sample and broadcast the reading.
///
/// A failed read is logged by the sampler; the previous value is published.
pub async fn oscilloscope_tick(state: &BridgeState) -> AnalogReading {
    let reading = state.analog.lock().await.tick();
    let msg = ServerMessage::Oscilloscope(OscilloscopeMessage::from(reading));
    state.fanout.broadcast(&msg).await;
    reading
}

/// Broadcast the current link status.
pub async fn link_status_tick(state: &BridgeState) {
    let msg = ServerMessage::Wifi(state.wifi_message());
    state.fanout.broadcast(&msg).await;
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Handles of the running periodic tasks. Dropping it stops them.
#[derive(Debug)]
pub struct PeriodicTasks {
    pub debounce: JoinHandle<()>,
    pub oscilloscope: JoinHandle<()>,
    pub link_status: JoinHandle<()>,
}

impl PeriodicTasks {
    pub fn abort(&self) {
        self.debounce.abort();
        self.oscilloscope.abort();
        self.link_status.abort();
    }
}

impl Drop for PeriodicTasks {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Spawn the periodic producers on the current runtime.
pub fn spawn_periodic_tasks(state: Arc<BridgeState>) -> PeriodicTasks {
    let settings = &state.settings;
    info!(
        "Starting periodic tasks: debounce {:?} (window {:?}), oscilloscope {:?}, link status {:?}",
        settings.debounce_period(),
        settings.debounce_window(),
        settings.oscilloscope_period(),
        settings.link_status_period()
    );

    let debounce = {
        let state = state.clone();
        let engine = DebounceEngine::new(state.settings.debounce_window());
        let mut interval = ticker(state.settings.debounce_period());
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                debounce_tick(&state, &engine, Instant::now()).await;
            }
        })
    };

    let oscilloscope = {
        let state = state.clone();
        let mut interval = ticker(state.settings.oscilloscope_period());
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                oscilloscope_tick(&state).await;
            }
        })
    };

    let link_status = {
        let state = state.clone();
        let mut interval = ticker(state.settings.link_status_period());
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                link_status_tick(&state).await;
            }
        })
    };

    PeriodicTasks {
        debounce,
        oscilloscope,
        link_status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use webdebug_core::{BridgeSettings, LinkStatus, SessionId, SimBoard};

    use crate::fanout::SessionOutbox;

    async fn setup(
        settings: BridgeSettings,
    ) -> (SimBoard, Arc<BridgeState>, mpsc::Receiver<String>) {
        let board = SimBoard::new();
        let state = Arc::new(BridgeState::simulated(settings, &board).unwrap());
        let (tx, mut rx) = mpsc::channel(64);
        state
            .attach_session(SessionId::new(1), SessionOutbox::new(tx))
            .await
            .unwrap();
        rx.recv().await.unwrap();
        (board, state, rx)
    }

    #[tokio::test]
    async fn test_debounce_tick_broadcasts_on_change_only() {
        let (board, state, mut rx) = setup(BridgeSettings::default()).await;
        let engine = DebounceEngine::default();
        let t0 = Instant::now();

        assert!(!debounce_tick(&state, &engine, t0).await.changed());
        assert!(rx.try_recv().is_err());

        board.set_input(12, true);
        let report = debounce_tick(&state, &engine, t0 + Duration::from_millis(50)).await;
        assert_eq!(report.transitions, vec![12]);

        let snapshot: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        let entry = snapshot
            .as_array()
            .unwrap()
            .iter()
            .find(|e| e["pin"] == 12)
            .unwrap();
        assert_eq!(entry["state"], 1);
        assert_eq!(entry["bounce"], 1);
    }

    #[tokio::test]
    async fn test_oscilloscope_tick_label_change() {
        let (board, state, mut rx) = setup(BridgeSettings::default()).await;
        board.set_adc_raw(4095);

        oscilloscope_tick(&state).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"oscilloscope":{"pin":34,"voltage":0.99}}"#
        );

        for _ in 0..40 {
            oscilloscope_tick(&state).await;
            rx.recv().await.unwrap();
        }
        state.analog.lock().await.set_target_channel(3);
        oscilloscope_tick(&state).await;
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"oscilloscope":{"pin":3,"voltage":3.3}}"#
        );
    }

    #[tokio::test]
    async fn test_oscilloscope_tick_survives_adc_failure() {
        let (board, state, mut rx) = setup(BridgeSettings::default()).await;
        board.set_adc_raw(4095);
        oscilloscope_tick(&state).await;
        rx.recv().await.unwrap();

        board.fail_adc(true);
        let reading = oscilloscope_tick(&state).await;
        assert!((reading.smoothed_voltage - 0.99).abs() < 1e-5);
        assert_eq!(
            rx.recv().await.unwrap(),
            r#"{"oscilloscope":{"pin":34,"voltage":0.99}}"#
        );
    }

    #[tokio::test]
    async fn test_link_status_tick() {
        let (board, state, mut rx) = setup(BridgeSettings::default()).await;
        board.set_link(LinkStatus {
            connected_stations: 1,
            sta_connected: false,
            rssi: -70,
        });

        link_status_tick(&state).await;

        let msg: serde_json::Value = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(msg["wifi"]["ap"]["connected_stations"], 1);
        assert_eq!(msg["wifi"]["sta"]["connected"], false);
        assert_eq!(msg["wifi"]["sta"]["rssi"], 0);
    }

    #[tokio::test]
    async fn test_spawned_tasks_produce_frames() {
        let settings = BridgeSettings {
            oscilloscope_period_ms: 20,
            debounce_period_ms: 10,
            ..Default::default()
        };
        let (board, state, mut rx) = setup(settings).await;
        let tasks = spawn_periodic_tasks(state.clone());

        board.set_input(33, true);
        let mut saw_snapshot = false;
        let mut saw_analog = false;
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !(saw_snapshot && saw_analog) {
            let frame = tokio::time::timeout_at(deadline, rx.recv())
                .await
                .expect("periodic frames")
                .unwrap();
            saw_snapshot |= frame.starts_with('[');
            saw_analog |= frame.starts_with(r#"{"oscilloscope""#);
        }

        tasks.abort();
    }

    #[tokio::test]
    async fn test_dropping_handles_stops_tasks() {
        let board = SimBoard::new();
        let state = Arc::new(BridgeState::simulated(BridgeSettings::default(), &board).unwrap());

        let tasks = spawn_periodic_tasks(state.clone());
        assert_eq!(Arc::strong_count(&state), 4);

        drop(tasks);
        tokio::time::timeout(Duration::from_secs(5), async {
            while Arc::strong_count(&state) > 1 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("periodic tasks release the state once stopped");
    }
}
