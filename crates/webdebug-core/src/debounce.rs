//! Debouncing of input pins.
//!
//! The engine is driven by a periodic scheduler. Each [`DebounceEngine::scan`]
//! polls every input pin once and accepts a raw level change only when the
//! pin is [`DebouncePhase::Stable`], i.e. no transition was accepted on it
//! within the debounce window. Times are `Instant`s from one monotonic clock.

use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::pins::{DebouncePhase, PinStateStore};

/// Default debounce window.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(20);

/// Default scan period.
pub const DEFAULT_PERIOD: Duration = Duration::from_millis(50);

/// Outcome of one scan over the input pins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Logical ids of the pins whose debounced level changed.
    pub transitions: Vec<u8>,
    /// Pins whose raw read failed and were skipped this tick.
    pub read_failures: usize,
}

impl ScanReport {
    /// Whether a full snapshot broadcast is due.
    pub fn changed(&self) -> bool {
        !self.transitions.is_empty()
    }
}

/// Debounce policy over the input pins of a [`PinStateStore`].
#[derive(Debug, Clone, Copy)]
pub struct DebounceEngine {
    window: Duration,
}

impl DebounceEngine {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Poll every input pin once at time `now`.
    ///
    /// Output pins are skipped. A failed raw read is treated as "no change"
    /// for that pin and does not stop the scan.
    pub fn scan(&self, store: &mut PinStateStore, now: Instant) -> ScanReport {
        let mut report = ScanReport::default();

        for index in 0..store.len() {
            let record = store.record_at(index);
            if record.is_output() {
                continue;
            }
            let pin = record.logical_id;
            let stored = record.level;
            let phase = record.debounce_phase(now, self.window);

            let raw = match store.sample_raw(index) {
                Ok(level) => level,
                Err(e) => {
                    warn!("Skipping GPIO{} this tick: {}", pin, e);
                    report.read_failures += 1;
                    continue;
                }
            };

            if raw == stored {
                continue;
            }

            match phase {
                DebouncePhase::Stable => {
                    if store.commit_input_level(index, raw, now) {
                        report.transitions.push(pin);
                    }
                }
                DebouncePhase::Settling { .. } => {
                    debug!("GPIO{} bounced inside the debounce window", pin);
                }
            }
        }

        report
    }
}

impl Default for DebounceEngine {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}
