//! Pin state store.
//!
//! The store keeps one [`PinRecord`] per registered pin and is the only place
//! where records are mutated. Output pins are authoritative in the store: a
//! read returns the last commanded level, not a fresh hardware read. Input
//! pins reflect the last level accepted by the debounce engine.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, HardwareError};
use crate::hal::GpioBank;
use crate::registry::PinRegistry;

/// Direction of a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PinMode {
    Input,
    Output,
}

/// Where an input sits relative to its debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebouncePhase {
    /// No transition accepted within the window; the next change is accepted.
    Stable,
    /// A transition was accepted at `since` and the window has not elapsed yet.
    Settling { since: Instant },
}

/// Mutable state of one addressable pin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinRecord {
    /// Physical pin identifier exposed to clients.
    pub logical_id: u8,
    pub mode: PinMode,
    /// Last commanded level (output) or last debounced level (input).
    pub level: bool,
    /// PWM frequency in Hz, 0 when the pin is not driving PWM.
    pub pwm_frequency: u32,
    /// Accepted level transitions since boot.
    pub change_count: u32,
    /// Monotonic time of the last accepted transition.
    pub last_change_at: Option<Instant>,
}

impl PinRecord {
    fn new(logical_id: u8, level: bool) -> Self {
        Self {
            logical_id,
            mode: PinMode::Input,
            level,
            pwm_frequency: 0,
            change_count: 0,
            last_change_at: None,
        }
    }

    pub fn is_output(&self) -> bool {
        self.mode == PinMode::Output
    }

    /// True when the pin is an output currently driven by the PWM generator.
    pub fn is_pwm(&self) -> bool {
        self.is_output() && self.pwm_frequency > 0
    }

    /// Debounce phase at `now` for a window of `window`.
    pub fn debounce_phase(&self, now: Instant, window: Duration) -> DebouncePhase {
        match self.last_change_at {
            Some(since) if now.saturating_duration_since(since) <= window => {
                DebouncePhase::Settling { since }
            }
            _ => DebouncePhase::Stable,
        }
    }

    fn record_transition(&mut self, level: bool, now: Instant) {
        self.level = level;
        self.change_count = self.change_count.wrapping_add(1);
        self.last_change_at = Some(now);
    }
}

/// Owner of all pin records and of the GPIO peripheral.
pub struct PinStateStore {
    registry: PinRegistry,
    records: Vec<PinRecord>,
    gpio: Box<dyn GpioBank>,
}

impl PinStateStore {
    /// Configure every registered pin as an input and capture its initial level.
    pub fn new(registry: PinRegistry, mut gpio: Box<dyn GpioBank>) -> Result<Self, HardwareError> {
        let mut records = Vec::with_capacity(registry.len());
        for &pin in registry.pins() {
            gpio.set_direction(pin, false)?;
            let level = gpio.read_level(pin)?;
            records.push(PinRecord::new(pin, level));
        }

        Ok(Self {
            registry,
            records,
            gpio,
        })
    }

    pub fn registry(&self) -> &PinRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn index(&self, pin: i32) -> Result<usize, BridgeError> {
        self.registry
            .index_of(pin)
            .ok_or(BridgeError::InvalidPin(pin))
    }

    /// Switch a pin between input and output.
    ///
    /// Always clears PWM. The stored level is left untouched.
    pub fn set_mode(&mut self, pin: i32, output: bool) -> Result<(), BridgeError> {
        let idx = self.index(pin)?;
        let record = &mut self.records[idx];

        if record.pwm_frequency > 0 {
            self.gpio.start_pwm(record.logical_id, 0)?;
            record.pwm_frequency = 0;
        }
        self.gpio.set_direction(record.logical_id, output)?;
        record.mode = if output {
            PinMode::Output
        } else {
            PinMode::Input
        };
        record.pwm_frequency = 0;
        Ok(())
    }

    /// Drive an output pin.
    ///
    /// # Errors
    ///
    /// `InvalidPin` for an unknown id, `NotOutput` if the pin is an input. In
    /// both cases the record is unchanged.
    pub fn write(&mut self, pin: i32, value: bool) -> Result<(), BridgeError> {
        let idx = self.index(pin)?;
        let record = &mut self.records[idx];

        if !record.is_output() {
            return Err(BridgeError::NotOutput(record.logical_id));
        }

        self.gpio.write_level(record.logical_id, value)?;
        record.record_transition(value, Instant::now());
        Ok(())
    }

    /// Stored level of a pin.
    pub fn read(&self, pin: i32) -> Result<bool, BridgeError> {
        let idx = self.index(pin)?;
        Ok(self.records[idx].level)
    }

    /// Start (or with 0 Hz, stop) PWM on a pin, forcing it into output mode.
    pub fn configure_pwm(&mut self, pin: i32, frequency_hz: u32) -> Result<(), BridgeError> {
        let idx = self.index(pin)?;
        let record = &mut self.records[idx];

        self.gpio.start_pwm(record.logical_id, frequency_hz)?;
        record.mode = PinMode::Output;
        record.pwm_frequency = frequency_hz;
        Ok(())
    }

    pub fn record(&self, pin: i32) -> Result<&PinRecord, BridgeError> {
        let idx = self.index(pin)?;
        Ok(&self.records[idx])
    }

    pub fn mode(&self, pin: i32) -> Result<PinMode, BridgeError> {
        self.record(pin).map(|r| r.mode)
    }

    pub fn pwm_frequency(&self, pin: i32) -> Result<u32, BridgeError> {
        self.record(pin).map(|r| r.pwm_frequency)
    }

    pub fn change_count(&self, pin: i32) -> Result<u32, BridgeError> {
        self.record(pin).map(|r| r.change_count)
    }

    /// Copy of every record in registry order.
    ///
    /// Callers hold the store exclusively (or behind a lock) while this runs,
    /// so the copy reflects a single instant.
    pub fn snapshot_all(&self) -> Vec<PinRecord> {
        self.records.clone()
    }

    /// Compact `"<pin>:<0|1>;"` listing of every pin level.
    pub fn compact_states(&self) -> String {
        let mut out = String::with_capacity(self.records.len() * 6);
        for record in &self.records {
            let _ = write!(out, "{}:{};", record.logical_id, u8::from(record.level));
        }
        out
    }

    // ------------------------------------------------------------------------
    // Debounce engine hooks
    // ------------------------------------------------------------------------

    pub(crate) fn record_at(&self, index: usize) -> &PinRecord {
        &self.records[index]
    }

    /// Raw hardware level of the pin at `index`, bypassing the stored level.
    pub(crate) fn sample_raw(&mut self, index: usize) -> Result<bool, HardwareError> {
        let pin = self.records[index].logical_id;
        self.gpio.read_level(pin)
    }

    /// Accept a debounced input transition. Ignored for output pins.
    pub(crate) fn commit_input_level(&mut self, index: usize, level: bool, now: Instant) -> bool {
        let record = &mut self.records[index];
        if record.is_output() || record.level == level {
            return false;
        }
        record.record_transition(level, now);
        true
    }
}

impl std::fmt::Debug for PinStateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinStateStore")
            .field("registry", &self.registry)
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimBoard;
    use pretty_assertions::assert_eq;

    fn store_with_board() -> (PinStateStore, SimBoard) {
        let board = SimBoard::new();
        board.set_input(4, true);
        let store = PinStateStore::new(PinRegistry::esp32(), Box::new(board.gpio())).unwrap();
        (store, board)
    }

    #[test]
    fn test_initial_records() {
        let (store, board) = store_with_board();

        assert_eq!(store.len(), 24);
        let snapshot = store.snapshot_all();
        assert!(snapshot.iter().all(|r| r.mode == PinMode::Input));
        assert!(snapshot.iter().all(|r| r.pwm_frequency == 0 && r.change_count == 0));
        assert!(store.read(4).unwrap(), "initial level comes from a raw read");
        assert!(!store.read(5).unwrap());
        assert!(!board.is_output(5));
    }

    #[test]
    fn test_write_output_pin() {
        let (mut store, board) = store_with_board();
        store.set_mode(5, true).unwrap();

        for (i, value) in [true, false, true].into_iter().enumerate() {
            store.write(5, value).unwrap();
            assert_eq!(store.read(5).unwrap(), value);
            assert_eq!(store.change_count(5).unwrap(), i as u32 + 1);
            assert_eq!(board.output_level(5), Some(value));
        }
        assert!(store.record(5).unwrap().last_change_at.is_some());
    }

    #[test]
    fn test_write_input_pin_rejected() {
        let (mut store, board) = store_with_board();
        let before = store.record(4).unwrap().clone();

        let err = store.write(4, false).unwrap_err();
        assert_eq!(err, BridgeError::NotOutput(4));
        assert_eq!(store.record(4).unwrap(), &before);
        assert_eq!(board.output_level(4), None);
    }

    #[test]
    fn test_invalid_pin() {
        let (mut store, _board) = store_with_board();

        assert_eq!(store.set_mode(1, true), Err(BridgeError::InvalidPin(1)));
        assert_eq!(store.write(-3, true), Err(BridgeError::InvalidPin(-3)));
        assert_eq!(store.read(40), Err(BridgeError::InvalidPin(40)));
        assert_eq!(store.configure_pwm(7, 1000), Err(BridgeError::InvalidPin(7)));
    }

    #[test]
    fn test_set_mode_clears_pwm_keeps_level() {
        let (mut store, _board) = store_with_board();
        store.set_mode(5, true).unwrap();
        store.write(5, true).unwrap();
        store.configure_pwm(5, 1000).unwrap();
        assert!(store.record(5).unwrap().is_pwm());

        store.set_mode(5, false).unwrap();
        let record = store.record(5).unwrap();
        assert_eq!(record.mode, PinMode::Input);
        assert_eq!(record.pwm_frequency, 0);
        assert!(record.level);
    }

    #[test]
    fn test_set_mode_stops_pwm_generator() {
        let (mut store, board) = store_with_board();
        store.configure_pwm(18, 1000).unwrap();
        assert_eq!(board.pwm_frequency(18), Some(1000));

        store.set_mode(18, true).unwrap();
        assert_eq!(store.pwm_frequency(18).unwrap(), 0);
        assert_eq!(board.pwm_frequency(18), None);
        assert!(board.is_output(18));

        store.configure_pwm(19, 2000).unwrap();
        store.set_mode(19, false).unwrap();
        assert_eq!(board.pwm_frequency(19), None);
        assert!(!board.is_output(19));
    }

    #[test]
    fn test_pwm_forces_output() {
        let (mut store, board) = store_with_board();

        store.configure_pwm(18, 5000).unwrap();
        assert_eq!(store.mode(18).unwrap(), PinMode::Output);
        assert_eq!(store.pwm_frequency(18).unwrap(), 5000);
        assert_eq!(board.pwm_frequency(18), Some(5000));
    }

    #[test]
    fn test_zero_frequency_pwm_is_plain_output() {
        let (mut store, _board) = store_with_board();

        store.set_mode(18, true).unwrap();
        store.configure_pwm(18, 0).unwrap();

        let record = store.record(18).unwrap();
        assert_eq!(record.mode, PinMode::Output);
        assert_eq!(record.pwm_frequency, 0);
        assert!(!record.is_pwm());
    }

    #[test]
    fn test_pwm_invariant_holds_across_operations() {
        let (mut store, _board) = store_with_board();
        store.configure_pwm(21, 440).unwrap();
        store.set_mode(21, false).unwrap();
        store.configure_pwm(22, 880).unwrap();

        for record in store.snapshot_all() {
            if record.pwm_frequency > 0 {
                assert_eq!(record.mode, PinMode::Output, "GPIO{}", record.logical_id);
            }
        }
    }

    #[test]
    fn test_hardware_failure_leaves_record_unchanged() {
        let (mut store, board) = store_with_board();
        store.set_mode(5, true).unwrap();
        board.fail_pin(5, true);

        let err = store.write(5, true).unwrap_err();
        assert!(matches!(err, BridgeError::Hardware(HardwareError::Write { pin: 5, .. })));
        assert!(!store.read(5).unwrap());
        assert_eq!(store.change_count(5).unwrap(), 0);
    }

    #[test]
    fn test_compact_states() {
        let (mut store, _board) = store_with_board();
        store.set_mode(0, true).unwrap();
        store.write(0, true).unwrap();

        let compact = store.compact_states();
        assert!(compact.starts_with("0:1;2:0;4:1;5:0;"));
        assert!(compact.ends_with("39:0;"));
        assert_eq!(compact.matches(';').count(), 24);
    }

    #[test]
    fn test_debounce_phase() {
        let mut record = PinRecord::new(4, false);
        let t0 = Instant::now();
        let window = Duration::from_millis(20);

        assert_eq!(record.debounce_phase(t0, window), DebouncePhase::Stable);

        record.record_transition(true, t0);
        assert_eq!(
            record.debounce_phase(t0 + Duration::from_millis(10), window),
            DebouncePhase::Settling { since: t0 }
        );
        assert_eq!(
            record.debounce_phase(t0 + Duration::from_millis(20), window),
            DebouncePhase::Settling { since: t0 }
        );
        assert_eq!(
            record.debounce_phase(t0 + Duration::from_millis(21), window),
            DebouncePhase::Stable
        );
    }
}
