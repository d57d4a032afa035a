//! In-memory board for tests and the hosted demo.
//!
//! [`SimBoard`] is a cloneable handle to one shared board state. Peripheral
//! views handed to the core (`gpio()`, `adc()`, ...) and the handle kept by a
//! test or stimulus generator all observe the same state, so external
//! signals can be injected after the peripherals have been boxed.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::HardwareError;
use crate::hal::{AnalogInput, BusScanner, GpioBank, LinkMonitor, LinkStatus, SerialPort};

/// Receive buffer size of the simulated UART. Older bytes are overwritten.
pub const SERIAL_RX_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct BoardState {
    /// Externally applied levels on pins.
    inputs: HashMap<u8, bool>,
    /// Levels driven by the firmware.
    outputs: HashMap<u8, bool>,
    directions: HashMap<u8, bool>,
    pwm: HashMap<u8, u32>,
    failing_pins: HashSet<u8>,
    adc_raw: u16,
    adc_failing: bool,
    last_adc_channel: Option<u8>,
    serial_rx: VecDeque<u8>,
    serial_tx: Vec<u8>,
    bus_devices: BTreeSet<u8>,
    link: LinkStatus,
}

/// Shared handle to a simulated board.
#[derive(Debug, Clone, Default)]
pub struct SimBoard {
    state: Arc<Mutex<BoardState>>,
}

impl SimBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BoardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------------
    // Peripheral views
    // ------------------------------------------------------------------------

    pub fn gpio(&self) -> SimGpio {
        SimGpio(self.clone())
    }

    pub fn adc(&self) -> SimAdc {
        SimAdc(self.clone())
    }

    pub fn serial(&self) -> SimSerial {
        SimSerial(self.clone())
    }

    pub fn bus(&self) -> SimBus {
        SimBus(self.clone())
    }

    pub fn link(&self) -> SimLink {
        SimLink(self.clone())
    }

    // ------------------------------------------------------------------------
    // Stimulus and inspection
    // ------------------------------------------------------------------------

    /// Apply an external level to a pin.
    pub fn set_input(&self, pin: u8, level: bool) {
        self.lock().inputs.insert(pin, level);
    }

    /// External level currently applied to a pin.
    pub fn input(&self, pin: u8) -> bool {
        self.lock().inputs.get(&pin).copied().unwrap_or(false)
    }

    /// Make every GPIO call on `pin` fail.
    pub fn fail_pin(&self, pin: u8, failing: bool) {
        let mut state = self.lock();
        if failing {
            state.failing_pins.insert(pin);
        } else {
            state.failing_pins.remove(&pin);
        }
    }

    /// Level last driven on `pin`, if the firmware ever drove it.
    pub fn output_level(&self, pin: u8) -> Option<bool> {
        self.lock().outputs.get(&pin).copied()
    }

    pub fn is_output(&self, pin: u8) -> bool {
        self.lock().directions.get(&pin).copied().unwrap_or(false)
    }

    /// PWM frequency last programmed on `pin`.
    pub fn pwm_frequency(&self, pin: u8) -> Option<u32> {
        self.lock().pwm.get(&pin).copied()
    }

    pub fn set_adc_raw(&self, raw: u16) {
        self.lock().adc_raw = raw;
    }

    pub fn fail_adc(&self, failing: bool) {
        self.lock().adc_failing = failing;
    }

    /// Channel of the most recent ADC read.
    pub fn last_adc_channel(&self) -> Option<u8> {
        self.lock().last_adc_channel
    }

    /// Queue bytes as if received on the serial line.
    ///
    /// Past [`SERIAL_RX_CAPACITY`] unread bytes the oldest are dropped.
    pub fn push_serial_rx(&self, bytes: &[u8]) {
        let mut state = self.lock();
        state.serial_rx.extend(bytes.iter().copied());
        let excess = state.serial_rx.len().saturating_sub(SERIAL_RX_CAPACITY);
        state.serial_rx.drain(..excess);
    }

    /// Everything transmitted on the serial line so far.
    pub fn serial_tx(&self) -> Vec<u8> {
        self.lock().serial_tx.clone()
    }

    pub fn attach_bus_device(&self, address: u8) {
        self.lock().bus_devices.insert(address);
    }

    pub fn set_link(&self, link: LinkStatus) {
        self.lock().link = link;
    }
}

/// GPIO view of a [`SimBoard`].
#[derive(Debug, Clone)]
pub struct SimGpio(SimBoard);

impl GpioBank for SimGpio {
    fn set_direction(&mut self, pin: u8, output: bool) -> Result<(), HardwareError> {
        let mut state = self.0.lock();
        if state.failing_pins.contains(&pin) {
            return Err(HardwareError::Configure {
                pin,
                reason: "simulated fault".to_string(),
            });
        }
        state.directions.insert(pin, output);
        state.pwm.remove(&pin);
        Ok(())
    }

    fn read_level(&mut self, pin: u8) -> Result<bool, HardwareError> {
        let state = self.0.lock();
        if state.failing_pins.contains(&pin) {
            return Err(HardwareError::Read {
                pin,
                reason: "simulated fault".to_string(),
            });
        }
        let output = state.directions.get(&pin).copied().unwrap_or(false);
        let level = if output {
            state.outputs.get(&pin).copied()
        } else {
            state.inputs.get(&pin).copied()
        };
        Ok(level.unwrap_or(false))
    }

    fn write_level(&mut self, pin: u8, high: bool) -> Result<(), HardwareError> {
        let mut state = self.0.lock();
        if state.failing_pins.contains(&pin) {
            return Err(HardwareError::Write {
                pin,
                reason: "simulated fault".to_string(),
            });
        }
        state.outputs.insert(pin, high);
        Ok(())
    }

    fn start_pwm(&mut self, pin: u8, frequency_hz: u32) -> Result<(), HardwareError> {
        let mut state = self.0.lock();
        if state.failing_pins.contains(&pin) {
            return Err(HardwareError::Configure {
                pin,
                reason: "simulated fault".to_string(),
            });
        }
        state.directions.insert(pin, true);
        if frequency_hz == 0 {
            state.pwm.remove(&pin);
        } else {
            state.pwm.insert(pin, frequency_hz);
        }
        Ok(())
    }
}

/// ADC view of a [`SimBoard`].
#[derive(Debug, Clone)]
pub struct SimAdc(SimBoard);

impl AnalogInput for SimAdc {
    fn read_raw(&mut self, channel: u8) -> Result<u16, HardwareError> {
        let mut state = self.0.lock();
        state.last_adc_channel = Some(channel);
        if state.adc_failing {
            return Err(HardwareError::Analog {
                channel,
                reason: "simulated fault".to_string(),
            });
        }
        Ok(state.adc_raw)
    }
}

/// Serial view of a [`SimBoard`].
#[derive(Debug, Clone)]
pub struct SimSerial(SimBoard);

impl SerialPort for SimSerial {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize, HardwareError> {
        self.0.lock().serial_tx.extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn read_available(&mut self, limit: usize) -> Result<Vec<u8>, HardwareError> {
        let mut state = self.0.lock();
        let n = limit.min(state.serial_rx.len());
        Ok(state.serial_rx.drain(..n).collect())
    }
}

/// Bus view of a [`SimBoard`].
#[derive(Debug, Clone)]
pub struct SimBus(SimBoard);

impl BusScanner for SimBus {
    fn probe(&mut self, address: u8) -> Result<bool, HardwareError> {
        Ok(self.0.lock().bus_devices.contains(&address))
    }
}

/// Link view of a [`SimBoard`].
#[derive(Debug, Clone)]
pub struct SimLink(SimBoard);

impl LinkMonitor for SimLink {
    fn status(&self) -> LinkStatus {
        self.0.lock().link.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_views_share_state() {
        let board = SimBoard::new();
        let mut gpio = board.gpio();

        board.set_input(4, true);
        assert!(gpio.read_level(4).unwrap());

        gpio.set_direction(5, true).unwrap();
        gpio.write_level(5, true).unwrap();
        assert_eq!(board.output_level(5), Some(true));
        assert!(gpio.read_level(5).unwrap());
    }

    #[test]
    fn test_serial_drain_is_bounded() {
        let board = SimBoard::new();
        let mut serial = board.serial();
        board.push_serial_rx(b"hello world");

        assert_eq!(serial.read_available(5).unwrap(), b"hello");
        assert_eq!(serial.read_available(64).unwrap(), b" world");
        assert!(serial.read_available(64).unwrap().is_empty());
    }

    #[test]
    fn test_serial_rx_keeps_newest_bytes() {
        let board = SimBoard::new();
        let mut serial = board.serial();
        board.push_serial_rx(&[b'a'; SERIAL_RX_CAPACITY]);
        board.push_serial_rx(b"tail");

        let all = serial.read_available(usize::MAX).unwrap();
        assert_eq!(all.len(), SERIAL_RX_CAPACITY);
        assert!(all.ends_with(b"aatail"));
    }

    #[test]
    fn test_pwm_cleared_by_direction_change_or_zero_frequency() {
        let board = SimBoard::new();
        let mut gpio = board.gpio();

        gpio.start_pwm(18, 1000).unwrap();
        gpio.set_direction(18, true).unwrap();
        assert_eq!(board.pwm_frequency(18), None);

        gpio.start_pwm(18, 1000).unwrap();
        gpio.start_pwm(18, 0).unwrap();
        assert_eq!(board.pwm_frequency(18), None);
        assert!(board.is_output(18));
    }

    #[test]
    fn test_bus_scan() {
        let board = SimBoard::new();
        board.attach_bus_device(0x68);
        board.attach_bus_device(0x3C);

        assert_eq!(board.bus().scan(), vec![0x3C, 0x68]);
    }
}
