//! Peripheral abstraction.
//!
//! These traits are the raw read/write primitives the core relies on. They
//! are implemented differently on each platform:
//! - ESP32: thin wrappers over ESP-IDF drivers (`webdebug-esp32`)
//! - Linux / tests: the in-memory board in [`crate::sim`]
//!
//! All methods are synchronous and expected to complete quickly.

use std::ops::RangeInclusive;

use crate::error::HardwareError;

/// Digital I/O and PWM for the addressable pins.
pub trait GpioBank: Send {
    /// Reconfigure a pin as output (`true`) or input (`false`).
    ///
    /// The pin is plain GPIO afterwards: a PWM generator routed to it is
    /// detached.
    fn set_direction(&mut self, pin: u8, output: bool) -> Result<(), HardwareError>;

    /// Read the current raw level of a pin.
    fn read_level(&mut self, pin: u8) -> Result<bool, HardwareError>;

    /// Drive an output pin high or low.
    fn write_level(&mut self, pin: u8, high: bool) -> Result<(), HardwareError>;

    /// Route the PWM generator to `pin` at `frequency_hz` with a fixed ~50% duty.
    ///
    /// A frequency of 0 stops the generator on that pin.
    fn start_pwm(&mut self, pin: u8, frequency_hz: u32) -> Result<(), HardwareError>;
}

/// One-shot analog sampling.
pub trait AnalogInput: Send {
    /// Acquire one raw sample from `channel`.
    fn read_raw(&mut self, channel: u8) -> Result<u16, HardwareError>;
}

/// Byte-oriented serial port.
pub trait SerialPort: Send {
    /// Queue `bytes` for transmission, returning how many were accepted.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize, HardwareError>;

    /// Drain up to `limit` bytes that are already buffered.
    fn read_available(&mut self, limit: usize) -> Result<Vec<u8>, HardwareError>;
}

/// 7-bit addresses probed by a bus scan.
pub const BUS_ADDRESS_RANGE: RangeInclusive<u8> = 1..=126;

/// Two-wire bus master able to probe for devices.
pub trait BusScanner: Send {
    /// Address a device and report whether it acknowledged.
    fn probe(&mut self, address: u8) -> Result<bool, HardwareError>;

    /// Probe every address in [`BUS_ADDRESS_RANGE`] and return the ones that answered.
    ///
    /// A failed probe counts as "no device".
    fn scan(&mut self) -> Vec<u8> {
        BUS_ADDRESS_RANGE
            .filter(|&address| self.probe(address).unwrap_or(false))
            .collect()
    }
}

/// Summary of the network link, as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LinkStatus {
    /// Stations associated with the local access point.
    pub connected_stations: u32,
    /// Whether the station interface is associated upstream.
    pub sta_connected: bool,
    /// Upstream signal strength in dBm (0 when not associated).
    pub rssi: i32,
}

/// Source of [`LinkStatus`] snapshots.
pub trait LinkMonitor: Send + Sync {
    fn status(&self) -> LinkStatus;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedBus(Vec<u8>);

    impl BusScanner for FixedBus {
        fn probe(&mut self, address: u8) -> Result<bool, HardwareError> {
            if address == 0x50 {
                return Err(HardwareError::Bus("timeout".to_string()));
            }
            Ok(self.0.contains(&address))
        }
    }

    #[test]
    fn test_default_scan_skips_failed_probes() {
        let mut bus = FixedBus(vec![0x3C, 0x50, 0x68]);
        assert_eq!(bus.scan(), vec![0x3C, 0x68]);
    }

    #[test]
    fn test_scan_range_excludes_reserved_ends() {
        let mut bus = FixedBus(vec![0, 127, 1, 126]);
        assert_eq!(bus.scan(), vec![1, 126]);
    }
}
