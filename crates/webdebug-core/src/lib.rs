//! # webdebug-core
//!
//! Hardware-state synchronization core for the webdebug firmware.
//!
//! This crate provides:
//! - The static pin registry and the per-pin state store
//! - Debouncing of input pins and exponential smoothing of the analog channel
//! - The fixed-capacity session registry with best-effort broadcast
//! - Peripheral traits the platform layer implements, plus a simulated board
//! - Configuration types and the storage abstraction
//!
//! This crate is intentionally runtime-agnostic and contains no async code,
//! making it usable on both Linux (tokio) and ESP32 (esp-idf) targets.

pub mod analog;
pub mod config;
pub mod debounce;
pub mod error;
pub mod hal;
pub mod pins;
pub mod registry;
pub mod session;
pub mod sim;

pub use analog::{AdcScale, AnalogReading, AnalogSampler, ExponentialFilter};
pub use config::{BridgeSettings, ConfigError, ConfigStorage};
pub use debounce::{DebounceEngine, ScanReport};
pub use error::{BridgeError, HardwareError};
pub use hal::{AnalogInput, BusScanner, GpioBank, LinkMonitor, LinkStatus, SerialPort};
pub use pins::{DebouncePhase, PinMode, PinRecord, PinStateStore};
pub use registry::{PinRegistry, USABLE_PINS};
pub use session::{BroadcastReport, DeliveryError, FrameSink, SessionId, SessionRegistry};
pub use sim::{SERIAL_RX_CAPACITY, SimAdc, SimBoard, SimBus, SimGpio, SimLink, SimSerial};
