//! ESP-IDF adapters for the webdebug bridge.
//!
//! This crate implements the `webdebug-core` peripheral traits on top of the
//! ESP-IDF drivers:
//! - GPIO and LEDC PWM ([`gpio::EspGpio`])
//! - ADC1 one-shot sampling ([`adc::EspAdc`])
//! - UART ([`serial::EspUart`])
//! - I2C master bus scan ([`bus::EspI2c`])
//! - Soft-AP / station link status ([`link::EspLink`])
//! - Settings in NVS ([`config::NvsConfigStorage`])
//!
//! It is built only with the ESP32 toolchain and is excluded from the default
//! workspace members.
//!
//! # Example
//!
//! ```ignore
//! use esp_idf_hal::peripherals::Peripherals;
//! use webdebug_core::{PinRegistry, PinStateStore};
//! use webdebug_esp32::{bus::EspI2c, gpio::EspGpio, serial::EspUart};
//!
//! let p = Peripherals::take()?;
//! let pins = PinStateStore::new(PinRegistry::esp32(), Box::new(EspGpio::new()))?;
//! let bus = EspI2c::new(p.i2c0, p.pins.gpio21, p.pins.gpio22)?;
//! let uart = EspUart::new(p.uart1, p.pins.gpio17, p.pins.gpio16)?;
//! ```

pub mod adc;
pub mod bus;
pub mod config;
pub mod gpio;
pub mod link;
pub mod serial;

use esp_idf_hal::delay::TickType;
use esp_idf_svc::sys;

/// Convert milliseconds to FreeRTOS ticks.
pub(crate) fn ms_to_ticks(ms: u32) -> sys::TickType_t {
    TickType::new_millis(u64::from(ms)).ticks()
}

/// Render an ESP-IDF error code.
pub(crate) fn esp_reason(code: sys::esp_err_t) -> String {
    match sys::EspError::from(code) {
        Some(e) => e.to_string(),
        None => "ESP_OK".to_string(),
    }
}
