//! I2C master bus probing.

use esp_idf_hal::gpio::{InputPin, OutputPin};
use esp_idf_hal::i2c::{I2c, I2cConfig, I2cDriver};
use esp_idf_hal::peripheral::Peripheral;
use esp_idf_hal::prelude::*;
use esp_idf_svc::sys;
use log::{debug, info};
use webdebug_core::{BusScanner, HardwareError};

use crate::ms_to_ticks;

const BUS_CLOCK_HZ: u32 = 100_000;
const PROBE_TIMEOUT_MS: u32 = 20;

/// I2C master driver used for address scans.
pub struct EspI2c {
    driver: I2cDriver<'static>,
}

impl EspI2c {
    pub fn new<I: I2c>(
        i2c: impl Peripheral<P = I> + 'static,
        sda: impl Peripheral<P = impl InputPin + OutputPin> + 'static,
        scl: impl Peripheral<P = impl InputPin + OutputPin> + 'static,
    ) -> anyhow::Result<Self> {
        let config = I2cConfig::new().baudrate(Hertz(BUS_CLOCK_HZ));
        let driver = I2cDriver::new(i2c, sda, scl, &config)?;
        info!("I2C master ready at {}Hz", BUS_CLOCK_HZ);
        Ok(Self { driver })
    }
}

impl BusScanner for EspI2c {
    /// Address-only write; an ACK means a device is present.
    fn probe(&mut self, address: u8) -> Result<bool, HardwareError> {
        match self.driver.write(address, &[], ms_to_ticks(PROBE_TIMEOUT_MS)) {
            Ok(()) => {
                debug!("I2C device at 0x{:02X}", address);
                Ok(true)
            }
            Err(e) if matches!(e.code(), sys::ESP_FAIL | sys::ESP_ERR_TIMEOUT) => Ok(false),
            Err(e) => Err(HardwareError::Bus(e.to_string())),
        }
    }
}
