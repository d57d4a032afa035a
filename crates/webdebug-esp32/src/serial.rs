//! UART1 passthrough.

use esp_idf_hal::gpio::{AnyIOPin, Gpio16, Gpio17};
use esp_idf_hal::prelude::*;
use esp_idf_hal::uart::{config::Config, UartDriver, UART1};
use log::info;
use webdebug_core::{HardwareError, SerialPort};

use crate::ms_to_ticks;

pub const UART_BAUD: u32 = 9600;
const READ_TIMEOUT_MS: u32 = 10;

/// UART1 on TX 17 / RX 16, 9600 8N1.
pub struct EspUart {
    uart: UartDriver<'static>,
}

impl EspUart {
    pub fn new(uart1: UART1, tx: Gpio17, rx: Gpio16) -> anyhow::Result<Self> {
        let config = Config::default().baudrate(Hertz(UART_BAUD));
        let uart = UartDriver::new(
            uart1,
            tx,
            rx,
            Option::<AnyIOPin>::None,
            Option::<AnyIOPin>::None,
            &config,
        )?;
        info!("UART1 ready at {} baud", UART_BAUD);
        Ok(Self { uart })
    }
}

impl SerialPort for EspUart {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<usize, HardwareError> {
        self.uart
            .write(bytes)
            .map_err(|e| HardwareError::Serial(e.to_string()))
    }

    fn read_available(&mut self, limit: usize) -> Result<Vec<u8>, HardwareError> {
        let mut out = vec![0u8; limit];
        let mut filled = 0;
        while filled < limit {
            let n = self
                .uart
                .read(&mut out[filled..], ms_to_ticks(READ_TIMEOUT_MS))
                .map_err(|e| HardwareError::Serial(e.to_string()))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        out.truncate(filled);
        Ok(out)
    }
}
