//! ADC1 one-shot sampling on GPIO34 (channel 6).

use esp_idf_hal::adc::attenuation::DB_11;
use esp_idf_hal::adc::oneshot::config::AdcChannelConfig;
use esp_idf_hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_hal::adc::ADC1;
use esp_idf_hal::gpio::Gpio34;
use log::info;
use webdebug_core::{AnalogInput, HardwareError};

/// ADC1 channel wired to GPIO34.
pub const SAMPLE_CHANNEL: u8 = 6;

type Adc1Driver = AdcDriver<'static, ADC1>;

/// One-shot reader for the sampled channel, 12-bit, ~0 to 3.3 V.
pub struct EspAdc {
    driver: &'static Adc1Driver,
    channel: AdcChannelDriver<'static, Gpio34, &'static Adc1Driver>,
}

// Only touched through `&mut self`, behind the sampler lock.
unsafe impl Send for EspAdc {}

impl EspAdc {
    pub fn new(adc1: ADC1, pin: Gpio34) -> anyhow::Result<Self> {
        // Lives for the whole firmware run.
        let driver: &'static Adc1Driver = Box::leak(Box::new(AdcDriver::new(adc1)?));
        let config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let channel = AdcChannelDriver::new(driver, pin, &config)?;
        info!("ADC1 channel {} ready", SAMPLE_CHANNEL);
        Ok(Self { driver, channel })
    }
}

impl AnalogInput for EspAdc {
    fn read_raw(&mut self, channel: u8) -> Result<u16, HardwareError> {
        if channel != SAMPLE_CHANNEL {
            return Err(HardwareError::Analog {
                channel,
                reason: format!("only channel {} is wired", SAMPLE_CHANNEL),
            });
        }
        self.driver
            .read_raw(&mut self.channel)
            .map_err(|e| HardwareError::Analog {
                channel,
                reason: e.to_string(),
            })
    }
}
