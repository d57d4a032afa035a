//! Analog sampler.
//!
//! Samples one physical ADC channel, converts the raw count to volts and
//! feeds it through an exponential filter. The channel number reported to
//! clients (`target_channel`) is a label set by the client; it does not
//! change which hardware channel is sampled.

use tracing::warn;

use crate::error::HardwareError;
use crate::hal::AnalogInput;

/// Default smoothing factor.
pub const DEFAULT_SMOOTHING: f32 = 0.3;

/// Linear conversion from raw ADC counts to volts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdcScale {
    /// Voltage at full scale.
    pub reference_voltage: f32,
    /// Raw count at full scale.
    pub max_raw_value: u16,
}

impl AdcScale {
    pub fn to_voltage(&self, raw: u16) -> f32 {
        f32::from(raw) * self.reference_voltage / f32::from(self.max_raw_value)
    }
}

impl Default for AdcScale {
    /// 12-bit ADC with 3.3 V full scale.
    fn default() -> Self {
        Self {
            reference_voltage: 3.3,
            max_raw_value: 4095,
        }
    }
}

/// First-order recursive low-pass filter `y = y*(1-α) + x*α`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExponentialFilter {
    alpha: f32,
    value: f32,
}

impl ExponentialFilter {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, value: 0.0 }
    }

    pub fn update(&mut self, sample: f32) -> f32 {
        self.value = self.value * (1.0 - self.alpha) + sample * self.alpha;
        self.value
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }
}

/// The single smoothed analog value and its advisory channel label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalogReading {
    pub target_channel: i32,
    pub smoothed_voltage: f32,
}

/// Owner of the ADC and of the smoothed reading.
pub struct AnalogSampler {
    adc: Box<dyn AnalogInput>,
    sample_channel: u8,
    scale: AdcScale,
    filter: ExponentialFilter,
    target_channel: i32,
}

impl AnalogSampler {
    /// Create a sampler reading `sample_channel` on `adc`.
    pub fn new(
        adc: Box<dyn AnalogInput>,
        sample_channel: u8,
        scale: AdcScale,
        alpha: f32,
        target_channel: i32,
    ) -> Self {
        Self {
            adc,
            sample_channel,
            scale,
            filter: ExponentialFilter::new(alpha),
            target_channel,
        }
    }

    /// Acquire one sample and fold it into the smoothed value.
    ///
    /// On a failed read the smoothed value is left as it was.
    pub fn sample(&mut self) -> Result<AnalogReading, HardwareError> {
        let raw = self.adc.read_raw(self.sample_channel)?;
        self.filter.update(self.scale.to_voltage(raw));
        Ok(self.reading())
    }

    /// Sample, logging and swallowing a read failure.
    ///
    /// Always returns the current reading so the caller can publish it.
    pub fn tick(&mut self) -> AnalogReading {
        match self.sample() {
            Ok(reading) => reading,
            Err(e) => {
                warn!("Analog sample failed: {}", e);
                self.reading()
            }
        }
    }

    pub fn reading(&self) -> AnalogReading {
        AnalogReading {
            target_channel: self.target_channel,
            smoothed_voltage: self.filter.value(),
        }
    }

    /// Relabel the reading. No hardware is reconfigured.
    pub fn set_target_channel(&mut self, channel: i32) {
        self.target_channel = channel;
    }

    pub fn target_channel(&self) -> i32 {
        self.target_channel
    }

    pub fn sample_channel(&self) -> u8 {
        self.sample_channel
    }
}

impl std::fmt::Debug for AnalogSampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnalogSampler")
            .field("sample_channel", &self.sample_channel)
            .field("scale", &self.scale)
            .field("filter", &self.filter)
            .field("target_channel", &self.target_channel)
            .finish_non_exhaustive()
    }
}
