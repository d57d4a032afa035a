//! Configuration storage abstraction.
//!
//! This module provides the bridge settings and a storage trait that is
//! implemented differently on each platform:
//! - Linux: JSON file
//! - ESP32: NVS (Non-Volatile Storage)
//!
//! Every setting has a default matching the stock board timings, so a missing
//! or partial document is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analog::AdcScale;

/// Errors that can occur during configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested configuration was not found.
    NotFound(String),
    /// Failed to read configuration.
    ReadError(String),
    /// Failed to write configuration.
    WriteError(String),
    /// Configuration data is invalid.
    InvalidData(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Configuration not found: {}", key),
            ConfigError::ReadError(msg) => write!(f, "Read error: {}", msg),
            ConfigError::WriteError(msg) => write!(f, "Write error: {}", msg),
            ConfigError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Abstract settings storage.
///
/// All methods are synchronous to support embedded platforms.
pub trait ConfigStorage: Send + Sync {
    /// Load bridge settings.
    fn load_settings(&self) -> Result<BridgeSettings, ConfigError>;

    /// Save bridge settings.
    fn save_settings(&self, settings: &BridgeSettings) -> Result<(), ConfigError>;
}

/// Tunables of the hardware-state core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BridgeSettings {
    /// Debounce scan period.
    pub debounce_period_ms: u64,

    /// Minimum time between two accepted transitions on one input.
    pub debounce_window_ms: u64,

    /// Analog sampling period.
    pub oscilloscope_period_ms: u64,

    /// Link status broadcast period.
    pub link_status_period_ms: u64,

    /// Exponential smoothing factor (α).
    pub smoothing_factor: f32,

    /// ADC full-scale voltage.
    pub reference_voltage: f32,

    /// ADC full-scale raw count.
    pub max_raw_value: u16,

    /// Physical ADC channel that is sampled.
    pub sample_channel: u8,

    /// Channel label reported before any client selects one.
    pub initial_target_channel: i32,

    /// Maximum simultaneously connected clients.
    pub max_sessions: usize,

    /// Outbound frames buffered per client before frames are dropped.
    pub session_queue_depth: usize,

    /// Per-frame socket write timeout.
    pub send_timeout_ms: u64,

    /// Maximum bytes returned by one serial drain.
    pub serial_read_limit: usize,

    /// Access point SSID reported in link status.
    pub ap_ssid: String,

    /// Reject malformed numeric command fields instead of reading them as 0.
    pub strict_commands: bool,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            debounce_period_ms: 50,
            debounce_window_ms: 20,
            oscilloscope_period_ms: 200,
            link_status_period_ms: 5000,
            smoothing_factor: 0.3,
            reference_voltage: 3.3,
            max_raw_value: 4095,
            sample_channel: 6,
            initial_target_channel: 34,
            max_sessions: 8,
            session_queue_depth: 16,
            send_timeout_ms: 100,
            serial_read_limit: 120,
            ap_ssid: "ESP32-Debugger".to_string(),
            strict_commands: false,
        }
    }
}

impl BridgeSettings {
    /// Parse settings from a JSON document. Missing fields take defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: Self =
            serde_json::from_str(text).map_err(|e| ConfigError::InvalidData(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        serde_json::to_string_pretty(self).map_err(|e| ConfigError::WriteError(e.to_string()))
    }

    /// Check that the settings describe a runnable configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("debouncePeriodMs", self.debounce_period_ms),
            ("oscilloscopePeriodMs", self.oscilloscope_period_ms),
            ("linkStatusPeriodMs", self.link_status_period_ms),
            ("sendTimeoutMs", self.send_timeout_ms),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::InvalidData(format!("{} must be positive", name)));
        }
        if !(self.smoothing_factor > 0.0 && self.smoothing_factor <= 1.0) {
            return Err(ConfigError::InvalidData(format!(
                "smoothingFactor must be in (0, 1], got {}",
                self.smoothing_factor
            )));
        }
        if self.max_raw_value == 0 {
            return Err(ConfigError::InvalidData("maxRawValue must be positive".to_string()));
        }
        if self.max_sessions == 0 || self.session_queue_depth == 0 {
            return Err(ConfigError::InvalidData(
                "maxSessions and sessionQueueDepth must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn debounce_period(&self) -> Duration {
        Duration::from_millis(self.debounce_period_ms)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_window_ms)
    }

    pub fn oscilloscope_period(&self) -> Duration {
        Duration::from_millis(self.oscilloscope_period_ms)
    }

    pub fn link_status_period(&self) -> Duration {
        Duration::from_millis(self.link_status_period_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn adc_scale(&self) -> AdcScale {
        AdcScale {
            reference_voltage: self.reference_voltage,
            max_raw_value: self.max_raw_value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::RwLock;

    /// In-memory storage for testing.
    struct MemoryConfigStorage {
        data: RwLock<HashMap<String, String>>,
    }

    impl MemoryConfigStorage {
        fn new() -> Self {
            Self {
                data: RwLock::new(HashMap::new()),
            }
        }
    }

    impl ConfigStorage for MemoryConfigStorage {
        fn load_settings(&self) -> Result<BridgeSettings, ConfigError> {
            let data = self.data.read().unwrap();
            let json = data
                .get("settings")
                .ok_or_else(|| ConfigError::NotFound("settings".to_string()))?;
            BridgeSettings::from_json(json)
        }

        fn save_settings(&self, settings: &BridgeSettings) -> Result<(), ConfigError> {
            let json = settings.to_json()?;
            self.data
                .write()
                .unwrap()
                .insert("settings".to_string(), json);
            Ok(())
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = BridgeSettings::default();
        assert_eq!(settings.debounce_period(), Duration::from_millis(50));
        assert_eq!(settings.debounce_window(), Duration::from_millis(20));
        assert_eq!(settings.oscilloscope_period(), Duration::from_millis(200));
        assert_eq!(settings.max_sessions, 8);
        assert_eq!(settings.smoothing_factor, 0.3);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let settings =
            BridgeSettings::from_json(r#"{"maxSessions": 2, "apSsid": "bench"}"#).unwrap();
        assert_eq!(settings.max_sessions, 2);
        assert_eq!(settings.ap_ssid, "bench");
        assert_eq!(settings.debounce_window_ms, 20);
    }

    #[test]
    fn test_invalid_settings_rejected() {
        assert!(BridgeSettings::from_json(r#"{"smoothingFactor": 0.0}"#).is_err());
        assert!(BridgeSettings::from_json(r#"{"smoothingFactor": 1.5}"#).is_err());
        assert!(BridgeSettings::from_json(r#"{"debouncePeriodMs": 0}"#).is_err());
        assert!(BridgeSettings::from_json(r#"{"maxSessions": 0}"#).is_err());
        assert!(BridgeSettings::from_json(r#"{"maxRawValue": 0}"#).is_err());
        assert!(BridgeSettings::from_json("not json").is_err());
    }

    #[test]
    fn test_settings_round_trip() {
        let storage = MemoryConfigStorage::new();
        assert!(matches!(storage.load_settings(), Err(ConfigError::NotFound(_))));

        let settings = BridgeSettings {
            strict_commands: true,
            sample_channel: 7,
            ..Default::default()
        };
        storage.save_settings(&settings).unwrap();

        assert_eq!(storage.load_settings().unwrap(), settings);
    }
}
