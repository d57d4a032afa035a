//! Settings persisted in NVS.

use std::sync::Mutex;

use esp_idf_svc::nvs::{EspNvs, EspNvsPartition, NvsDefault};
use log::{info, warn};
use webdebug_core::{BridgeSettings, ConfigError, ConfigStorage};

const NAMESPACE: &str = "webdebug";
const SETTINGS_KEY: &str = "settings";
const MAX_SETTINGS_LEN: usize = 1024;

/// Bridge settings stored as a JSON string in the default NVS partition.
pub struct NvsConfigStorage {
    nvs: Mutex<EspNvs<NvsDefault>>,
}

impl NvsConfigStorage {
    pub fn new(partition: EspNvsPartition<NvsDefault>) -> anyhow::Result<Self> {
        let nvs = EspNvs::new(partition, NAMESPACE, true)?;
        info!("NVS namespace '{}' opened", NAMESPACE);
        Ok(Self {
            nvs: Mutex::new(nvs),
        })
    }

    /// Stored settings, or defaults when nothing valid is stored.
    pub fn load_or_default(&self) -> BridgeSettings {
        match self.load_settings() {
            Ok(settings) => settings,
            Err(ConfigError::NotFound(_)) => BridgeSettings::default(),
            Err(e) => {
                warn!("Ignoring stored settings: {}", e);
                BridgeSettings::default()
            }
        }
    }
}

impl ConfigStorage for NvsConfigStorage {
    fn load_settings(&self) -> Result<BridgeSettings, ConfigError> {
        let nvs = self
            .nvs
            .lock()
            .map_err(|_| ConfigError::ReadError("NVS lock poisoned".into()))?;
        let mut buf = [0u8; MAX_SETTINGS_LEN];
        match nvs.get_str(SETTINGS_KEY, &mut buf) {
            Ok(Some(text)) => BridgeSettings::from_json(text),
            Ok(None) => Err(ConfigError::NotFound(SETTINGS_KEY.to_string())),
            Err(e) => Err(ConfigError::ReadError(e.to_string())),
        }
    }

    fn save_settings(&self, settings: &BridgeSettings) -> Result<(), ConfigError> {
        let json = settings.to_json()?;
        let mut nvs = self
            .nvs
            .lock()
            .map_err(|_| ConfigError::WriteError("NVS lock poisoned".into()))?;
        nvs.set_str(SETTINGS_KEY, &json)
            .map_err(|e| ConfigError::WriteError(e.to_string()))
    }
}
