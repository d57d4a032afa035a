//! JSON file settings storage.

use std::path::{Path, PathBuf};

use webdebug_core::{BridgeSettings, ConfigError, ConfigStorage};

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "WEBDEBUG_CONFIG";

/// Default settings file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "webdebug.json";

/// Settings stored as one JSON document on disk.
#[derive(Debug, Clone)]
pub struct FileConfigStorage {
    path: PathBuf,
}

impl FileConfigStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Storage at `$WEBDEBUG_CONFIG`, or `webdebug.json` when unset.
    pub fn from_env() -> Self {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load settings, falling back to defaults when the file does not exist.
    pub fn load_or_default(&self) -> Result<BridgeSettings, ConfigError> {
        match self.load_settings() {
            Err(ConfigError::NotFound(_)) => Ok(BridgeSettings::default()),
            other => other,
        }
    }
}

impl ConfigStorage for FileConfigStorage {
    fn load_settings(&self) -> Result<BridgeSettings, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(self.path.display().to_string()))
            }
            Err(e) => return Err(ConfigError::ReadError(e.to_string())),
        };
        BridgeSettings::from_json(&text)
    }

    fn save_settings(&self, settings: &BridgeSettings) -> Result<(), ConfigError> {
        let json = settings.to_json()?;
        std::fs::write(&self.path, json).map_err(|e| ConfigError::WriteError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("webdebug-{}-{}.json", name, std::process::id()))
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let storage = FileConfigStorage::new(scratch("missing"));
        assert!(matches!(storage.load_settings(), Err(ConfigError::NotFound(_))));
        assert_eq!(storage.load_or_default().unwrap(), BridgeSettings::default());
    }

    #[test]
    fn test_save_then_load() {
        let path = scratch("roundtrip");
        let storage = FileConfigStorage::new(&path);
        let settings = BridgeSettings {
            max_sessions: 4,
            strict_commands: true,
            ..Default::default()
        };

        storage.save_settings(&settings).unwrap();
        assert_eq!(storage.load_or_default().unwrap(), settings);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let path = scratch("invalid");
        std::fs::write(&path, r#"{"smoothingFactor": 7}"#).unwrap();

        let storage = FileConfigStorage::new(&path);
        assert!(matches!(
            storage.load_or_default(),
            Err(ConfigError::InvalidData(_))
        ));

        std::fs::remove_file(path).ok();
    }
}
