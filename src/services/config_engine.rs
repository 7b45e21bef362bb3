// Unslop Config Engine
// Manages host configuration: loading, saving, updating individual values, and resetting to defaults.
// The config is stored as a JSON file at the platform-specific config path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::platform;
use crate::types::config::HostConfig;
use crate::types::errors::ConfigError;

/// Environment variable that points at an explicit config file.
pub const CONFIG_PATH_ENV: &str = "UNSLOP_CONFIG";

/// Trait defining the config engine interface.
pub trait ConfigEngineTrait {
    fn load(&mut self) -> Result<HostConfig, ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    fn get_config(&self) -> &HostConfig;
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), ConfigError>;
    fn reset(&mut self) -> Result<(), ConfigError>;
    fn get_config_path(&self) -> &str;
}

/// Config engine implementation that persists the host config as JSON on disk.
pub struct ConfigEngine {
    config_path: String,
    config: HostConfig,
}

impl ConfigEngine {
    /// Creates a new ConfigEngine.
    ///
    /// Path precedence: `path_override`, then `$UNSLOP_CONFIG`, then
    /// `config.json` in the platform config directory.
    pub fn new(path_override: Option<String>) -> Self {
        let config_path = path_override
            .or_else(|| std::env::var(CONFIG_PATH_ENV).ok())
            .unwrap_or_else(|| {
                platform::get_config_dir()
                    .join("config.json")
                    .to_string_lossy()
                    .to_string()
            });

        Self {
            config_path,
            config: HostConfig::default(),
        }
    }

    /// Database file to open: the configured path or `unslop.db` in the data directory.
    pub fn database_path(&self) -> PathBuf {
        match &self.config.database_path {
            Some(p) => PathBuf::from(p),
            None => platform::get_data_dir().join("unslop.db"),
        }
    }
}

impl ConfigEngineTrait for ConfigEngine {
    /// Loads the config file. A missing file yields defaults; a malformed one is an error.
    fn load(&mut self) -> Result<HostConfig, ConfigError> {
        let path = Path::new(&self.config_path);

        if !path.exists() {
            self.config = HostConfig::default();
            return Ok(self.config.clone());
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("Failed to read config file: {}", e)))?;

        let config: HostConfig = serde_json::from_str(&content).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to parse config file: {}", e))
        })?;

        self.config = config;
        Ok(self.config.clone())
    }

    fn save(&self) -> Result<(), ConfigError> {
        let path = Path::new(&self.config_path);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ConfigError::IoError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(&self.config).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, json)
            .map_err(|e| ConfigError::IoError(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    fn get_config(&self) -> &HostConfig {
        &self.config
    }

    /// Updates one value by dot-notation key path (e.g. `"gemini.model"`,
    /// `"mock.delay_scale"`), validates by deserializing, then saves.
    fn set_value(&mut self, key: &str, value: serde_json::Value) -> Result<(), ConfigError> {
        if key.is_empty() {
            return Err(ConfigError::InvalidKey("Key cannot be empty".to_string()));
        }

        let parts: Vec<&str> = key.split('.').collect();

        let mut json_value = serde_json::to_value(&self.config).map_err(|e| {
            ConfigError::SerializationError(format!("Failed to serialize config: {}", e))
        })?;

        {
            let (last, parents) = parts
                .split_last()
                .ok_or_else(|| ConfigError::InvalidKey("Key cannot be empty".to_string()))?;

            let mut current = &mut json_value;
            for part in parents {
                current = current.get_mut(*part).ok_or_else(|| {
                    ConfigError::InvalidKey(format!("Key '{}' not found in config", key))
                })?;
            }

            match current {
                serde_json::Value::Object(map) if map.contains_key(*last) => {
                    map.insert(last.to_string(), value);
                }
                serde_json::Value::Object(_) => {
                    return Err(ConfigError::InvalidKey(format!(
                        "Key '{}' not found in config",
                        key
                    )));
                }
                _ => {
                    return Err(ConfigError::InvalidKey(format!(
                        "Cannot navigate to key '{}': intermediate value is not an object",
                        key
                    )));
                }
            }
        }

        let new_config: HostConfig = serde_json::from_value(json_value).map_err(|e| {
            ConfigError::InvalidValue(format!("Invalid value for key '{}': {}", key, e))
        })?;

        self.config = new_config;
        self.save()?;

        Ok(())
    }

    fn reset(&mut self) -> Result<(), ConfigError> {
        self.config = HostConfig::default();
        self.save()?;
        Ok(())
    }

    fn get_config_path(&self) -> &str {
        &self.config_path
    }
}
