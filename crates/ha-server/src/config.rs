//! `configuration.yaml` loading
//!
//! Only the `sensor:` list is read; blocks for platforms other than
//! min_max are left alone.

use std::path::{Path, PathBuf};

use ha_min_max::{MinMaxConfig, MinMaxError, DOMAIN};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "configuration.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Default, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub sensor: Vec<serde_yaml::Value>,
}

impl CoreConfig {
    /// Load `configuration.yaml` from the config directory; a missing file
    /// is an empty configuration
    pub fn load(config_dir: &Path) -> ConfigResult<Self> {
        let path = config_dir.join(CONFIG_FILE);
        if !path.exists() {
            debug!("No {} in {}", CONFIG_FILE, config_dir.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Yaml { path, source })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Option<Self> = serde_yaml::from_str(content)?;
        Ok(config.unwrap_or_default())
    }

    /// Parsed min_max sensor blocks; invalid blocks are logged and skipped
    pub fn min_max_sensors(&self) -> Vec<MinMaxConfig> {
        self.sensor
            .iter()
            .filter(|block| block.get("platform").and_then(|p| p.as_str()) == Some(DOMAIN))
            .filter_map(|block| match MinMaxConfig::from_yaml(block) {
                Ok(config) => Some(config),
                Err(err) => {
                    log_invalid(&err);
                    None
                }
            })
            .collect()
    }
}

fn log_invalid(err: &MinMaxError) {
    warn!("Invalid config for [sensor.{}]: {}", DOMAIN, err);
}

#[cfg(test)]
mod tests {
    use super::*;
    use ha_min_max::SensorType;

    #[test]
    fn test_min_max_sensors() {
        let config = CoreConfig::parse(
            r#"
homeassistant:
  name: Home
sensor:
  - platform: template
    sensors: {}
  - platform: min_max
    type: min
    entity_ids: [sensor.a, sensor.b]
  - platform: min_max
    type: avg
    entity_ids: [sensor.a]
"#,
        )
        .unwrap();

        let sensors = config.min_max_sensors();
        assert_eq!(sensors.len(), 1);
        assert_eq!(sensors[0].sensor_type, SensorType::Min);
        assert_eq!(sensors[0].name, "Min sensor");
    }

    #[test]
    fn test_empty_and_missing() {
        assert!(CoreConfig::parse("").unwrap().sensor.is_empty());

        let dir = tempfile::tempdir().unwrap();
        assert!(CoreConfig::load(dir.path()).unwrap().sensor.is_empty());
    }

    #[test]
    fn test_invalid_yaml() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "sensor: [unclosed").unwrap();
        assert!(matches!(
            CoreConfig::load(dir.path()),
            Err(ConfigError::Yaml { .. })
        ));
    }
}
