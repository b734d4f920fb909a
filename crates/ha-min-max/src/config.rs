//! Sensor configuration, from config entry options or YAML

use ha_config_entries::{ConfigEntry, FlowInput};
use ha_core::EntityId;
use serde::Deserialize;

use crate::calc::SensorType;
use crate::constants::{DEFAULT_ROUND_DIGITS, MAX_ROUND_DIGITS};
use crate::{MinMaxError, MinMaxResult};

/// Settings of one min/max sensor
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxConfig {
    pub name: String,
    /// Sources in configured order; duplicates are kept
    pub entity_ids: Vec<EntityId>,
    pub sensor_type: SensorType,
    pub round_digits: u32,
    /// Registry identity of the sensor, if it has one
    pub unique_id: Option<String>,
}

/// Shape shared by entry options and the YAML platform block
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    #[serde(default)]
    name: Option<String>,
    entity_ids: Vec<String>,
    #[serde(rename = "type", default)]
    sensor_type: SensorType,
    #[serde(default = "default_round_digits")]
    round_digits: f64,
    #[serde(default)]
    unique_id: Option<String>,
}

fn default_round_digits() -> f64 {
    DEFAULT_ROUND_DIGITS as f64
}

impl MinMaxConfig {
    /// Build from a config entry; the entry id becomes the unique id and
    /// the title stands in for a missing name
    pub fn from_entry(entry: &ConfigEntry) -> MinMaxResult<Self> {
        let mut config = Self::from_options(&entry.options)?;
        if config.name.is_empty() {
            config.name = entry.title.clone();
        }
        config.unique_id = Some(entry.entry_id.clone());
        Ok(config)
    }

    /// Build from an options map as produced by the config flow
    pub fn from_options(options: &FlowInput) -> MinMaxResult<Self> {
        let value = serde_json::Value::Object(
            options
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        );
        Self::from_raw(serde_json::from_value(value)?)
    }

    /// Build from one entry of the YAML `sensor:` list
    ///
    /// ```yaml
    /// - platform: min_max
    ///   name: Upstairs max
    ///   type: max
    ///   round_digits: 2
    ///   entity_ids: [sensor.a, sensor.b]
    /// ```
    pub fn from_yaml(value: &serde_yaml::Value) -> MinMaxResult<Self> {
        Self::from_raw(serde_yaml::from_value(value.clone())?)
    }

    fn from_raw(raw: RawConfig) -> MinMaxResult<Self> {
        if !(0.0..=MAX_ROUND_DIGITS as f64).contains(&raw.round_digits) {
            return Err(MinMaxError::InvalidRoundDigits {
                value: raw.round_digits,
                max: MAX_ROUND_DIGITS,
            });
        }

        let entity_ids = raw
            .entity_ids
            .into_iter()
            .map(|id| {
                id.parse::<EntityId>()
                    .map_err(|source| MinMaxError::InvalidEntityId {
                        entity_id: id.clone(),
                        source,
                    })
            })
            .collect::<MinMaxResult<Vec<_>>>()?;

        Ok(Self {
            name: raw
                .name
                .unwrap_or_else(|| raw.sensor_type.default_name()),
            entity_ids,
            sensor_type: raw.sensor_type,
            round_digits: raw.round_digits.trunc() as u32,
            unique_id: raw.unique_id,
        })
    }
}
