//! Min/Max helper integration
//!
//! Creates sensors whose state is the minimum, maximum, mean, median,
//! last value, range or sum of other sensors' states. Sensors come from
//! config entries (set up through the config flow) or from YAML
//! `sensor:` blocks with `platform: min_max`.

pub mod calc;
pub mod config;
pub mod config_flow;
pub mod constants;
mod error;
pub mod sensor;

pub use calc::{aggregate, Aggregate, Reading, SensorType};
pub use config::MinMaxConfig;
pub use constants::DOMAIN;
pub use error::{MinMaxError, MinMaxResult};
pub use sensor::MinMaxSensor;

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use ha_config_entries::{ConfigEntry, FlowHandler, Integration};
use ha_core::EntityId;
use ha_event_bus::EventBus;
use ha_registries::{EntityRegistration, EntityRegistry};
use ha_state_machine::StateMachine;
use tracing::{info, warn};

const SENSOR_DOMAIN: &str = "sensor";

/// The min_max integration: owns every running min/max sensor
pub struct MinMaxIntegration {
    bus: Arc<EventBus>,
    states: Arc<StateMachine>,
    entity_registry: Arc<EntityRegistry>,
    /// Keyed by config entry id, or `yaml:<entity_id>` for YAML sensors
    sensors: DashMap<String, Arc<MinMaxSensor>>,
}

impl MinMaxIntegration {
    pub fn new(
        bus: Arc<EventBus>,
        states: Arc<StateMachine>,
        entity_registry: Arc<EntityRegistry>,
    ) -> Self {
        Self {
            bus,
            states,
            entity_registry,
            sensors: DashMap::new(),
        }
    }

    /// Running sensor of a config entry
    pub fn sensor(&self, entry_id: &str) -> Option<Arc<MinMaxSensor>> {
        self.sensors.get(entry_id).map(|s| Arc::clone(s.value()))
    }

    pub fn sensor_count(&self) -> usize {
        self.sensors.len()
    }

    /// Set up sensors from YAML platform configs
    ///
    /// Invalid sensors are logged and skipped. Returns the entity ids of
    /// the sensors that were started.
    pub async fn setup_platform(&self, configs: Vec<MinMaxConfig>) -> Vec<EntityId> {
        let mut started = Vec::new();
        for config in configs {
            match self.start_sensor(config, None) {
                Ok(sensor) => {
                    let entity_id = sensor.entity_id().clone();
                    self.sensors.insert(format!("yaml:{}", entity_id), sensor);
                    started.push(entity_id);
                }
                Err(err) => warn!("Skipping min_max sensor: {}", err),
            }
        }

        if let Err(err) = self.entity_registry.save().await {
            warn!("Failed to save entity registry: {}", err);
        }
        if !started.is_empty() {
            info!("Set up {} min_max sensors from YAML", started.len());
        }
        started
    }

    /// Stop every sensor, e.g. on shutdown
    pub fn stop_all(&self) {
        let keys: Vec<String> = self.sensors.iter().map(|r| r.key().clone()).collect();
        for key in keys {
            if let Some((_, sensor)) = self.sensors.remove(&key) {
                sensor.stop();
            }
        }
    }

    fn start_sensor(
        &self,
        config: MinMaxConfig,
        config_entry_id: Option<&str>,
    ) -> MinMaxResult<Arc<MinMaxSensor>> {
        let entity_id = self.resolve_entity_id(&config, config_entry_id)?;
        let sensor = MinMaxSensor::new(
            entity_id,
            config,
            Arc::clone(&self.states),
            Arc::clone(&self.bus),
        );
        sensor.start();
        Ok(sensor)
    }

    /// Entity id from the registry when the sensor has a unique id,
    /// otherwise the first free `sensor.<slug of name>`
    fn resolve_entity_id(
        &self,
        config: &MinMaxConfig,
        config_entry_id: Option<&str>,
    ) -> MinMaxResult<EntityId> {
        let suggested = EntityId::from_name(SENSOR_DOMAIN, &config.name)
            .map_err(|_| MinMaxError::InvalidName(config.name.clone()))?;
        let reserved = self.states.entity_ids(SENSOR_DOMAIN);

        let entity_id = match &config.unique_id {
            Some(unique_id) => {
                self.entity_registry
                    .get_or_create(EntityRegistration {
                        domain: SENSOR_DOMAIN,
                        platform: DOMAIN,
                        unique_id,
                        suggested_object_id: suggested.object_id(),
                        config_entry_id,
                        original_name: Some(&config.name),
                        reserved_ids: &reserved,
                    })
                    .entity_id
                    .clone()
            }
            None => self.entity_registry.generate_entity_id(
                SENSOR_DOMAIN,
                suggested.object_id(),
                &reserved,
            ),
        };

        entity_id
            .parse()
            .map_err(|source| MinMaxError::InvalidEntityId { entity_id, source })
    }
}

#[async_trait]
impl Integration for MinMaxIntegration {
    fn domain(&self) -> &str {
        DOMAIN
    }

    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), String> {
        let config = MinMaxConfig::from_entry(entry).map_err(|e| e.to_string())?;

        // Same registry entry, so the old sensor must be gone before the new one publishes
        if let Some((_, previous)) = self.sensors.remove(&entry.entry_id) {
            previous.stop();
        }
        let sensor = self
            .start_sensor(config, Some(&entry.entry_id))
            .map_err(|e| e.to_string())?;
        self.sensors.insert(entry.entry_id.clone(), sensor);

        // The sensor is already running; a failed save only loses the
        // registry entry on restart
        if let Err(err) = self.entity_registry.save().await {
            warn!("Failed to save entity registry: {}", err);
        }
        Ok(())
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<(), String> {
        if let Some((_, sensor)) = self.sensors.remove(&entry.entry_id) {
            sensor.stop();
        }
        Ok(())
    }

    fn config_flow(&self) -> Option<Box<dyn FlowHandler>> {
        Some(config_flow::config_flow())
    }

    fn options_flow(&self, entry: &ConfigEntry) -> Option<Box<dyn FlowHandler>> {
        Some(config_flow::options_flow(entry))
    }
}
