//! Home Assistant Rust Server
//!
//! Wires the core together, sets up the min_max helper from stored
//! config entries and `configuration.yaml`, and runs until Ctrl-C.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use ha_config_entries::ConfigEntries;
use ha_event_bus::EventBus;
use ha_min_max::MinMaxIntegration;
use ha_registries::{EntityRegistry, Storage};
use ha_state_machine::StateMachine;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::CoreConfig;

/// The central Home Assistant instance
pub struct HomeAssistant {
    pub config_dir: PathBuf,
    pub states: Arc<StateMachine>,
    pub entity_registry: Arc<EntityRegistry>,
    pub config_entries: Arc<ConfigEntries>,
    pub min_max: Arc<MinMaxIntegration>,
}

impl HomeAssistant {
    pub fn new(config_dir: PathBuf) -> Self {
        let storage = Arc::new(Storage::new(&config_dir));
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        let entity_registry = Arc::new(EntityRegistry::new(storage.clone()));
        let config_entries = Arc::new(ConfigEntries::new(storage, entity_registry.clone()));

        let min_max = Arc::new(MinMaxIntegration::new(
            bus,
            states.clone(),
            entity_registry.clone(),
        ));
        config_entries.register_integration(min_max.clone());

        Self {
            config_dir,
            states,
            entity_registry,
            config_entries,
            min_max,
        }
    }

    /// Load persisted registries and set up everything configured
    pub async fn start(&self) -> Result<()> {
        self.entity_registry
            .load()
            .await
            .context("Failed to load entity registry")?;
        self.config_entries
            .load()
            .await
            .context("Failed to load config entries")?;

        for result in self.config_entries.setup_all().await {
            if let Err(err) = result {
                warn!("Config entry setup failed: {}", err);
            }
        }

        let core_config = CoreConfig::load(&self.config_dir)?;
        self.min_max
            .setup_platform(core_config.min_max_sensors())
            .await;

        info!(
            "Loaded {} config entries, {} entities",
            self.config_entries.len(),
            self.states.entity_count()
        );
        Ok(())
    }

    pub async fn stop(&self) {
        for result in self.config_entries.unload_all().await {
            if let Err(err) = result {
                warn!("Config entry unload failed: {}", err);
            }
        }
        self.min_max.stop_all();

        if let Err(err) = self.config_entries.save().await {
            warn!("Failed to save config entries: {}", err);
        }
        if let Err(err) = self.entity_registry.save().await {
            warn!("Failed to save entity registry: {}", err);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config_dir = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HA_CONFIG_DIR").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config"));

    info!("Starting Home Assistant (Rust) with config {}", config_dir.display());

    let hass = HomeAssistant::new(config_dir);
    hass.start().await?;

    info!("Home Assistant is running");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");
    hass.stop().await;

    Ok(())
}
