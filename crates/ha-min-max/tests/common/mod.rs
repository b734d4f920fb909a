//! Test Home Assistant instance with the min_max integration registered
//!
//! Mirrors the `hass` fixture of the Python test suite: an isolated config
//! directory, a state machine, registries and the flow managers.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ha_config_entries::{
    ConfigEntries, ConfigEntry, ConfigFlowManager, FlowHandler, FlowInput, Integration,
    OptionsFlowManager,
};
use ha_core::{Context, EntityId, State, ATTR_UNIT_OF_MEASUREMENT};
use ha_event_bus::EventBus;
use ha_min_max::MinMaxIntegration;
use ha_registries::{EntityRegistry, Storage};
use ha_state_machine::StateMachine;
use serde_json::json;
use tempfile::TempDir;

pub struct TestHomeAssistant {
    _config_dir: TempDir,
    pub bus: Arc<EventBus>,
    pub states: Arc<StateMachine>,
    pub entity_registry: Arc<EntityRegistry>,
    pub config_entries: Arc<ConfigEntries>,
    pub flow: ConfigFlowManager,
    pub options: OptionsFlowManager,
    pub min_max: Arc<MinMaxIntegration>,
    /// Setup calls that reached the min_max integration
    pub setup_calls: Arc<AtomicUsize>,
}

impl TestHomeAssistant {
    pub fn new() -> Self {
        let config_dir = TempDir::new().unwrap();
        let storage = Arc::new(Storage::new(config_dir.path()));

        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateMachine::new(bus.clone()));
        let entity_registry = Arc::new(EntityRegistry::new(storage.clone()));
        let config_entries = Arc::new(ConfigEntries::new(storage, entity_registry.clone()));

        let min_max = Arc::new(MinMaxIntegration::new(
            bus.clone(),
            states.clone(),
            entity_registry.clone(),
        ));
        let setup_calls = Arc::new(AtomicUsize::new(0));
        config_entries.register_integration(Arc::new(CountingIntegration {
            inner: min_max.clone(),
            setup_calls: setup_calls.clone(),
        }));

        Self {
            _config_dir: config_dir,
            flow: ConfigFlowManager::new(config_entries.clone()),
            options: OptionsFlowManager::new(config_entries.clone()),
            bus,
            states,
            entity_registry,
            config_entries,
            min_max,
            setup_calls,
        }
    }

    pub fn set_state(&self, entity_id: &str, state: &str) -> State {
        self.set_state_with_attributes(entity_id, state, HashMap::new())
    }

    pub fn set_state_with_unit(&self, entity_id: &str, state: &str, unit: &str) -> State {
        self.set_state_with_attributes(
            entity_id,
            state,
            HashMap::from([(ATTR_UNIT_OF_MEASUREMENT.to_string(), json!(unit))]),
        )
    }

    pub fn set_state_with_attributes(
        &self,
        entity_id: &str,
        state: &str,
        attributes: HashMap<String, serde_json::Value>,
    ) -> State {
        let entity_id: EntityId = entity_id.parse().expect("Invalid entity_id");
        self.states.set(entity_id, state, attributes, Context::new())
    }

    pub fn get_state(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id)
    }

    /// Assert that an entity is in a specific state
    pub fn assert_state(&self, entity_id: &str, expected: &str) {
        let state = self.states.get_state(entity_id);
        assert_eq!(
            state.as_deref(),
            Some(expected),
            "Expected entity {} to be in state '{}', but was {:?}",
            entity_id,
            expected,
            state
        );
    }

    pub fn config_dir(&self) -> &Path {
        self._config_dir.path()
    }

    pub fn setup_calls(&self) -> usize {
        self.setup_calls.load(Ordering::SeqCst)
    }
}

impl Default for TestHomeAssistant {
    fn default() -> Self {
        Self::new()
    }
}

/// Build flow input from a JSON object
pub fn input(value: serde_json::Value) -> FlowInput {
    serde_json::from_value(value).unwrap()
}

/// Wraps the real integration and counts setup calls
struct CountingIntegration {
    inner: Arc<MinMaxIntegration>,
    setup_calls: Arc<AtomicUsize>,
}

#[async_trait]
impl Integration for CountingIntegration {
    fn domain(&self) -> &str {
        self.inner.domain()
    }

    async fn setup_entry(&self, entry: &ConfigEntry) -> Result<(), String> {
        self.setup_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.setup_entry(entry).await
    }

    async fn unload_entry(&self, entry: &ConfigEntry) -> Result<(), String> {
        self.inner.unload_entry(entry).await
    }

    fn config_flow(&self) -> Option<Box<dyn FlowHandler>> {
        self.inner.config_flow()
    }

    fn options_flow(&self, entry: &ConfigEntry) -> Option<Box<dyn FlowHandler>> {
        self.inner.options_flow(entry)
    }
}
