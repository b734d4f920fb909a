//! The derived min/max sensor entity

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use ha_core::{
    Context, EntityId, ATTR_FRIENDLY_NAME, ATTR_ICON, ATTR_STATE_CLASS, ATTR_UNIT_OF_MEASUREMENT,
    STATE_UNAVAILABLE,
};
use ha_event_bus::{track_state_change, EventBus, ListenerId};
use ha_state_machine::StateMachine;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::calc::{aggregate, format_state, parse_state, Aggregate, Reading, SensorType};
use crate::config::MinMaxConfig;
use crate::constants::{
    ATTR_COUNT_SENSORS, ATTR_LAST_ENTITY_ID, ATTR_MAX_ENTITY_ID, ATTR_MIN_ENTITY_ID, ICON,
    UNIT_ERROR,
};

/// A sensor whose state is an aggregate of other entities' states
///
/// While started, every state change of a source recomputes and
/// republishes the sensor before the source's `set` returns.
pub struct MinMaxSensor {
    entity_id: EntityId,
    config: MinMaxConfig,
    /// Configured sources minus the sensor itself
    sources: Vec<EntityId>,
    states: Arc<StateMachine>,
    bus: Arc<EventBus>,
    listener: Mutex<Option<ListenerId>>,
    unit_mismatch: AtomicBool,
}

impl MinMaxSensor {
    pub fn new(
        entity_id: EntityId,
        config: MinMaxConfig,
        states: Arc<StateMachine>,
        bus: Arc<EventBus>,
    ) -> Arc<Self> {
        let sources: Vec<EntityId> = config
            .entity_ids
            .iter()
            .filter(|id| **id != entity_id)
            .cloned()
            .collect();
        if sources.len() != config.entity_ids.len() {
            warn!("{} lists itself as a source, ignoring it", entity_id);
        }

        Arc::new(Self {
            entity_id,
            config,
            sources,
            states,
            bus,
            listener: Mutex::new(None),
            unit_mismatch: AtomicBool::new(false),
        })
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub fn config(&self) -> &MinMaxConfig {
        &self.config
    }

    /// Start tracking the sources and publish the initial state
    pub fn start(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        let id = track_state_change(&self.bus, &self.sources, move |event| {
            if let Some(sensor) = weak.upgrade() {
                sensor.update(event.context.child());
            }
        });

        if let Ok(mut listener) = self.listener.lock() {
            if let Some(previous) = listener.replace(id) {
                self.bus.remove_listener(previous);
            }
        }

        debug!(
            "Started {} tracking {} sources",
            self.entity_id,
            self.sources.len()
        );
        self.update(Context::new());
    }

    /// Stop tracking and remove the sensor's state
    pub fn stop(&self) {
        let listener = self.listener.lock().ok().and_then(|mut l| l.take());
        if let Some(id) = listener {
            self.bus.remove_listener(id);
        }
        self.states.remove(&self.entity_id, Context::new());
        debug!("Stopped {}", self.entity_id);
    }

    /// Current readings of the sources; sources without a state are left out
    pub fn readings(&self) -> Vec<Reading> {
        self.sources
            .iter()
            .filter_map(|id| self.states.get(&id.to_string()))
            .map(|state| Reading {
                entity_id: state.entity_id.to_string(),
                state: state.state,
                last_updated: state.last_updated,
            })
            .collect()
    }

    /// Distinct units declared by sources that currently have a numeric state
    fn source_units(&self) -> BTreeSet<String> {
        self.sources
            .iter()
            .filter_map(|id| self.states.get(&id.to_string()))
            .filter(|state| parse_state(&state.state).is_some())
            .filter_map(|state| state.attribute::<String>(ATTR_UNIT_OF_MEASUREMENT))
            .collect()
    }

    /// Recompute and publish the sensor's state
    #[instrument(skip(self, context), fields(entity_id = %self.entity_id))]
    pub fn update(&self, context: Context) {
        let result = aggregate(
            &self.readings(),
            self.config.sensor_type,
            self.config.round_digits,
        );

        let units = self.source_units();
        let mismatch = units.len() > 1;
        if mismatch && !self.unit_mismatch.swap(true, Ordering::SeqCst) {
            warn!(
                "Units of measurement do not match for {}: {:?}",
                self.entity_id, units
            );
        } else if !mismatch {
            self.unit_mismatch.store(false, Ordering::SeqCst);
        }

        let unit = if mismatch {
            Some(UNIT_ERROR.to_string())
        } else {
            units.into_iter().next()
        };
        let state = match result.value {
            Some(value) if !mismatch => format_state(value),
            _ => STATE_UNAVAILABLE.to_string(),
        };

        debug!(state = %state, count = result.count, "Publishing aggregate");
        self.states.set(
            self.entity_id.clone(),
            state,
            self.attributes(&result, unit),
            context,
        );
    }

    fn attributes(&self, result: &Aggregate, unit: Option<String>) -> HashMap<String, Value> {
        let mut attributes = HashMap::from([
            (ATTR_FRIENDLY_NAME.to_string(), json!(self.config.name)),
            (ATTR_ICON.to_string(), json!(ICON)),
            (ATTR_STATE_CLASS.to_string(), json!("measurement")),
            (ATTR_COUNT_SENSORS.to_string(), json!(result.count)),
        ]);
        if let Some(unit) = unit {
            attributes.insert(ATTR_UNIT_OF_MEASUREMENT.to_string(), json!(unit));
        }

        let extreme = match self.config.sensor_type {
            SensorType::Min => Some((ATTR_MIN_ENTITY_ID, &result.min_entity_id)),
            SensorType::Max => Some((ATTR_MAX_ENTITY_ID, &result.max_entity_id)),
            SensorType::Last => Some((ATTR_LAST_ENTITY_ID, &result.last_entity_id)),
            _ => None,
        };
        if let Some((key, Some(entity_id))) = extreme {
            attributes.insert(key.to_string(), json!(entity_id));
        }
        attributes
    }
}

impl Drop for MinMaxSensor {
    fn drop(&mut self) {
        if let Some(id) = self.listener.get_mut().ok().and_then(Option::take) {
            self.bus.remove_listener(id);
        }
    }
}
