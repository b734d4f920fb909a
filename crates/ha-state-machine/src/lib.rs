//! State machine with domain indexing for Home Assistant
//!
//! Holds the current state of every entity and fires `state_changed` on
//! the event bus for every change and removal.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ha_core::events::StateChangedData;
use ha_core::{Context, EntityId, State};
use ha_event_bus::EventBus;
use tracing::{debug, instrument, trace};

pub struct StateMachine {
    /// Keyed by entity_id string
    states: DashMap<String, State>,
    /// domain -> entity_ids, in insertion order
    domain_index: DashMap<String, Vec<String>>,
    event_bus: Arc<EventBus>,
}

impl StateMachine {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            domain_index: DashMap::new(),
            event_bus,
        }
    }

    /// Write the state of an entity and fire `state_changed`
    ///
    /// `last_changed` is carried over when only the attributes changed.
    /// Writing the same state and attributes again is a no-op: nothing is
    /// fired and the stored state is returned. The event is fired after the
    /// write is visible, and no internal lock is held while listeners run,
    /// so a listener may read or write other states.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let state = state.into();
        let key = entity_id.to_string();

        let (old_state, new_state) = match self.states.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                let existing = occupied.get();
                if existing.state == state && existing.attributes == attributes {
                    trace!("State and attributes unchanged");
                    return existing.clone();
                }
                let new_state = existing.with_update(state, attributes, context.clone());
                let old_state = occupied.insert(new_state.clone());
                (Some(old_state), new_state)
            }
            Entry::Vacant(vacant) => {
                let new_state = State::new(entity_id.clone(), state, attributes, context.clone());
                vacant.insert(new_state.clone());
                self.domain_index
                    .entry(entity_id.domain().to_string())
                    .or_default()
                    .push(key);
                (None, new_state)
            }
        };

        debug!(
            state = %new_state.state,
            changed = old_state.as_ref().map_or(true, |s| s.state != new_state.state),
            "Setting entity state"
        );

        self.event_bus.fire_typed(
            StateChangedData {
                entity_id,
                old_state,
                new_state: Some(new_state.clone()),
            },
            context,
        );

        new_state
    }

    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Just the state value
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    pub fn is_state(&self, entity_id: &str, state: &str) -> bool {
        self.get_state(entity_id).as_deref() == Some(state)
    }

    /// Entity IDs of one domain
    pub fn entity_ids(&self, domain: &str) -> Vec<String> {
        self.domain_index
            .get(domain)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    pub fn all(&self) -> Vec<State> {
        self.states.iter().map(|r| r.value().clone()).collect()
    }

    /// Remove an entity's state, firing `state_changed` with `new_state: None`
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let key = entity_id.to_string();
        let old_state = self.states.remove(&key).map(|(_, s)| s)?;

        trace!("Removing entity state");
        if let Some(mut ids) = self.domain_index.get_mut(entity_id.domain()) {
            ids.retain(|id| id != &key);
        }

        self.event_bus.fire_typed(
            StateChangedData {
                entity_id: entity_id.clone(),
                old_state: Some(old_state.clone()),
                new_state: None,
            },
            context,
        );

        Some(old_state)
    }

    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

pub type SharedStateMachine = Arc<StateMachine>;
