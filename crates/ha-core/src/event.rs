//! Events carried by the event bus

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::Context;

/// Wildcard event type; listeners on it see every event
pub const MATCH_ALL: &str = "*";

/// A payload type bound to one event type
pub trait EventData: Clone + Send + Sync + 'static {
    fn event_type() -> &'static str;
}

/// Name of an event type, e.g. `state_changed`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn match_all() -> Self {
        Self::new(MATCH_ALL)
    }

    pub fn is_match_all(&self) -> bool {
        self.0 == MATCH_ALL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EventType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOrigin {
    #[default]
    Local,
    Remote,
}

/// An event as fired on the bus
///
/// On the bus the payload is untyped JSON; [`Event::decode`] recovers a
/// typed view for a concrete [`EventData`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T = serde_json::Value> {
    pub event_type: EventType,
    pub data: T,
    pub origin: EventOrigin,
    pub time_fired: DateTime<Utc>,
    pub context: Context,
}

impl<T> Event<T> {
    pub fn new(event_type: impl Into<EventType>, data: T, context: Context) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            origin: EventOrigin::default(),
            time_fired: Utc::now(),
            context,
        }
    }

    /// Same event with its payload replaced
    pub fn with_data<U>(self, data: U) -> Event<U> {
        Event {
            event_type: self.event_type,
            data,
            origin: self.origin,
            time_fired: self.time_fired,
            context: self.context,
        }
    }
}

impl Event<serde_json::Value> {
    /// Deserialize the payload as `T`, keeping the event metadata
    pub fn decode<T: DeserializeOwned>(mut self) -> Result<Event<T>, serde_json::Error> {
        let data = serde_json::from_value(std::mem::take(&mut self.data))?;
        Ok(self.with_data(data))
    }
}
