//! Core types for Home Assistant
//!
//! The fundamental types shared by the host crates and integrations:
//! EntityId, State, Event and Context, plus the state sentinels and
//! attribute names every integration agrees on.

mod context;
mod entity_id;
mod event;
mod state;
pub mod util;

pub use context::Context;
pub use entity_id::{EntityId, EntityIdError};
pub use event::{Event, EventData, EventOrigin, EventType, MATCH_ALL};
pub use state::State;
pub use util::slugify;

/// State of an entity that cannot currently report a value
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State of an entity whose value is not known yet
pub const STATE_UNKNOWN: &str = "unknown";

pub const ATTR_FRIENDLY_NAME: &str = "friendly_name";
pub const ATTR_ICON: &str = "icon";
pub const ATTR_UNIT_OF_MEASUREMENT: &str = "unit_of_measurement";
pub const ATTR_STATE_CLASS: &str = "state_class";

/// Standard event types
pub mod events {
    use super::*;

    pub const STATE_CHANGED: &str = "state_changed";

    /// Data for STATE_CHANGED events
    ///
    /// `new_state` is `None` when the entity was removed.
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }
}
