//! State-change tracking helpers

use std::collections::HashSet;

use ha_core::events::STATE_CHANGED;
use ha_core::{EntityId, Event};
use tracing::trace;

use crate::{EventBus, ListenerId};

/// Call `action` for every `state_changed` event of one of `entity_ids`
///
/// The callback receives the raw event; its `data` has the shape of
/// `StateChangedData` (`entity_id`, `old_state`, `new_state`). Returns the
/// listener id to pass to [`EventBus::remove_listener`].
pub fn track_state_change<F>(bus: &EventBus, entity_ids: &[EntityId], action: F) -> ListenerId
where
    F: Fn(&Event<serde_json::Value>) + Send + Sync + 'static,
{
    let tracked: HashSet<String> = entity_ids.iter().map(ToString::to_string).collect();

    bus.listen(STATE_CHANGED, move |event| {
        let matches = event
            .data
            .get("entity_id")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|id| tracked.contains(id));
        if matches {
            trace!(event = ?event.data.get("entity_id"), "Tracked state changed");
            action(event);
        }
    })
}
