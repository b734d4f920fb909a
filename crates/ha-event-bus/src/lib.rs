//! Event bus with typed pub/sub for Home Assistant
//!
//! Two ways to consume events:
//!
//! - **Listeners** (`listen`, `track_state_change`) are plain callbacks run
//!   synchronously inside `fire`, in registration order. Integrations use
//!   them to react to state changes before `fire` returns, which keeps
//!   derived states consistent with their sources without an executor
//!   round-trip.
//! - **Subscriptions** (`subscribe`, `subscribe_typed`, `subscribe_all`)
//!   are tokio broadcast receivers for consumers that want to process
//!   events on their own task.

mod tracking;

pub use tracking::track_state_change;

use dashmap::DashMap;
use ha_core::{Context, Event, EventData, EventType};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Handle returned by [`EventBus::listen`], used to remove the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Synchronous event callback
pub type Listener = Arc<dyn Fn(&Event<serde_json::Value>) + Send + Sync + 'static>;

pub struct EventBus {
    /// Broadcast senders per event type
    senders: DashMap<EventType, broadcast::Sender<Event<serde_json::Value>>>,
    match_all_sender: broadcast::Sender<Event<serde_json::Value>>,
    /// Synchronous listeners per event type, in registration order
    listeners: DashMap<EventType, Vec<(ListenerId, Listener)>>,
    next_listener_id: AtomicU64,
    capacity: usize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            senders: DashMap::new(),
            match_all_sender,
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
            capacity,
        }
    }

    /// Subscribe to events of one type (or `*` for all)
    pub fn subscribe(
        &self,
        event_type: impl Into<EventType>,
    ) -> broadcast::Receiver<Event<serde_json::Value>> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        if event_type.is_match_all() {
            return self.match_all_sender.subscribe();
        }

        self.senders
            .entry(event_type)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    pub fn subscribe_all(&self) -> broadcast::Receiver<Event<serde_json::Value>> {
        self.match_all_sender.subscribe()
    }

    /// Register a synchronous listener for one event type
    ///
    /// The callback runs on the thread that fires the event. It may fire
    /// further events (the bus holds no locks while calling listeners).
    pub fn listen<F>(&self, event_type: impl Into<EventType>, callback: F) -> ListenerId
    where
        F: Fn(&Event<serde_json::Value>) + Send + Sync + 'static,
    {
        let event_type = event_type.into();
        let id = ListenerId(self.next_listener_id.fetch_add(1, Ordering::SeqCst));
        debug!(event_type = %event_type, listener = id.0, "Adding listener");

        self.listeners
            .entry(event_type)
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a listener; returns false if it was already gone
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut removed = false;
        for mut entry in self.listeners.iter_mut() {
            let before = entry.len();
            entry.retain(|(listener_id, _)| *listener_id != id);
            removed |= entry.len() != before;
        }
        self.listeners.retain(|_, listeners| !listeners.is_empty());
        if removed {
            debug!(listener = id.0, "Removed listener");
        }
        removed
    }

    /// Fire an event
    ///
    /// Delivery order: synchronous listeners for the event type and for
    /// `*`, then broadcast subscribers of the type, then `*` subscribers.
    pub fn fire(&self, event: Event<serde_json::Value>) {
        debug!(event_type = %event.event_type, "Firing event");

        for listener in self.listeners_for(&event.event_type) {
            listener(&event);
        }

        if let Some(sender) = self.senders.get(&event.event_type) {
            // No receivers is not an error
            let _ = sender.send(event.clone());
        }
        let _ = self.match_all_sender.send(event);
    }

    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        let data = serde_json::to_value(&data).unwrap_or_default();
        self.fire(Event::new(T::event_type(), data, context));
    }

    /// Number of registered synchronous listeners across all event types
    pub fn listener_count(&self) -> usize {
        self.listeners.iter().map(|entry| entry.len()).sum()
    }

    /// Snapshot the listeners to call so no map guard is held during callbacks
    fn listeners_for(&self, event_type: &EventType) -> Vec<Listener> {
        let mut selected = Vec::new();
        if let Some(listeners) = self.listeners.get(event_type) {
            selected.extend(listeners.iter().map(|(_, l)| Arc::clone(l)));
        }
        if !event_type.is_match_all() {
            if let Some(listeners) = self.listeners.get(&EventType::match_all()) {
                selected.extend(listeners.iter().map(|(_, l)| Arc::clone(l)));
            }
        }
        selected
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A broadcast receiver that yields only events whose data parses as `T`
pub struct TypedEventReceiver<T> {
    rx: broadcast::Receiver<Event<serde_json::Value>>,
    _phantom: std::marker::PhantomData<T>,
}

impl<T: EventData + serde::de::DeserializeOwned> TypedEventReceiver<T> {
    fn new(rx: broadcast::Receiver<Event<serde_json::Value>>) -> Self {
        Self {
            rx,
            _phantom: std::marker::PhantomData,
        }
    }

    /// Receive the next event whose payload deserializes as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            if let Ok(event) = self.rx.recv().await?.decode::<T>() {
                return Ok(event);
            }
        }
    }
}

pub type SharedEventBus = Arc<EventBus>;
