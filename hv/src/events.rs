//! Event bus for settings and registry changes
//!
//! The bus uses a tokio broadcast channel to deliver events to all
//! subscribers. The service layer emits an event whenever a mutation
//! actually changed stored settings; consumers (dashboards, template
//! refreshers) subscribe and recompute.

use tokio::sync::broadcast;
use tracing::debug;

/// Default channel capacity (events)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1_024;

/// What a settings mutation did to a stored entry
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SettingsAction {
    Update,
    Remove,
}

/// Events emitted when registries or settings change
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    /// The platform area registry was replaced
    AreaRegistryUpdated,
    /// Some settings registry changed; coarse signal for full refreshes
    SettingsChanged,
    /// Stored settings for one area changed
    AreaSettingsChanged {
        action: SettingsAction,
        area_id: String,
    },
    /// Stored settings for one entity changed
    EntitySettingsChanged {
        action: SettingsAction,
        entity_id: String,
    },
    /// Stored settings for one person changed
    PersonSettingsChanged {
        action: SettingsAction,
        person_id: String,
    },
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::AreaRegistryUpdated => "AreaRegistryUpdated",
            Event::SettingsChanged => "SettingsChanged",
            Event::AreaSettingsChanged { .. } => "AreaSettingsChanged",
            Event::EntitySettingsChanged { .. } => "EntitySettingsChanged",
            Event::PersonSettingsChanged { .. } => "PersonSettingsChanged",
        }
    }
}

/// Central event bus for settings activity
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    /// Create a new event bus with the given capacity
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "EventBus::new: creating event bus");
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Create a new event bus with default capacity
    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Emit an event to all subscribers
    ///
    /// Fire-and-forget: with no subscribers the event is dropped, and a
    /// full channel drops the oldest events.
    pub fn emit(&self, event: Event) {
        debug!(event_type = event.event_type(), "EventBus::emit");
        // Ignore send errors (no subscribers is OK)
        let _ = self.tx.send(event);
    }

    /// Subscribe to receive events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        debug!("EventBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}
