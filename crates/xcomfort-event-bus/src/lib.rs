//! Telemetry and notification bus for the xComfort Bridge integration
//!
//! Bridge telemetry (room power, heater and light states) enters the
//! integration through [`EventBus::publish_telemetry`]; the hub's actor task
//! consumes it with [`EventBus::subscribe_telemetry`]. The same bus carries
//! JSON notification events (state changes, suppression activations) that
//! any number of listeners can follow by event type.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn};
use xcomfort_core::{Context, Event, EventData, EventType, Telemetry};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus
pub struct EventBus {
    /// Map of event types to their broadcast senders
    listeners: DashMap<EventType, broadcast::Sender<Event<serde_json::Value>>>,
    /// Sender for subscribers of every JSON event
    match_all_sender: broadcast::Sender<Event<serde_json::Value>>,
    /// Typed telemetry stream
    telemetry_sender: broadcast::Sender<Event<Telemetry>>,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with specified channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        let (telemetry_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            telemetry_sender,
            capacity,
        }
    }

    /// Subscribe to JSON events of a specific type
    pub fn subscribe(
        &self,
        event_type: impl Into<EventType>,
    ) -> broadcast::Receiver<Event<serde_json::Value>> {
        let event_type = event_type.into();
        trace!(event_type = %event_type, "Subscribing to event type");

        self.listeners
            .entry(event_type)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to a typed event, receiving parsed data
    pub fn subscribe_typed<T: EventData + serde::de::DeserializeOwned>(
        &self,
    ) -> TypedEventReceiver<T> {
        TypedEventReceiver::new(self.subscribe(T::event_type()))
    }

    /// Subscribe to every JSON event
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event<serde_json::Value>> {
        self.match_all_sender.subscribe()
    }

    /// Subscribe to the typed telemetry stream
    pub fn subscribe_telemetry(&self) -> broadcast::Receiver<Event<Telemetry>> {
        self.telemetry_sender.subscribe()
    }

    /// Fire a JSON event to the subscribers of its type and to match-all subscribers
    pub fn fire(&self, event: Event<serde_json::Value>) {
        debug!(event_type = %event.event_type, "Firing event");

        if let Some(sender) = self.listeners.get(&event.event_type) {
            // Send errors only mean there is no active receiver
            let _ = sender.send(event.clone());
        }

        let _ = self.match_all_sender.send(event);
    }

    /// Fire a typed event
    pub fn fire_typed<T: EventData + serde::Serialize>(&self, data: T, context: Context) {
        match Event::typed(data, context).try_map(serde_json::to_value) {
            Ok(event) => self.fire(event),
            Err(e) => warn!(event_type = T::event_type(), "Cannot serialize event data: {}", e),
        }
    }

    /// Publish a bridge telemetry message
    ///
    /// The message goes to telemetry subscribers and is mirrored as a JSON
    /// event of the message's own type. Returns the number of telemetry
    /// subscribers that received it.
    pub fn publish_telemetry(&self, telemetry: Telemetry, context: Context) -> usize {
        let event_type = telemetry.event_type();
        trace!(event_type, "Publishing telemetry");

        let mirrored = match &telemetry {
            Telemetry::RoomPower(data) => serde_json::to_value(data),
            Telemetry::HeaterState(data) => serde_json::to_value(data),
            Telemetry::LightState(data) => serde_json::to_value(data),
        };
        if let Ok(data) = mirrored {
            self.fire(Event::new(event_type, data, context.clone()));
        }

        self.telemetry_sender
            .send(Event::new(event_type, telemetry, context))
            .unwrap_or(0)
    }

    /// Get the number of active event type subscriptions
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// A receiver for typed events
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

    /// Receive the next event whose data parses as `T`
    pub async fn recv(&mut self) -> Result<Event<T>, broadcast::error::RecvError> {
        loop {
            let event = self.rx.recv().await?;
            if let Ok(event) = event.try_map(serde_json::from_value::<T>) {
                return Ok(event);
            }
        }
    }

    /// Take the next already-delivered event, if any
    pub fn try_recv(&mut self) -> Option<Event<T>> {
        while let Ok(event) = self.rx.try_recv() {
            if let Ok(event) = event.try_map(serde_json::from_value::<T>) {
                return Some(event);
            }
        }
        None
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;
