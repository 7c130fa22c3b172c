//! Events: bridge telemetry and integration notifications share one envelope

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Context;

/// Data with a fixed event type name
pub trait EventData: Clone + Send + Sync + 'static {
    fn event_type() -> &'static str;
}

/// Name of an event type, e.g. `xcomfort_room_power`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventType(String);

impl EventType {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self(event_type.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Envelope of everything carried on the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T = serde_json::Value> {
    pub event_type: EventType,
    pub data: T,
    pub time_fired: DateTime<Utc>,
    /// Context of the bridge message or tick that caused the event
    pub context: Context,
}

impl<T> Event<T> {
    pub fn new(event_type: impl Into<EventType>, data: T, context: Context) -> Self {
        Self {
            event_type: event_type.into(),
            data,
            time_fired: Utc::now(),
            context,
        }
    }

    /// Convert the data, keeping type, time and context
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Event<U>, E> {
        Ok(Event {
            event_type: self.event_type,
            data: f(self.data)?,
            time_fired: self.time_fired,
            context: self.context,
        })
    }
}

impl<T: EventData> Event<T> {
    pub fn typed(data: T, context: Context) -> Self {
        Self::new(T::event_type(), data, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RoomPowerData;

    #[test]
    fn test_try_map_keeps_envelope() {
        let event = Event::typed(
            RoomPowerData {
                room_id: "1".into(),
                power: Some(0.3),
            },
            Context::with_id("c1"),
        );
        let fired = event.time_fired;

        let json = event.try_map(serde_json::to_value).unwrap();
        assert_eq!(json.event_type.as_str(), "xcomfort_room_power");
        assert_eq!(json.data["power"], 0.3);
        assert_eq!(json.time_fired, fired);
        assert_eq!(json.context.id, "c1");

        let back: Event<RoomPowerData> = json.try_map(serde_json::from_value).unwrap();
        assert_eq!(back.data.room_id.as_str(), "1");
    }

    #[test]
    fn test_event_type_serializes_as_string() {
        let event_type = EventType::from("state_changed");
        assert_eq!(serde_json::to_string(&event_type).unwrap(), "\"state_changed\"");
        assert_eq!(event_type.to_string(), "state_changed");
    }
}
