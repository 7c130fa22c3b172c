//! State type representing a sensor's current value

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Context, EntityId, STATE_UNKNOWN};

/// The state of a sensor entity at a point in time
///
/// The value is kept as a string the way the host stores it ("12.5",
/// "unknown"); numeric sensors read it back with [`State::as_f64`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct State {
    /// The entity this state belongs to
    pub entity_id: EntityId,

    /// The state value
    pub state: String,

    /// Unit, device class, friendly name and the like
    #[serde(default)]
    pub attributes: HashMap<String, serde_json::Value>,

    /// When the value last changed
    pub last_changed: DateTime<Utc>,

    /// When the state was last written, even with an unchanged value
    pub last_updated: DateTime<Utc>,

    /// Context of the write that produced this state
    pub context: Context,
}

impl State {
    /// Create a new state with current timestamp
    pub fn new(
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        Self {
            entity_id,
            state: state.into(),
            attributes,
            last_changed: now,
            last_updated: now,
            context,
        }
    }

    /// Create an updated state, preserving last_changed if the value is the same
    pub fn with_update(
        &self,
        new_state: impl Into<String>,
        new_attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> Self {
        let now = Utc::now();
        let new_state = new_state.into();
        let changed = self.state != new_state;

        Self {
            entity_id: self.entity_id.clone(),
            state: new_state,
            attributes: new_attributes,
            last_changed: if changed { now } else { self.last_changed },
            last_updated: now,
            context,
        }
    }

    /// Check if the sensor has no reading yet
    pub fn is_unknown(&self) -> bool {
        self.state == STATE_UNKNOWN
    }

    /// Parse the value as a number
    pub fn as_f64(&self) -> Option<f64> {
        self.state.parse().ok()
    }

    /// Get an attribute value by key
    pub fn attribute<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.attributes
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        // Timestamps and context are not compared
        self.entity_id == other.entity_id
            && self.state == other.state
            && self.attributes == other.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity() -> EntityId {
        "sensor.stue_power".parse().unwrap()
    }

    #[test]
    fn test_update_keeps_last_changed_for_same_value() {
        let state = State::new(entity(), "12.5", HashMap::new(), Context::new());
        let updated = state.with_update("12.5", HashMap::new(), Context::new());
        assert_eq!(updated.last_changed, state.last_changed);
        assert!(updated.last_updated >= state.last_updated);

        let changed = state.with_update("0.0", HashMap::new(), Context::new());
        assert!(changed.last_changed >= state.last_changed);
        assert_eq!(changed.as_f64(), Some(0.0));
    }

    #[test]
    fn test_unknown_and_attributes() {
        let mut attrs = HashMap::new();
        attrs.insert("unit_of_measurement".to_string(), serde_json::json!("W"));
        let state = State::new(entity(), STATE_UNKNOWN, attrs, Context::new());

        assert!(state.is_unknown());
        assert_eq!(state.as_f64(), None);
        assert_eq!(
            state.attribute::<String>("unit_of_measurement").as_deref(),
            Some("W")
        );
    }
}
