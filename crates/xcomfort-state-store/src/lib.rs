//! Current sensor values for the xComfort Bridge integration
//!
//! The StateStore is where the sensor platform publishes values and where
//! readers (automations, the CLI, tests) read them. Every write replaces the
//! entity's state in one map insert, so a reader sees either the previous or
//! the new value, never a partial update. Writes fire STATE_CHANGED events.

use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, trace};
use xcomfort_core::events::StateChangedData;
use xcomfort_core::{Context, EntityId, State};
use xcomfort_event_bus::EventBus;

/// Sensor states keyed by entity_id, indexed by owning device
pub struct StateStore {
    /// All entity states keyed by entity_id string
    states: DashMap<String, State>,
    /// Index of entity_ids by device key (e.g. `heater_11`, `room_1`)
    device_index: DashMap<String, Vec<String>>,
    /// Event bus for firing state change events
    event_bus: Arc<EventBus>,
}

impl StateStore {
    /// Create a new state store with the given event bus
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            states: DashMap::new(),
            device_index: DashMap::new(),
            event_bus,
        }
    }

    /// Set the state of an entity
    ///
    /// `last_changed` only moves when the value actually changed. Fires a
    /// STATE_CHANGED event with the old and new state.
    #[instrument(skip(self, state, attributes, context), fields(entity_id = %entity_id))]
    pub fn set(
        &self,
        entity_id: EntityId,
        state: impl Into<String>,
        attributes: HashMap<String, serde_json::Value>,
        context: Context,
    ) -> State {
        let key = entity_id.to_string();
        let old_state = self.states.get(&key).map(|s| s.clone());

        let new_state = match &old_state {
            Some(existing) => existing.with_update(state, attributes, context.clone()),
            None => State::new(entity_id.clone(), state, attributes, context.clone()),
        };

        trace!(
            state = %new_state.state,
            changed = old_state.as_ref().map(|s| s.state != new_state.state).unwrap_or(true),
            "Setting sensor state"
        );

        self.states.insert(key, new_state.clone());

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

    /// Associate an entity with the device it belongs to
    pub fn link_device(&self, device_key: &str, entity_id: &EntityId) {
        let key = entity_id.to_string();
        let mut ids = self.device_index.entry(device_key.to_string()).or_default();
        if !ids.contains(&key) {
            ids.push(key);
        }
    }

    /// Get the current state of an entity
    pub fn get(&self, entity_id: &str) -> Option<State> {
        self.states.get(entity_id).map(|s| s.clone())
    }

    /// Get the state value as a string
    pub fn get_state(&self, entity_id: &str) -> Option<String> {
        self.states.get(entity_id).map(|s| s.state.clone())
    }

    /// Get the state value as a number, `None` if missing or not numeric
    pub fn get_f64(&self, entity_id: &str) -> Option<f64> {
        self.states.get(entity_id).and_then(|s| s.as_f64())
    }

    /// Get all entity IDs belonging to a device
    pub fn entity_ids_for_device(&self, device_key: &str) -> Vec<String> {
        self.device_index
            .get(device_key)
            .map(|v| v.clone())
            .unwrap_or_default()
    }

    /// Get all entity IDs
    pub fn all_entity_ids(&self) -> Vec<String> {
        self.states.iter().map(|r| r.key().clone()).collect()
    }

    /// Get all states
    pub fn all(&self) -> Vec<State> {
        self.states.iter().map(|r| r.value().clone()).collect()
    }

    /// Remove an entity's state
    ///
    /// Fires a STATE_CHANGED event with `new_state: None`.
    #[instrument(skip(self, context), fields(entity_id = %entity_id))]
    pub fn remove(&self, entity_id: &EntityId, context: Context) -> Option<State> {
        let key = entity_id.to_string();
        let old_state = self.states.remove(&key).map(|(_, s)| s);

        if let Some(ref state) = old_state {
            debug!("Removing sensor state");

            for mut ids in self.device_index.iter_mut() {
                ids.retain(|id| id != &key);
            }

            self.event_bus.fire_typed(
                StateChangedData {
                    entity_id: entity_id.clone(),
                    old_state: Some(state.clone()),
                    new_state: None,
                },
                context,
            );
        }

        old_state
    }

    /// Get the total number of entities
    pub fn entity_count(&self) -> usize {
        self.states.len()
    }
}

/// Thread-safe wrapper for StateStore
pub type SharedStateStore = Arc<StateStore>;
