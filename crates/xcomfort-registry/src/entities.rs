//! Entity Registry
//!
//! Remembers which entity_id each sensor unique_id was given, so entity ids
//! stay stable across reloads and sensors removed by an options change can
//! still be found.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use xcomfort_core::{EntityId, EntityIdError};

use crate::storage::Storable;

/// Storage key for the entity registry
pub const STORAGE_KEY: &str = "xcomfort_bridge.entities";
pub const STORAGE_VERSION: u32 = 1;
pub const STORAGE_MINOR_VERSION: u32 = 1;

/// unique_id → entity_id, in registration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityRegistryData {
    #[serde(default)]
    pub entities: IndexMap<String, EntityId>,
}

impl Storable for EntityRegistryData {
    const KEY: &'static str = STORAGE_KEY;
    const VERSION: u32 = STORAGE_VERSION;
    const MINOR_VERSION: u32 = STORAGE_MINOR_VERSION;
}

impl EntityRegistryData {
    pub fn get(&self, unique_id: &str) -> Option<&EntityId> {
        self.entities.get(unique_id)
    }

    /// Entity id registered for `unique_id`, registering a new one if needed
    ///
    /// New ids are derived from `name`; if that entity_id is taken, `_2`,
    /// `_3`, etc. are appended until an available one is found.
    pub fn get_or_create(
        &mut self,
        domain: &str,
        unique_id: &str,
        name: &str,
    ) -> Result<EntityId, EntityIdError> {
        if let Some(existing) = self.entities.get(unique_id) {
            return Ok(existing.clone());
        }

        let preferred = EntityId::from_name(domain, name)?;
        let mut entity_id = preferred.clone();
        let mut tries = 1;
        while self.is_registered(&entity_id) {
            tries += 1;
            entity_id = EntityId::new(domain, format!("{}_{}", preferred.object_id(), tries))?;
        }

        debug!("Registered {} for unique_id {}", entity_id, unique_id);
        self.entities.insert(unique_id.to_string(), entity_id.clone());
        Ok(entity_id)
    }

    /// Forget a unique_id, returning the entity_id it had
    pub fn remove(&mut self, unique_id: &str) -> Option<EntityId> {
        self.entities.shift_remove(unique_id)
    }

    pub fn is_registered(&self, entity_id: &EntityId) -> bool {
        self.entities.values().any(|e| e == entity_id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
