//! xComfort Bridge registries
//!
//! This crate provides:
//! - the device registry (rooms, heaters, lights and their latest readings)
//! - the entity registry (sensor unique_id → entity_id)
//! - JSON persistence in the `.storage/` directory with versioning
//! - the persisted energy totals of the sensor platform

pub mod storage;

pub mod devices;
pub mod energy;
pub mod entities;

pub use storage::{Storable, Storage, StorageError, StorageFile, StorageResult};

pub use devices::{DeviceRegistry, HeaterEntry, LightEntry, RoomEntry};

pub use energy::EnergySnapshot;

pub use entities::EntityRegistryData;

use std::sync::Arc;

/// Thread-safe wrapper for DeviceRegistry
pub type SharedDeviceRegistry = Arc<DeviceRegistry>;
