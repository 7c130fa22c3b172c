//! Device Registry
//!
//! Tracks the rooms, heaters and lights the bridge reported, together with
//! their latest telemetry readings. The fallback tick reads room power from
//! here, so every lookup is an in-memory map access.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, info, trace};
use xcomfort_core::{
    valid_watts, DeviceId, DevicesSnapshot, HeaterInfo, HeaterStateData, LightInfo,
    LightStateData, RoomId, RoomInfo,
};

/// A room with its cached power reading
#[derive(Debug, Clone, PartialEq)]
pub struct RoomEntry {
    pub room_id: RoomId,
    pub name: String,
    pub power: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
    insertion_order: u64,
}

impl RoomEntry {
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.room_id.clone(),
            name: self.name.clone(),
            power: self.power,
        }
    }
}

/// A heater with its cached readings
#[derive(Debug, Clone, PartialEq)]
pub struct HeaterEntry {
    pub device_id: DeviceId,
    pub name: String,
    /// Raw power as reported by the device, before any fallback
    pub power: Option<f64>,
    pub temperature: Option<f64>,
    pub heating_demand: Option<f64>,
    pub last_updated: Option<DateTime<Utc>>,
    insertion_order: u64,
}

impl HeaterEntry {
    pub fn info(&self) -> HeaterInfo {
        HeaterInfo {
            device_id: self.device_id.clone(),
            name: self.name.clone(),
            power: self.power,
            temperature: self.temperature,
            heating_demand: self.heating_demand,
        }
    }
}

/// A light or dimmer with its cached readings
#[derive(Debug, Clone, PartialEq)]
pub struct LightEntry {
    pub device_id: DeviceId,
    pub name: String,
    pub power: Option<f64>,
    pub switch: Option<bool>,
    pub dim_value: Option<u8>,
    pub last_updated: Option<DateTime<Utc>>,
    insertion_order: u64,
}

impl LightEntry {
    pub fn info(&self) -> LightInfo {
        LightInfo {
            device_id: self.device_id.clone(),
            name: self.name.clone(),
            power: self.power,
        }
    }
}

/// Bridge device registry
///
/// Listing methods return entries in the order the bridge first reported
/// them. Re-adding a known id replaces the entry in place.
pub struct DeviceRegistry {
    rooms: DashMap<RoomId, RoomEntry>,
    heaters: DashMap<DeviceId, HeaterEntry>,
    lights: DashMap<DeviceId, LightEntry>,

    insertion_counter: AtomicU64,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            heaters: DashMap::new(),
            lights: DashMap::new(),
            insertion_counter: AtomicU64::new(0),
        }
    }

    /// Create a registry holding a bridge snapshot
    pub fn from_snapshot(snapshot: &DevicesSnapshot) -> Self {
        let registry = Self::new();
        registry.load_snapshot(snapshot);
        registry
    }

    /// Replace the registry contents with a bridge snapshot
    pub fn load_snapshot(&self, snapshot: &DevicesSnapshot) {
        self.clear();

        for room in &snapshot.rooms {
            self.add_room(room.clone());
        }
        for heater in &snapshot.heaters {
            self.add_heater(heater.clone());
        }
        for light in &snapshot.lights {
            self.add_light(light.clone());
        }

        info!(
            "Loaded {} rooms, {} heaters and {} lights",
            self.rooms.len(),
            self.heaters.len(),
            self.lights.len()
        );
    }

    fn next_order(&self) -> u64 {
        self.insertion_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a room, replacing any room with the same id
    pub fn add_room(&self, room: RoomInfo) {
        let insertion_order = match self.rooms.get(&room.room_id) {
            Some(previous) => {
                debug!("Replacing room {} ({})", room.room_id, previous.name);
                previous.insertion_order
            }
            None => self.next_order(),
        };
        let entry = RoomEntry {
            room_id: room.room_id.clone(),
            name: room.name,
            power: valid_watts(room.power),
            last_updated: None,
            insertion_order,
        };
        self.rooms.insert(room.room_id, entry);
    }

    /// Register a heater, replacing any heater with the same id
    pub fn add_heater(&self, heater: HeaterInfo) {
        let insertion_order = match self.heaters.get(&heater.device_id) {
            Some(previous) => {
                debug!("Replacing heater {} ({})", heater.device_id, previous.name);
                previous.insertion_order
            }
            None => self.next_order(),
        };
        let entry = HeaterEntry {
            device_id: heater.device_id.clone(),
            name: heater.name,
            power: valid_watts(heater.power),
            temperature: heater.temperature,
            heating_demand: heater.heating_demand,
            last_updated: None,
            insertion_order,
        };
        self.heaters.insert(heater.device_id, entry);
    }

    pub fn add_light(&self, light: LightInfo) {
        let insertion_order = self
            .lights
            .get(&light.device_id)
            .map(|previous| previous.insertion_order)
            .unwrap_or_else(|| self.next_order());
        let entry = LightEntry {
            device_id: light.device_id.clone(),
            name: light.name,
            power: valid_watts(light.power),
            switch: None,
            dim_value: None,
            last_updated: None,
            insertion_order,
        };
        self.lights.insert(light.device_id, entry);
    }

    /// Cache a room power reading
    ///
    /// Returns the accepted watts; unknown rooms and non-finite or negative
    /// readings are ignored and leave the cached value untouched.
    pub fn update_room_power(&self, room_id: &RoomId, power: Option<f64>) -> Option<f64> {
        let watts = valid_watts(power)?;
        let mut room = self.rooms.get_mut(room_id)?;
        room.power = Some(watts);
        room.last_updated = Some(Utc::now());
        trace!(room = %room.name, watts, "Room power updated");
        Some(watts)
    }

    /// Cache a heater state; absent or invalid fields keep their previous value
    pub fn update_heater(&self, data: &HeaterStateData) -> Option<HeaterEntry> {
        let mut heater = self.heaters.get_mut(&data.device_id)?;
        if let Some(watts) = valid_watts(data.power) {
            heater.power = Some(watts);
        }
        if let Some(temperature) = data.temperature.filter(|t| t.is_finite()) {
            heater.temperature = Some(temperature);
        }
        if let Some(demand) = data.heating_demand.filter(|d| d.is_finite()) {
            heater.heating_demand = Some(demand);
        }
        heater.last_updated = Some(Utc::now());
        Some(heater.clone())
    }

    /// Cache a light state; absent or invalid fields keep their previous value
    pub fn update_light(&self, data: &LightStateData) -> Option<LightEntry> {
        let mut light = self.lights.get_mut(&data.device_id)?;
        if let Some(watts) = valid_watts(data.power) {
            light.power = Some(watts);
        }
        if data.switch.is_some() {
            light.switch = data.switch;
        }
        if data.dim_value.is_some() {
            light.dim_value = data.dim_value;
        }
        light.last_updated = Some(Utc::now());
        Some(light.clone())
    }

    pub fn room(&self, room_id: &RoomId) -> Option<RoomEntry> {
        self.rooms.get(room_id).map(|r| r.clone())
    }

    pub fn heater(&self, device_id: &DeviceId) -> Option<HeaterEntry> {
        self.heaters.get(device_id).map(|h| h.clone())
    }

    pub fn light(&self, device_id: &DeviceId) -> Option<LightEntry> {
        self.lights.get(device_id).map(|l| l.clone())
    }

    /// All rooms in registry order
    pub fn rooms(&self) -> Vec<RoomEntry> {
        let mut rooms: Vec<_> = self.rooms.iter().map(|r| r.value().clone()).collect();
        rooms.sort_by_key(|r| r.insertion_order);
        rooms
    }

    /// All heaters in registry order
    pub fn heaters(&self) -> Vec<HeaterEntry> {
        let mut heaters: Vec<_> = self.heaters.iter().map(|h| h.value().clone()).collect();
        heaters.sort_by_key(|h| h.insertion_order);
        heaters
    }

    /// All lights in registry order
    pub fn lights(&self) -> Vec<LightEntry> {
        let mut lights: Vec<_> = self.lights.iter().map(|l| l.value().clone()).collect();
        lights.sort_by_key(|l| l.insertion_order);
        lights
    }

    /// Current contents as a snapshot, with cached readings
    pub fn snapshot(&self) -> DevicesSnapshot {
        DevicesSnapshot {
            rooms: self.rooms().iter().map(RoomEntry::info).collect(),
            heaters: self.heaters().iter().map(HeaterEntry::info).collect(),
            lights: self.lights().iter().map(LightEntry::info).collect(),
        }
    }

    pub fn clear(&self) {
        self.rooms.clear();
        self.heaters.clear();
        self.lights.clear();
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn heater_count(&self) -> usize {
        self.heaters.len()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
