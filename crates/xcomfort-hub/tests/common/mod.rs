//! Common test utilities for the hub integration tests

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use xcomfort_config::{PowerEnergyOptions, XComfortConfig};
use xcomfort_core::{Context, DevicesSnapshot, HeaterInfo, RoomInfo, Telemetry};
use xcomfort_event_bus::{EventBus, SharedEventBus};
use xcomfort_hub::XComfortHub;
use xcomfort_state_store::{SharedStateStore, StateStore};

/// An isolated bridge with its own config directory, bus and state store
pub struct TestBridge {
    pub dir: TempDir,
    pub bus: SharedEventBus,
    pub states: SharedStateStore,
    pub config: XComfortConfig,
}

impl TestBridge {
    pub fn new(devices: DevicesSnapshot, power_energy: PowerEnergyOptions) -> Self {
        let bus = Arc::new(EventBus::new());
        let states = Arc::new(StateStore::new(bus.clone()));

        Self {
            dir: TempDir::new().expect("temp dir"),
            bus,
            states,
            config: XComfortConfig {
                identifier: "test".to_string(),
                ip_address: "192.0.2.1".to_string(),
                auth_key: None,
                power_energy,
                devices,
            },
        }
    }

    /// Stue and Bad, one heater in each
    pub fn two_rooms() -> Self {
        Self::new(
            DevicesSnapshot {
                rooms: vec![RoomInfo::new("1", "Stue"), RoomInfo::new("2", "Bad")],
                heaters: vec![
                    HeaterInfo::new("11", "Panelovn Stue"),
                    HeaterInfo::new("12", "Varmekabel Bad"),
                ],
                lights: vec![],
            },
            protected(),
        )
    }

    pub fn hub(&self) -> XComfortHub {
        XComfortHub::new(
            &self.config,
            self.dir.path(),
            self.bus.clone(),
            self.states.clone(),
        )
    }

    pub fn send(&self, telemetry: Telemetry) -> usize {
        self.bus.publish_telemetry(telemetry, Context::new())
    }

    pub fn value(&self, entity_id: &str) -> Option<f64> {
        self.states.get_f64(entity_id)
    }
}

/// Heater power sensors and stale protection on
pub fn protected() -> PowerEnergyOptions {
    PowerEnergyOptions {
        add_room_power_sensors: true,
        add_heater_power_sensors: true,
        add_light_power_sensors: false,
        heater_power_stale_protection: true,
    }
}

/// Let the update task catch up; advances the paused clock by `ms`
pub async fn settle(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
