//! Core types for the xComfort Bridge integration
//!
//! This crate provides the fundamental types shared by every other crate in
//! the workspace: device identities and snapshots (rooms, heaters, lights),
//! the telemetry messages the bridge pushes, and the host-side EntityId,
//! State, Event and Context types sensors are published with.

mod context;
mod device;
mod entity_id;
mod event;
mod state;
mod telemetry;

pub use context::Context;
pub use device::{DeviceId, DevicesSnapshot, HeaterInfo, LightInfo, RoomId, RoomInfo};
pub use entity_id::{slugify, EntityId, EntityIdError};
pub use event::{Event, EventData, EventType};
pub use state::State;
pub use telemetry::{
    valid_watts, HeaterStateData, LightStateData, RoomPowerData, Telemetry, TelemetryError,
};

/// Integration domain
pub const DOMAIN: &str = "xcomfort_bridge";

/// Manufacturer reported for every device this integration creates
pub const MANUFACTURER: &str = "Eaton";

/// State value used when a sensor has no reading yet
pub const STATE_UNKNOWN: &str = "unknown";

/// Standard event types fired by the integration
pub mod events {
    use super::*;

    /// Event type for sensor state changes
    pub const STATE_CHANGED: &str = "state_changed";

    /// Event type fired when a heater's reported power is forced to zero
    pub const HEATER_POWER_SUPPRESSED: &str = "xcomfort_heater_power_suppressed";

    /// Event type fired when a suppressed heater reports unmodified power again
    pub const HEATER_POWER_RESTORED: &str = "xcomfort_heater_power_restored";

    /// Data for STATE_CHANGED events
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    pub struct StateChangedData {
        pub entity_id: EntityId,
        pub old_state: Option<State>,
        pub new_state: Option<State>,
    }

    impl EventData for StateChangedData {
        fn event_type() -> &'static str {
            STATE_CHANGED
        }
    }

    /// Data for HEATER_POWER_SUPPRESSED events
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    pub struct HeaterPowerSuppressedData {
        pub heater: String,
        pub room: String,
        /// Seconds the room had been at low power when suppression kicked in
        pub low_power_secs: u64,
    }

    impl EventData for HeaterPowerSuppressedData {
        fn event_type() -> &'static str {
            HEATER_POWER_SUPPRESSED
        }
    }

    /// Data for HEATER_POWER_RESTORED events
    #[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
    pub struct HeaterPowerRestoredData {
        pub heater: String,
        pub room: String,
    }

    impl EventData for HeaterPowerRestoredData {
        fn event_type() -> &'static str {
            HEATER_POWER_RESTORED
        }
    }
}
