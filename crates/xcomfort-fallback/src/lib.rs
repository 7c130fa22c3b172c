//! Stale heater power fallback for the xComfort Bridge integration
//!
//! - [`name`]: heater → room mapping by normalized name
//! - [`stale`]: the per-heater Normal / Pending / Suppressed state machine
//! - [`energy`]: kWh integration of a power level
//! - [`engine`]: the [`FallbackEngine`] combining the three

use std::time::Duration;

pub mod energy;
pub mod engine;
pub mod name;
pub mod stale;

#[cfg(test)]
mod log_capture;

pub use energy::EnergyAccumulator;
pub use engine::{FallbackEngine, HeaterOutput, StateChange, Trigger};
pub use name::{map_heater_to_room, normalize, normalize_room, HeaterRoomMapping, RoomMatch};
pub use stale::{StaleState, Transition};

/// Room power at or below this is treated as "nothing is heating"
pub const FALLBACK_POWER_THRESHOLD_W: f64 = 0.5;

/// How long the room must stay at low power before heater power is forced to 0
pub const FALLBACK_ZERO_WINDOW: Duration = Duration::from_secs(20);

/// Interval of the periodic re-evaluation
pub const FALLBACK_TICK_INTERVAL: Duration = Duration::from_secs(20);
