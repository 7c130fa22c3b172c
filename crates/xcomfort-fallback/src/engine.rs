//! Stale heater power fallback
//!
//! Some heaters keep reporting their last "on" power after they switch off.
//! The room's own power meter does not have that problem, so when a heater's
//! room has been at (near) zero for [`FALLBACK_ZERO_WINDOW`] the heater's
//! power is forced to zero and its energy stops accumulating.
//!
//! The engine has no interior locking: every method takes `&mut self` and
//! the caller drives it from a single task, which serializes telemetry and
//! periodic ticks.
//!
//! [`FALLBACK_ZERO_WINDOW`]: crate::FALLBACK_ZERO_WINDOW

use std::collections::HashMap;
use std::time::Duration;

use indexmap::IndexMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use xcomfort_core::{valid_watts, DeviceId, HeaterInfo, RoomId, RoomInfo};

use crate::energy::EnergyAccumulator;
use crate::name::HeaterRoomMapping;
use crate::stale::{StaleState, Transition};

/// What caused a heater to be re-evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// A new room power reading arrived
    Sample,
    /// The periodic check re-read the room's last known power
    Periodic,
}

/// A heater state change, reported back to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct StateChange {
    pub device_id: DeviceId,
    pub heater: String,
    pub room: String,
    pub transition: Transition,
    pub trigger: Trigger,
}

/// Values the sensor platform shows for a heater
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterOutput {
    /// `None` until the heater has reported power
    pub power_w: Option<f64>,
    pub energy_kwh: f64,
    pub suppressed: bool,
}

#[derive(Debug, Clone)]
struct HeaterRecord {
    name: String,
    raw_power: Option<f64>,
    state: StaleState,
    energy: EnergyAccumulator,
}

impl HeaterRecord {
    fn effective_power(&self) -> f64 {
        if self.state.is_suppressed() {
            0.0
        } else {
            self.raw_power.unwrap_or(0.0)
        }
    }

    fn output(&self) -> HeaterOutput {
        let suppressed = self.state.is_suppressed();
        HeaterOutput {
            power_w: if suppressed { Some(0.0) } else { self.raw_power },
            energy_kwh: self.energy.total_kwh(),
            suppressed,
        }
    }
}

/// Heater power/energy with stale power suppression
pub struct FallbackEngine {
    enabled: bool,
    mapping: HeaterRoomMapping,
    heaters: IndexMap<DeviceId, HeaterRecord>,
    room_power: HashMap<RoomId, f64>,
}

impl FallbackEngine {
    /// Create the engine for the current devices
    ///
    /// When `enabled`, the heater → room mapping is computed and logged.
    /// When disabled, heater power and energy pass through unmodified.
    pub fn new(heaters: &[HeaterInfo], rooms: &[RoomInfo], enabled: bool, now: Instant) -> Self {
        let mapping = if enabled {
            let mapping = HeaterRoomMapping::build(heaters, rooms);
            mapping.log();
            mapping
        } else {
            debug!("Heater power stale protection disabled");
            HeaterRoomMapping::default()
        };

        let heaters = heaters
            .iter()
            .map(|heater| {
                let raw_power = valid_watts(heater.power);
                let mut energy = EnergyAccumulator::new(now);
                energy.advance(now, raw_power.unwrap_or(0.0));
                (
                    heater.device_id.clone(),
                    HeaterRecord {
                        name: heater.name.clone(),
                        raw_power,
                        state: StaleState::Normal,
                        energy,
                    },
                )
            })
            .collect();

        let room_power = rooms
            .iter()
            .filter_map(|room| Some((room.room_id.clone(), valid_watts(room.power)?)))
            .collect();

        Self {
            enabled,
            mapping,
            heaters,
            room_power,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn mapping(&self) -> &HeaterRoomMapping {
        &self.mapping
    }

    /// Record a room power reading and re-evaluate the room's heaters
    ///
    /// Non-finite or negative readings are ignored.
    pub fn on_room_power(&mut self, room_id: &RoomId, watts: f64, now: Instant) -> Vec<StateChange> {
        let Some(watts) = valid_watts(Some(watts)) else {
            debug!(room_id = %room_id, watts, "Ignoring malformed room power reading");
            return Vec::new();
        };
        self.room_power.insert(room_id.clone(), watts);

        if !self.enabled {
            return Vec::new();
        }

        let device_ids: Vec<DeviceId> = self.mapping.heaters_in_room(room_id).cloned().collect();
        device_ids
            .iter()
            .filter_map(|device_id| self.evaluate(device_id, watts, now, Trigger::Sample))
            .collect()
    }

    /// Record a heater's raw power reading
    ///
    /// Returns the heater's output after the update, or `None` when the
    /// heater is unknown or the reading is malformed.
    pub fn on_heater_power(
        &mut self,
        device_id: &DeviceId,
        watts: f64,
        now: Instant,
    ) -> Option<HeaterOutput> {
        let Some(watts) = valid_watts(Some(watts)) else {
            debug!(device_id = %device_id, watts, "Ignoring malformed heater power reading");
            return None;
        };

        let record = self.heaters.get_mut(device_id)?;
        record.raw_power = Some(watts);
        let effective = record.effective_power();
        record.energy.advance(now, effective);
        Some(record.output())
    }

    /// Periodic re-evaluation of every mapped heater
    ///
    /// Uses each room's last known power, so heaters get re-classified even
    /// when nothing new was reported. Energy totals are brought up to `now`.
    pub fn tick(&mut self, now: Instant) -> Vec<StateChange> {
        let mut changes = Vec::new();

        if self.enabled {
            let mapped: Vec<(DeviceId, RoomId)> = self
                .mapping
                .iter()
                .filter_map(|(device_id, entry)| {
                    Some((device_id.clone(), entry.room.as_ref()?.room_id.clone()))
                })
                .collect();

            for (device_id, room_id) in mapped {
                let Some(watts) = self.room_power.get(&room_id).copied() else {
                    continue;
                };
                if let Some(change) = self.evaluate(&device_id, watts, now, Trigger::Periodic) {
                    changes.push(change);
                }
            }
        }

        for record in self.heaters.values_mut() {
            let effective = record.effective_power();
            record.energy.advance(now, effective);
        }

        changes
    }

    fn evaluate(
        &mut self,
        device_id: &DeviceId,
        room_watts: f64,
        now: Instant,
        trigger: Trigger,
    ) -> Option<StateChange> {
        let room = self.mapping.room_for(device_id)?.room_name.clone();
        let record = self.heaters.get_mut(device_id)?;
        let transition = record.state.evaluate(room_watts, now)?;

        match transition {
            Transition::Suppressed { low_power_for } => {
                record.energy.advance(now, 0.0);
                warn!(
                    "Forcing heater power to 0 due to room reporting 0 for {}s: room={} heater={} prev_power={:.1}{}",
                    low_power_for.as_secs(),
                    room,
                    record.name,
                    record.raw_power.unwrap_or(0.0),
                    if trigger == Trigger::Periodic { " (periodic check)" } else { "" }
                );
            }
            Transition::Restored => {
                record.energy.advance(now, record.raw_power.unwrap_or(0.0));
                info!(
                    "Heater power reporting resumed: room={} heater={} room_power={:.1}",
                    room, record.name, room_watts
                );
            }
            Transition::Pending | Transition::Cleared => {
                debug!(heater = %record.name, room = %room, ?transition, "Stale state changed");
            }
        }

        Some(StateChange {
            device_id: device_id.clone(),
            heater: record.name.clone(),
            room,
            transition,
            trigger,
        })
    }

    /// Current values for a heater
    pub fn heater_output(&self, device_id: &DeviceId) -> Option<HeaterOutput> {
        self.heaters.get(device_id).map(HeaterRecord::output)
    }

    /// Seed a heater's energy total, e.g. from persisted state
    pub fn restore_energy(&mut self, device_id: &DeviceId, kwh: f64) -> bool {
        if !(kwh.is_finite() && kwh >= 0.0) {
            return false;
        }
        match self.heaters.get_mut(device_id) {
            Some(record) => {
                record.energy.set_total(kwh);
                true
            }
            None => false,
        }
    }

    pub fn stale_state(&self, device_id: &DeviceId) -> Option<StaleState> {
        self.heaters.get(device_id).map(|r| r.state)
    }

    /// Last known power of a room
    pub fn room_power(&self, room_id: &RoomId) -> Option<f64> {
        self.room_power.get(room_id).copied()
    }

    /// Heater ids in registry order
    pub fn heater_ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.heaters.keys()
    }

    /// How long a heater's room has been at low power, if it is
    pub fn low_power_for(&self, device_id: &DeviceId, now: Instant) -> Option<Duration> {
        let since = self.heaters.get(device_id)?.state.below_threshold_since()?;
        Some(now.saturating_duration_since(since))
    }
}
