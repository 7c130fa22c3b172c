//! Sensor entity descriptions
//!
//! Unique ids follow the scheme existing installations already have in
//! their registries, so they must not change:
//!
//! | sensor | unique id |
//! |---|---|
//! | room power | `energy_<room_id>` |
//! | room energy | `energy_kwh_<room_id>` |
//! | heater / light power | `power_<name>_<device_id>` |
//! | heater / light energy | `energy_<name>_<device_id>` |
//! | heater temperature | `temperature_<name>_<device_id>` |
//! | heater heating demand | `heating_demand_<name>_<device_id>` |

use std::collections::HashMap;

use serde_json::{json, Value};
use xcomfort_config::PowerEnergyOptions;
use xcomfort_core::{DeviceId, EntityId, RoomId};
use xcomfort_registry::DeviceRegistry;

/// What a sensor measures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorKind {
    Power,
    Energy,
    Temperature,
    HeatingDemand,
}

impl SensorKind {
    pub fn unit(&self) -> &'static str {
        match self {
            Self::Power => "W",
            Self::Energy => "kWh",
            Self::Temperature => "°C",
            Self::HeatingDemand => "%",
        }
    }

    pub fn device_class(&self) -> Option<&'static str> {
        match self {
            Self::Power => Some("power"),
            Self::Energy => Some("energy"),
            Self::Temperature => Some("temperature"),
            Self::HeatingDemand => None,
        }
    }

    pub fn state_class(&self) -> &'static str {
        match self {
            Self::Energy => "total_increasing",
            _ => "measurement",
        }
    }

    fn name_suffix(&self) -> &'static str {
        match self {
            Self::Power => "Power",
            Self::Energy => "Energy",
            Self::Temperature => "Temperature",
            Self::HeatingDemand => "Heating Demand",
        }
    }
}

/// The device a sensor reads from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SensorSource {
    Room(RoomId),
    Heater(DeviceId),
    Light(DeviceId),
}

impl SensorSource {
    /// Key the state store indexes the sensor's entities under
    pub fn device_key(&self) -> String {
        match self {
            Self::Room(id) => format!("room_{}", id),
            Self::Heater(id) => format!("heater_{}", id),
            Self::Light(id) => format!("light_{}", id),
        }
    }
}

/// A sensor unique id, the display name it derives from and what it measures
#[derive(Debug, Clone, PartialEq)]
pub struct SensorDescription {
    pub unique_id: String,
    pub name: String,
    pub kind: SensorKind,
    pub source: SensorSource,
}

impl SensorDescription {
    fn room(room_id: &RoomId, room_name: &str, kind: SensorKind) -> Self {
        let unique_id = match kind {
            SensorKind::Energy => format!("energy_kwh_{}", room_id),
            _ => format!("energy_{}", room_id),
        };
        Self {
            unique_id,
            name: format!("{} {}", room_name, kind.name_suffix()),
            kind,
            source: SensorSource::Room(room_id.clone()),
        }
    }

    fn device(source: SensorSource, device_name: &str, kind: SensorKind) -> Self {
        let device_id = match &source {
            SensorSource::Heater(id) | SensorSource::Light(id) => id.as_str(),
            SensorSource::Room(id) => id.as_str(),
        };
        let prefix = match kind {
            SensorKind::Power => "power",
            SensorKind::Energy => "energy",
            SensorKind::Temperature => "temperature",
            SensorKind::HeatingDemand => "heating_demand",
        };
        Self {
            unique_id: format!("{}_{}_{}", prefix, device_name, device_id),
            name: format!("{} {}", device_name, kind.name_suffix()),
            kind,
            source,
        }
    }
}

/// A registered sensor
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEntity {
    pub entity_id: EntityId,
    pub description: SensorDescription,
}

impl SensorEntity {
    pub fn unique_id(&self) -> &str {
        &self.description.unique_id
    }

    pub fn kind(&self) -> SensorKind {
        self.description.kind
    }

    pub fn source(&self) -> &SensorSource {
        &self.description.source
    }

    /// Static attributes published with every state
    pub fn attributes(&self) -> HashMap<String, Value> {
        let kind = self.description.kind;
        let mut attributes = HashMap::from([
            ("friendly_name".to_string(), json!(self.description.name)),
            ("unit_of_measurement".to_string(), json!(kind.unit())),
            ("state_class".to_string(), json!(kind.state_class())),
        ]);
        if let Some(device_class) = kind.device_class() {
            attributes.insert("device_class".to_string(), json!(device_class));
        }
        attributes
    }
}

/// Sensors the current options ask for, in registry order
pub fn describe_sensors(
    registry: &DeviceRegistry,
    options: &PowerEnergyOptions,
) -> Vec<SensorDescription> {
    let mut sensors = Vec::new();

    if options.add_room_power_sensors {
        for room in registry.rooms() {
            for kind in [SensorKind::Power, SensorKind::Energy] {
                sensors.push(SensorDescription::room(&room.room_id, &room.name, kind));
            }
        }
    }

    for heater in registry.heaters() {
        let mut kinds = vec![SensorKind::Temperature, SensorKind::HeatingDemand];
        if options.add_heater_power_sensors {
            kinds.extend([SensorKind::Power, SensorKind::Energy]);
        }
        for kind in kinds {
            let source = SensorSource::Heater(heater.device_id.clone());
            sensors.push(SensorDescription::device(source, &heater.name, kind));
        }
    }

    if options.add_light_power_sensors {
        for light in registry.lights() {
            for kind in [SensorKind::Power, SensorKind::Energy] {
                let source = SensorSource::Light(light.device_id.clone());
                sensors.push(SensorDescription::device(source, &light.name, kind));
            }
        }
    }

    sensors
}

/// Power/energy unique ids whose option is off, grouped by a log label
pub fn disabled_unique_ids(
    registry: &DeviceRegistry,
    options: &PowerEnergyOptions,
) -> Vec<(&'static str, Vec<String>)> {
    let power_energy = [SensorKind::Power, SensorKind::Energy];
    let mut disabled = Vec::new();

    if !options.add_room_power_sensors {
        let ids: Vec<String> = registry
            .rooms()
            .iter()
            .flat_map(|room| {
                power_energy.iter().map(move |kind| {
                    SensorDescription::room(&room.room_id, &room.name, *kind).unique_id
                })
            })
            .collect();
        disabled.push(("room power/energy", ids));
    }

    if !options.add_heater_power_sensors {
        let ids: Vec<String> = registry
            .heaters()
            .iter()
            .flat_map(|heater| {
                power_energy.iter().map(move |kind| {
                    let source = SensorSource::Heater(heater.device_id.clone());
                    SensorDescription::device(source, &heater.name, *kind).unique_id
                })
            })
            .collect();
        disabled.push(("heater power/energy", ids));
    }

    if !options.add_light_power_sensors {
        let ids: Vec<String> = registry
            .lights()
            .iter()
            .flat_map(|light| {
                power_energy.iter().map(move |kind| {
                    let source = SensorSource::Light(light.device_id.clone());
                    SensorDescription::device(source, &light.name, *kind).unique_id
                })
            })
            .collect();
        disabled.push(("light power/energy", ids));
    }

    disabled
}
