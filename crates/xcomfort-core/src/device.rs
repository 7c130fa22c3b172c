//! Device identities and the snapshot the bridge reports on connect

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bridge-assigned room identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RoomId(String);

/// Bridge-assigned device identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

macro_rules! string_id {
    ($ty:ident) => {
        impl $ty {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $ty {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }

        impl From<String> for $ty {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        // The bridge sends numeric ids; configuration files may quote them
        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                #[derive(Deserialize)]
                #[serde(untagged)]
                enum Raw {
                    Text(String),
                    Number(u64),
                }

                Ok(match Raw::deserialize(deserializer)? {
                    Raw::Text(s) => Self(s),
                    Raw::Number(n) => Self(n.to_string()),
                })
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(RoomId);
string_id!(DeviceId);

/// A room as reported by the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: RoomId,
    pub name: String,
    /// Last power reading in watts, if the room reports power
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
}

impl RoomInfo {
    pub fn new(room_id: impl Into<RoomId>, name: impl Into<String>) -> Self {
        Self {
            room_id: room_id.into(),
            name: name.into(),
            power: None,
        }
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = Some(power);
        self
    }
}

/// A heating actuator as reported by the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaterInfo {
    pub device_id: DeviceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
    /// Actuator temperature in °C
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Heating demand in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub heating_demand: Option<f64>,
}

impl HeaterInfo {
    pub fn new(device_id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name: name.into(),
            power: None,
            temperature: None,
            heating_demand: None,
        }
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = Some(power);
        self
    }
}

/// A light / dimmer actuator as reported by the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightInfo {
    pub device_id: DeviceId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub power: Option<f64>,
}

impl LightInfo {
    pub fn new(device_id: impl Into<DeviceId>, name: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            name: name.into(),
            power: None,
        }
    }
}

/// Everything the bridge reported on its initial load
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DevicesSnapshot {
    #[serde(default)]
    pub rooms: Vec<RoomInfo>,
    #[serde(default)]
    pub heaters: Vec<HeaterInfo>,
    #[serde(default)]
    pub lights: Vec<LightInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_json() {
        let snapshot: DevicesSnapshot = serde_json::from_value(serde_json::json!({
            "rooms": [{"room_id": "1", "name": "Stue", "power": 0.0}],
            "heaters": [{"device_id": "11", "name": "Panelovn Stue"}],
        }))
        .unwrap();

        assert_eq!(snapshot.rooms[0].room_id.as_str(), "1");
        assert_eq!(snapshot.rooms[0].power, Some(0.0));
        assert_eq!(snapshot.heaters[0].device_id, DeviceId::from("11"));
        assert_eq!(snapshot.heaters[0].power, None);
        assert!(snapshot.lights.is_empty());
    }

    #[test]
    fn test_numeric_ids() {
        let heater: HeaterInfo =
            serde_json::from_value(serde_json::json!({"device_id": 11, "name": "Panelovn Bad"}))
                .unwrap();
        assert_eq!(heater.device_id.as_str(), "11");
        assert_eq!(serde_json::to_value(&heater.device_id).unwrap(), "11");
    }
}
