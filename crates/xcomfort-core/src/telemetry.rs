//! Telemetry messages pushed by the bridge

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{DeviceId, EventData, RoomId};

/// Errors decoding a telemetry message
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("malformed telemetry message: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Room power reading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPowerData {
    pub room_id: RoomId,
    /// Watts; `None` when the room stopped reporting power
    pub power: Option<f64>,
}

impl EventData for RoomPowerData {
    fn event_type() -> &'static str {
        "xcomfort_room_power"
    }
}

/// Heating actuator state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaterStateData {
    pub device_id: DeviceId,
    #[serde(default)]
    pub power: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub heating_demand: Option<f64>,
}

impl EventData for HeaterStateData {
    fn event_type() -> &'static str {
        "xcomfort_heater_state"
    }
}

/// Light / dimmer state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightStateData {
    pub device_id: DeviceId,
    #[serde(default)]
    pub switch: Option<bool>,
    #[serde(default)]
    pub dim_value: Option<u8>,
    #[serde(default)]
    pub power: Option<f64>,
}

impl EventData for LightStateData {
    fn event_type() -> &'static str {
        "xcomfort_light_state"
    }
}

/// One message from the bridge, as a tagged JSON object:
///
/// ```json
/// {"type": "room_power", "room_id": "1", "power": 0.0}
/// {"type": "heater_state", "device_id": "11", "power": 950.0, "temperature": 22.5}
/// {"type": "light_state", "device_id": "21", "switch": true, "power": 7.5}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Telemetry {
    RoomPower(RoomPowerData),
    HeaterState(HeaterStateData),
    LightState(LightStateData),
}

impl Telemetry {
    /// Decode a single JSON message
    pub fn from_json(line: &str) -> Result<Self, TelemetryError> {
        Ok(serde_json::from_str(line)?)
    }

    pub fn room_power(room_id: impl Into<RoomId>, power: f64) -> Self {
        Self::RoomPower(RoomPowerData {
            room_id: room_id.into(),
            power: Some(power),
        })
    }

    pub fn heater_power(device_id: impl Into<DeviceId>, power: f64) -> Self {
        Self::HeaterState(HeaterStateData {
            device_id: device_id.into(),
            power: Some(power),
            temperature: None,
            heating_demand: None,
        })
    }

    pub fn light_power(device_id: impl Into<DeviceId>, power: f64) -> Self {
        Self::LightState(LightStateData {
            device_id: device_id.into(),
            switch: Some(power > 0.0),
            dim_value: None,
            power: Some(power),
        })
    }

    /// Event type string of the carried data
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RoomPower(_) => RoomPowerData::event_type(),
            Self::HeaterState(_) => HeaterStateData::event_type(),
            Self::LightState(_) => LightStateData::event_type(),
        }
    }
}

/// Accept a power reading only if it is a finite, non-negative number of watts
pub fn valid_watts(power: Option<f64>) -> Option<f64> {
    power.filter(|w| w.is_finite() && *w >= 0.0)
}
