//! xComfort Bridge integration configuration
//!
//! Parses the `xcomfort_bridge:` section from configuration.yaml

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::path::Path;
use tracing::debug;
use xcomfort_core::{DevicesSnapshot, DOMAIN};

use crate::error::{ConfigError, ConfigResult};
use crate::loader::load_yaml;

/// Power and energy sensor options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PowerEnergyOptions {
    /// Create power and energy sensors for every room
    #[serde(default = "default_true")]
    pub add_room_power_sensors: bool,

    /// Create power and energy sensors for every heater
    #[serde(default)]
    pub add_heater_power_sensors: bool,

    /// Create power and energy sensors for every light
    #[serde(default)]
    pub add_light_power_sensors: bool,

    /// Force heater power to zero when its room has reported ~0 W for a while
    #[serde(default)]
    pub heater_power_stale_protection: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PowerEnergyOptions {
    fn default() -> Self {
        Self {
            add_room_power_sensors: true,
            add_heater_power_sensors: false,
            add_light_power_sensors: false,
            heater_power_stale_protection: false,
        }
    }
}

/// The `xcomfort_bridge:` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct XComfortConfig {
    /// Name of this bridge, used as the hub's title
    #[serde(default = "default_identifier")]
    pub identifier: String,

    /// Bridge address
    pub ip_address: String,

    /// Bridge authentication key (usually a `!secret`)
    #[serde(default)]
    pub auth_key: Option<String>,

    #[serde(default)]
    pub power_energy: PowerEnergyOptions,

    /// Rooms and devices the bridge reported on its last load
    #[serde(default)]
    pub devices: DevicesSnapshot,
}

fn default_identifier() -> String {
    "xcomfort".to_string()
}

impl XComfortConfig {
    /// Load the integration configuration from a config directory
    pub fn load(config_dir: impl AsRef<Path>) -> ConfigResult<Self> {
        let yaml = load_yaml(config_dir.as_ref(), "configuration.yaml")?;
        Self::from_yaml(&yaml)
    }

    /// Parse the integration section of an already-loaded configuration
    pub fn from_yaml(yaml: &Value) -> ConfigResult<Self> {
        let mapping = yaml.as_mapping().ok_or_else(|| ConfigError::InvalidValue {
            key: "root".to_string(),
            reason: "configuration must be a mapping".to_string(),
        })?;

        let section = mapping
            .get(Value::String(DOMAIN.to_string()))
            .cloned()
            .ok_or_else(|| ConfigError::MissingSection {
                section: DOMAIN.to_string(),
            })?;

        let config: XComfortConfig =
            serde_yaml::from_value(section).map_err(|e| ConfigError::InvalidValue {
                key: DOMAIN.to_string(),
                reason: e.to_string(),
            })?;

        debug!(
            identifier = %config.identifier,
            rooms = config.devices.rooms.len(),
            heaters = config.devices.heaters.len(),
            lights = config.devices.lights.len(),
            "Parsed xcomfort_bridge configuration"
        );

        Ok(config)
    }

    /// Whether the heater stale-power fallback is enabled
    pub fn stale_protection(&self) -> bool {
        self.power_energy.heater_power_stale_protection
    }
}
