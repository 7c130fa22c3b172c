//! Sensor platform of the xComfort Bridge integration
//!
//! Rooms get power and energy sensors, heaters get power, energy,
//! temperature and heating demand sensors, and lights get power and energy
//! sensors. Which power/energy sensors exist is controlled by
//! [`PowerEnergyOptions`](xcomfort_config::PowerEnergyOptions).

pub mod entity;
pub mod platform;

pub use entity::{
    describe_sensors, disabled_unique_ids, SensorDescription, SensorEntity, SensorKind,
    SensorSource,
};
pub use platform::{round_energy, SensorPlatform};
