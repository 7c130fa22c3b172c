//! xComfort Bridge hub
//!
//! Wires the device registry, the sensor platform and the stale heater power
//! fallback together behind a setup / unload / reload lifecycle.

pub mod error;
pub mod hub;
pub mod state;
mod update;

pub use error::{HubError, HubResult};
pub use hub::XComfortHub;
pub use state::{HubState, InvalidTransition};
