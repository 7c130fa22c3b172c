//! Configuration loading for the xComfort Bridge integration
//!
//! YAML is loaded with support for the custom tags:
//!
//! - `!include path` - Include another YAML file
//! - `!secret key` - Substitute from secrets.yaml
//! - `!env_var VAR` - Environment variable substitution
//!
//! and the `xcomfort_bridge:` section is parsed into [`XComfortConfig`].
//!
//! # Example
//!
//! ```ignore
//! use xcomfort_config::XComfortConfig;
//!
//! let config = XComfortConfig::load("/config")?;
//! if config.power_energy.heater_power_stale_protection {
//!     // ...
//! }
//! ```

mod error;
mod integration;
mod loader;
mod secrets;

pub use error::{ConfigError, ConfigResult};
pub use integration::{PowerEnergyOptions, XComfortConfig};
pub use loader::{load_yaml, YamlLoader};
pub use secrets::Secrets;

pub use serde_yaml::Value;
