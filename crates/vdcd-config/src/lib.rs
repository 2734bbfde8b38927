//! Configuration for the vdcd bridge
//!
//! A [`BridgeConfig`] is read from a YAML file, then environment variables
//! override individual fields:
//!
//! - `VDCD_HOST`, `VDCD_PORT` - controller address
//! - `VDCD_MODEL_NAME`, `VDCD_VENDOR_NAME` - names stamped on devices
//! - `VDCD_DRY_MODE` - skip the init handshake
//! - `MQTT_HOST`, `MQTT_USERNAME`, `MQTT_PASSWORD` - broker connection
//!
//! # Example
//!
//! ```ignore
//! use vdcd_config::load_config;
//!
//! let mut config = load_config("bridge.yaml")?;
//! config.apply_env();
//! config.validate()?;
//! let client = vdcd_client::VdcdClient::new(config.client_config());
//! ```

mod bridge;
mod error;

pub use bridge::{load_config, BridgeConfig, MqttConfig};
pub use error::{ConfigError, ConfigResult};
