//! Device and channel model for the vdcd bridge
//!
//! A [`Device`] is one addressable unit exposed to the controller. It owns
//! an ordered set of [`Channel`]s and decides when a value change is worth
//! forwarding: only an actual change reported through
//! [`Device::update_value`] reaches the controller.
//!
//! The device never owns the protocol client. It talks back through a weak
//! [`ChannelSink`] handle, and inbound values are delivered to adapters
//! through a [`ChannelMessageHandler`].

mod channel;
mod device;
mod sink;

pub use channel::Channel;
pub use device::Device;
pub use sink::{ChannelMessageHandler, ChannelSink};

use thiserror::Error;

/// Errors returned by device lookups
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("channel not found: {0}")]
    ChannelNotFound(String),

    #[error("sensor not found: {0}")]
    SensorNotFound(String),
}

/// Result type for device operations
pub type DeviceResult<T> = Result<T, DeviceError>;
