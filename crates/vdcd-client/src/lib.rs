//! Protocol client for the vdcd external device API
//!
//! This crate provides [`VdcdClient`], the single persistent connection
//! between in-process devices and the controller. It is responsible for:
//! - Dialing the controller with a bounded, fixed-backoff retry budget
//! - Sending the init handshake exactly once per device
//! - Reading inbound lines on a background task and reconnecting on EOF
//! - Routing inbound channel messages to devices by tag
//! - Serializing every outbound message onto one shared writer

mod client;
mod config;
mod dispatch;
mod error;
mod registry;

pub use client::VdcdClient;
pub use config::{ClientConfig, DEFAULT_DIAL_BACKOFF, DEFAULT_DIAL_RETRIES, DEFAULT_PORT};
pub use error::{ClientError, ClientResult};
pub use registry::DeviceRegistry;

pub use vdcd_device::{Channel, ChannelMessageHandler, ChannelSink, Device, DeviceError};
