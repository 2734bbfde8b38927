//! Core types for the vdcd external device protocol
//!
//! This crate provides the wire vocabulary shared by the protocol client
//! and the device model: classification enums, static descriptors sent
//! with the init handshake, and the inbound/outbound message types.
//!
//! Every message on the wire is a single JSON object (or, for a batched
//! init, a JSON array of objects) terminated by `\r\n`.

mod descriptor;
mod kinds;
mod message;

pub use descriptor::{
    Action, Button, ChannelDescriptor, Configuration, DeviceDescriptor, DynamicAction, Event,
    Input, Param, Property, Sensor, StandardAction, StateDescriptor,
};
pub use kinds::{
    ButtonElement, ButtonType, ChannelType, ColorClass, Group, InputType, OutputKind, SensorType,
    Usage, WireEnumError,
};
pub use message::{
    ButtonEvent, ChannelUpdate, InboundMessage, InitPayload, MessageKind, OutboundMessage,
    SensorReading,
};

/// Protocol flavour announced in every init message
pub const PROTOCOL_JSON: &str = "json";

/// Line terminator appended to every outbound message
pub const LINE_TERMINATOR: &str = "\r\n";

/// Well-known channel names used on the wire
pub mod channels {
    /// On/off channel present on every light
    pub const BASIC_SWITCH: &str = "basic_switch";

    /// Brightness in percent (0-100)
    pub const BRIGHTNESS: &str = "brightness";

    /// Hue in degrees (0-360)
    pub const HUE: &str = "hue";

    /// Saturation in percent (0-100)
    pub const SATURATION: &str = "saturation";

    /// Color temperature in mired
    pub const COLOR_TEMPERATURE: &str = "colortemp";
}
