//! Inbound envelope and outbound messages

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::descriptor::DeviceDescriptor;
use crate::kinds::ChannelType;
use crate::PROTOCOL_JSON;

/// Value of the `message` discriminator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageKind {
    #[serde(rename = "init")]
    Init,
    #[serde(rename = "bye")]
    Bye,
    #[serde(rename = "channel")]
    Channel,
    #[serde(rename = "sensor")]
    Sensor,
    #[serde(rename = "button")]
    Button,
    #[serde(rename = "status")]
    Status,
    #[serde(rename = "move")]
    Move,
    #[serde(rename = "control")]
    Control,
    #[serde(rename = "sync")]
    Sync,
    #[serde(rename = "scenecommand")]
    SceneCommand,
    #[serde(rename = "setConfiguration")]
    SetConfiguration,
    #[serde(rename = "invokeAction")]
    InvokeAction,
    #[serde(rename = "setProperty")]
    SetProperty,
    #[default]
    #[serde(other)]
    Unknown,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Init => "init",
            MessageKind::Bye => "bye",
            MessageKind::Channel => "channel",
            MessageKind::Sensor => "sensor",
            MessageKind::Button => "button",
            MessageKind::Status => "status",
            MessageKind::Move => "move",
            MessageKind::Control => "control",
            MessageKind::Sync => "sync",
            MessageKind::SceneCommand => "scenecommand",
            MessageKind::SetConfiguration => "setConfiguration",
            MessageKind::InvokeAction => "invokeAction",
            MessageKind::SetProperty => "setProperty",
            MessageKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn lenient_channel_type<'de, D>(deserializer: D) -> Result<ChannelType, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<u64>::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| u8::try_from(value).ok())
        .map(ChannelType::from_wire_lenient)
        .unwrap_or_default())
}

/// Generic envelope every line from the controller decodes into
///
/// All fields are optional on the wire; which of them carry meaning
/// depends on [`InboundMessage::kind`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "message", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub tag: String,
    #[serde(rename = "id", default)]
    pub channel_name: String,
    #[serde(default)]
    pub value: f32,
    #[serde(rename = "type", default, deserialize_with = "lenient_channel_type")]
    pub channel_type: ChannelType,
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub text: String,

    // status
    #[serde(default)]
    pub status: String,
    #[serde(rename = "errorcode", default)]
    pub error_code: i32,
    #[serde(rename = "errordomain", default)]
    pub error_domain: String,
    #[serde(rename = "errormessage", default)]
    pub error_message: String,

    // move / control / sync / scenecommand
    #[serde(default)]
    pub dimming: bool,
    #[serde(default)]
    pub direction: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sync: bool,
    #[serde(default)]
    pub cmd: String,

    // setConfiguration / invokeAction / setProperty
    #[serde(rename = "configid", default)]
    pub config_id: String,
    #[serde(default)]
    pub params: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub properties: HashMap<String, serde_json::Value>,
}

/// Init handshake for a single device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitPayload {
    pub protocol: String,
    #[serde(flatten)]
    pub device: DeviceDescriptor,
}

/// A channel value reported to the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelUpdate {
    pub tag: String,
    pub id: String,
    pub value: f32,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
}

/// A sensor reading reported to the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub tag: String,
    pub id: String,
    pub value: f32,
    pub index: u32,
}

/// A button press reported to the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonEvent {
    pub tag: String,
    pub value: f32,
    pub index: u32,
}

/// Messages sent from the bridge to the controller
///
/// A batched init is sent as a JSON array of `Init` messages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "message", rename_all = "lowercase")]
pub enum OutboundMessage {
    Init(InitPayload),
    Bye,
    Channel(ChannelUpdate),
    Sensor(SensorReading),
    Button(ButtonEvent),
}

impl OutboundMessage {
    pub fn init(device: DeviceDescriptor) -> Self {
        OutboundMessage::Init(InitPayload {
            protocol: PROTOCOL_JSON.to_string(),
            device,
        })
    }

    pub fn channel(
        tag: impl Into<String>,
        id: impl Into<String>,
        value: f32,
        channel_type: ChannelType,
    ) -> Self {
        OutboundMessage::Channel(ChannelUpdate {
            tag: tag.into(),
            id: id.into(),
            value,
            channel_type,
        })
    }

    pub fn sensor(tag: impl Into<String>, id: impl Into<String>, value: f32, index: u32) -> Self {
        OutboundMessage::Sensor(SensorReading {
            tag: tag.into(),
            id: id.into(),
            value,
            index,
        })
    }

    pub fn button(tag: impl Into<String>, value: f32, index: u32) -> Self {
        OutboundMessage::Button(ButtonEvent {
            tag: tag.into(),
            value,
            index,
        })
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            OutboundMessage::Init(_) => MessageKind::Init,
            OutboundMessage::Bye => MessageKind::Bye,
            OutboundMessage::Channel(_) => MessageKind::Channel,
            OutboundMessage::Sensor(_) => MessageKind::Sensor,
            OutboundMessage::Button(_) => MessageKind::Button,
        }
    }
}
