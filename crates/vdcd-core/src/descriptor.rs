//! Static descriptors sent with the init handshake
//!
//! These describe the shape of a device to the controller. They are sent
//! once per device and never change afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::kinds::{
    ButtonElement, ButtonType, ChannelType, ColorClass, Group, InputType, OutputKind, SensorType,
    Usage,
};

fn is_zero_f32(value: &f32) -> bool {
    *value == 0.0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// A button exposed by a device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Button {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "buttonid", default)]
    pub button_id: u32,
    #[serde(rename = "buttontype", default)]
    pub button_type: ButtonType,
    #[serde(default)]
    pub element: ButtonElement,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub combinables: u32,
    #[serde(rename = "localbutton", default, skip_serializing_if = "is_false")]
    pub local_button: bool,
    #[serde(rename = "hardwarename", default, skip_serializing_if = "String::is_empty")]
    pub hardware_name: String,
}

/// A binary input exposed by a device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Input {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "inputtype", default)]
    pub input_type: InputType,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    #[serde(rename = "updateinterval", default, skip_serializing_if = "is_zero_f32")]
    pub update_interval: f32,
    #[serde(rename = "alivesignalinterval", default, skip_serializing_if = "is_zero_f32")]
    pub alive_signal_interval: f32,
    #[serde(rename = "hardwarename", default, skip_serializing_if = "String::is_empty")]
    pub hardware_name: String,
}

/// A sensor exposed by a device
///
/// Readings are later reported by sensor id, see the `sensor` message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(rename = "sensortype", default)]
    pub sensor_type: SensorType,
    #[serde(default)]
    pub usage: Usage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    #[serde(rename = "updateinterval", default, skip_serializing_if = "is_zero_f32")]
    pub update_interval: f32,
    #[serde(rename = "alivesignalinterval", default, skip_serializing_if = "is_zero_f32")]
    pub alive_signal_interval: f32,
    #[serde(rename = "changesonlyinterval", default, skip_serializing_if = "is_zero_f32")]
    pub changes_only_interval: f32,
    #[serde(rename = "hardwarename", default, skip_serializing_if = "String::is_empty")]
    pub hardware_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f32>,
}

/// Parameter of an action, or the value shape of a property
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Param {
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(rename = "siunit", default, skip_serializing_if = "String::is_empty")]
    pub si_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// A device action with its parameters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, Param>,
}

/// A standard action offered by the device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardAction {
    pub action: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub params: HashMap<String, Param>,
}

/// An action created at runtime by the device
pub type DynamicAction = StandardAction;

/// A named device configuration the controller can switch to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Description of a device state or event
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateDescriptor {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "type")]
    pub value_type: String,
    #[serde(rename = "siunit", default, skip_serializing_if = "String::is_empty")]
    pub si_unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Events share the state descriptor shape
pub type Event = StateDescriptor;

/// A device property, readable and possibly writable by the controller
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    #[serde(default, skip_serializing_if = "is_false")]
    pub readonly: bool,
    #[serde(flatten)]
    pub value: Param,
}

/// Static description of one channel, without its value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
}

/// Full static description of a device as announced in its init message
///
/// Empty fields are left off the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    #[serde(rename = "uniqueid", default, skip_serializing_if = "String::is_empty")]
    pub unique_id: String,
    #[serde(rename = "subdeviceindex", default, skip_serializing_if = "is_zero_u32")]
    pub sub_device_index: u32,
    #[serde(rename = "colorclass", default, skip_serializing_if = "Option::is_none")]
    pub color_class: Option<ColorClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputKind>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,
    #[serde(rename = "endcontacts", default, skip_serializing_if = "is_false")]
    pub end_contacts: bool,
    #[serde(rename = "move", default, skip_serializing_if = "is_false")]
    pub supports_move: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub sync: bool,
    #[serde(rename = "controlvalues", default, skip_serializing_if = "is_false")]
    pub control_values: bool,
    #[serde(rename = "scenecommands", default, skip_serializing_if = "is_false")]
    pub scene_commands: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<u8>,
    #[serde(rename = "hardwarename", default, skip_serializing_if = "String::is_empty")]
    pub hardware_name: String,
    #[serde(rename = "modelname", default, skip_serializing_if = "String::is_empty")]
    pub model_name: String,
    #[serde(rename = "modelversion", default, skip_serializing_if = "String::is_empty")]
    pub model_version: String,
    #[serde(rename = "vendorname", default, skip_serializing_if = "String::is_empty")]
    pub vendor_name: String,
    #[serde(rename = "oemmodelguid", default, skip_serializing_if = "String::is_empty")]
    pub oem_model_guid: String,
    #[serde(rename = "iconname", default, skip_serializing_if = "String::is_empty")]
    pub icon_name: String,
    #[serde(rename = "configurl", default, skip_serializing_if = "String::is_empty")]
    pub config_url: String,
    #[serde(rename = "typeidentifier", default, skip_serializing_if = "String::is_empty")]
    pub type_identifier: String,
    #[serde(rename = "deviceclass", default, skip_serializing_if = "String::is_empty")]
    pub device_class: String,
    #[serde(rename = "deviceclassversion", default, skip_serializing_if = "is_zero_u32")]
    pub device_class_version: u32,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub buttons: Vec<Button>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inputs: Vec<Input>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sensors: Vec<Sensor>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub configurations: HashMap<String, Configuration>,
    #[serde(rename = "currentconfigid", default, skip_serializing_if = "String::is_empty")]
    pub current_config_id: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub actions: HashMap<String, Action>,
    #[serde(rename = "dynamicactions", default, skip_serializing_if = "HashMap::is_empty")]
    pub dynamic_actions: HashMap<String, DynamicAction>,
    #[serde(rename = "standardactions", default, skip_serializing_if = "HashMap::is_empty")]
    pub standard_actions: HashMap<String, StandardAction>,
    #[serde(rename = "autoaddstandardactions", default, skip_serializing_if = "is_false")]
    pub auto_add_standard_actions: bool,
    #[serde(rename = "noconfirmaction", default, skip_serializing_if = "is_false")]
    pub no_confirm_action: bool,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub states: HashMap<String, StateDescriptor>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub events: HashMap<String, Event>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub properties: HashMap<String, Property>,
}
