use vdcd_core::{ChannelDescriptor, ChannelType};

/// A named, typed value slot on a device
///
/// A fresh channel holds `0.0`, which is also what the controller assumes
/// before the first update.
#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub name: String,
    pub channel_type: ChannelType,
    pub value: f32,
}

impl Channel {
    pub fn new(name: impl Into<String>, channel_type: ChannelType) -> Self {
        Self {
            name: name.into(),
            channel_type,
            value: 0.0,
        }
    }

    pub fn descriptor(&self) -> ChannelDescriptor {
        ChannelDescriptor {
            id: self.name.clone(),
            channel_type: self.channel_type,
        }
    }
}
