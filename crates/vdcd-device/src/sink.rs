use async_trait::async_trait;
use std::sync::Arc;
use vdcd_core::{ChannelType, InboundMessage};

use crate::Device;

/// Outbound side of a device, implemented by the protocol client
///
/// Devices hold this as a weak handle. Once the client is gone every
/// outbound call on the device becomes a no-op.
#[async_trait]
pub trait ChannelSink: Send + Sync {
    /// Model name stamped on devices created against this sink
    fn model_name(&self) -> &str;

    /// Vendor name stamped on devices created against this sink
    fn vendor_name(&self) -> &str;

    /// Report `value` as the new value of `channel_name` on `device`
    async fn send_channel_update(
        &self,
        device: &Device,
        channel_name: &str,
        value: f32,
        channel_type: ChannelType,
    );

    /// Report a sensor reading
    async fn send_sensor_value(&self, value: f32, tag: &str, sensor_id: &str, index: u32);

    /// Report a button event
    async fn send_button_value(&self, value: f32, tag: &str, index: u32);
}

/// Reaction of an adapter to a value set by the controller
///
/// Invoked synchronously on the dispatch loop, so implementations that need
/// to do I/O should hand the work off to their own task.
pub trait ChannelMessageHandler: Send + Sync {
    fn on_channel_message(&self, message: &InboundMessage, device: &Arc<Device>);
}

impl<F> ChannelMessageHandler for F
where
    F: Fn(&InboundMessage, &Arc<Device>) + Send + Sync,
{
    fn on_channel_message(&self, message: &InboundMessage, device: &Arc<Device>) {
        self(message, device)
    }
}
