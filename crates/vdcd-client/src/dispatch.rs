//! Inbound message dispatch
//!
//! Only `channel` messages act on devices. Every other kind is logged so
//! adapters can see what the controller asked for.

use tracing::{debug, error, warn};
use vdcd_core::{InboundMessage, MessageKind};

use crate::registry::DeviceRegistry;

/// Decode one raw line and dispatch it
///
/// Malformed lines are logged and dropped.
pub(crate) fn handle_line(registry: &DeviceRegistry, line: &str) {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return;
    }

    match serde_json::from_str::<InboundMessage>(line) {
        Ok(message) => process_message(registry, &message),
        Err(e) => error!(error = %e, raw = %line, "Failed to decode vdcd message"),
    }
}

pub(crate) fn process_message(registry: &DeviceRegistry, message: &InboundMessage) {
    match message.kind {
        MessageKind::Channel => process_channel_message(registry, message),
        MessageKind::Status => debug!(
            status = %message.status,
            error_code = message.error_code,
            error_message = %message.error_message,
            "Status message"
        ),
        MessageKind::Move => debug!(
            tag = %message.tag,
            index = message.index,
            direction = message.direction,
            "Move message"
        ),
        MessageKind::Control => debug!(
            tag = %message.tag,
            name = %message.name,
            value = message.value,
            "Control message"
        ),
        MessageKind::Sync => debug!(tag = %message.tag, "Sync message"),
        MessageKind::SceneCommand => {
            debug!(tag = %message.tag, cmd = %message.cmd, "Scene command message")
        }
        MessageKind::SetConfiguration => debug!(
            tag = %message.tag,
            config_id = %message.config_id,
            "Set configuration message"
        ),
        MessageKind::InvokeAction => debug!(
            tag = %message.tag,
            params = ?message.params,
            "Invoke action message"
        ),
        MessageKind::SetProperty => debug!(
            tag = %message.tag,
            properties = ?message.properties,
            value = message.value,
            "Set property message"
        ),
        other => debug!(kind = %other, "Ignoring vdcd message"),
    }
}

fn process_channel_message(registry: &DeviceRegistry, message: &InboundMessage) {
    debug!(
        tag = %message.tag,
        channel = %message.channel_name,
        channel_type = u8::from(message.channel_type),
        value = message.value,
        index = message.index,
        "Channel message"
    );

    let Some(device) = registry.route(&message.tag) else {
        warn!(tag = %message.tag, "No device found for channel message");
        return;
    };

    match device.channel_message_handler() {
        Some(handler) => {
            debug!(unique_id = %device.unique_id(), "Calling channel message handler");
            handler.on_channel_message(message, &device);
        }
        None => debug!(unique_id = %device.unique_id(), "Device has no channel message handler"),
    }
}
