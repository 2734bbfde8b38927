use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, warn};
use vdcd_core::{
    channels, Button, ButtonElement, ButtonType, ChannelType, ColorClass, DeviceDescriptor, Group,
    Input, OutputKind, Sensor,
};

use crate::{Channel, ChannelMessageHandler, ChannelSink, DeviceError, DeviceResult};

/// One logical controllable unit exposed to the controller
///
/// Static shape (identity, classification, buttons, sensors, inputs) is
/// fixed once the device is shared. Tag, channel values, the init flag and
/// the message handler are interior state and may change afterwards.
pub struct Device {
    descriptor: DeviceDescriptor,
    tag: RwLock<String>,
    channels: RwLock<Vec<Channel>>,
    init_done: AtomicBool,
    /// Held from storing a changed value until it has been reported
    updates: AsyncMutex<()>,
    handler: RwLock<Option<Arc<dyn ChannelMessageHandler>>>,
    sink: Option<Weak<dyn ChannelSink>>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("unique_id", &self.descriptor.unique_id)
            .field("tag", &self.tag())
            .field("output", &self.descriptor.output)
            .field("init_done", &self.is_init_done())
            .finish_non_exhaustive()
    }
}

impl Device {
    /// Create a device with basic output and no channels
    ///
    /// Model and vendor name default to the ones configured on `sink`.
    pub fn new<S: ChannelSink + 'static>(sink: &Arc<S>, unique_id: impl Into<String>) -> Self {
        let descriptor = DeviceDescriptor {
            unique_id: unique_id.into(),
            output: Some(OutputKind::Basic),
            model_name: sink.model_name().to_string(),
            vendor_name: sink.vendor_name().to_string(),
            ..Default::default()
        };
        let sink: Arc<dyn ChannelSink> = sink.clone();
        Self::from_descriptor(descriptor, Some(Arc::downgrade(&sink)))
    }

    /// Create a device from a prepared descriptor
    ///
    /// Channels listed in the descriptor become live channels with a zero
    /// value. A device without a sink never emits anything.
    pub fn from_descriptor(
        mut descriptor: DeviceDescriptor,
        sink: Option<Weak<dyn ChannelSink>>,
    ) -> Self {
        let tag = std::mem::take(&mut descriptor.tag);
        let channels = descriptor
            .channels
            .drain(..)
            .map(|c| Channel::new(c.id, c.channel_type))
            .collect();

        Self {
            descriptor,
            tag: RwLock::new(tag),
            channels: RwLock::new(channels),
            init_done: AtomicBool::new(false),
            updates: AsyncMutex::new(()),
            handler: RwLock::new(None),
            sink,
        }
    }

    /// Create a light with an on/off channel, plus brightness when dimmable
    pub fn new_light<S: ChannelSink + 'static>(
        sink: &Arc<S>,
        unique_id: impl Into<String>,
        dimmable: bool,
    ) -> Self {
        let mut device = Self::new_light_kind(sink, unique_id, OutputKind::Light);
        if dimmable {
            device.add_channel(channels::BRIGHTNESS, ChannelType::Brightness);
        }
        device
    }

    /// Create a full color light
    pub fn new_color_light<S: ChannelSink + 'static>(
        sink: &Arc<S>,
        unique_id: impl Into<String>,
    ) -> Self {
        let mut device = Self::new_light_kind(sink, unique_id, OutputKind::ColorLight);
        device.add_channel(channels::BRIGHTNESS, ChannelType::Brightness);
        device.add_channel(channels::HUE, ChannelType::Hue);
        device.add_channel(channels::SATURATION, ChannelType::Saturation);
        device.add_channel(channels::COLOR_TEMPERATURE, ChannelType::ColorTemperature);
        device
    }

    /// Create a color temperature light
    pub fn new_ct_light<S: ChannelSink + 'static>(
        sink: &Arc<S>,
        unique_id: impl Into<String>,
    ) -> Self {
        let mut device = Self::new_light_kind(sink, unique_id, OutputKind::CtLight);
        device.add_channel(channels::BRIGHTNESS, ChannelType::Brightness);
        device.add_channel(channels::COLOR_TEMPERATURE, ChannelType::ColorTemperature);
        device
    }

    /// Create an input-only device with a single push button
    pub fn new_button<S: ChannelSink + 'static>(
        sink: &Arc<S>,
        unique_id: impl Into<String>,
    ) -> Self {
        let mut device = Self::new(sink, unique_id);
        device.descriptor.output = None;
        device.add_button(Button {
            id: "button".to_string(),
            button_type: ButtonType::Single,
            element: ButtonElement::Center,
            group: Some(Group::YellowLight),
            ..Default::default()
        });
        device
    }

    fn new_light_kind<S: ChannelSink + 'static>(
        sink: &Arc<S>,
        unique_id: impl Into<String>,
        output: OutputKind,
    ) -> Self {
        let mut device = Self::new(sink, unique_id);
        device.descriptor.output = Some(output);
        device.descriptor.group = Some(Group::YellowLight);
        device.descriptor.color_class = Some(ColorClass::Yellow);
        device.add_channel(channels::BASIC_SWITCH, ChannelType::Undefined);
        device
    }

    pub fn unique_id(&self) -> &str {
        &self.descriptor.unique_id
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn output(&self) -> Option<OutputKind> {
        self.descriptor.output
    }

    pub fn sub_device_index(&self) -> u32 {
        self.descriptor.sub_device_index
    }

    pub fn buttons(&self) -> &[Button] {
        &self.descriptor.buttons
    }

    pub fn sensors(&self) -> &[Sensor] {
        &self.descriptor.sensors
    }

    pub fn inputs(&self) -> &[Input] {
        &self.descriptor.inputs
    }

    /// Static descriptor, without tag and channels
    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    /// Mutable access to the static descriptor before the device is shared
    pub fn descriptor_mut(&mut self) -> &mut DeviceDescriptor {
        &mut self.descriptor
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.descriptor.name = name.into();
    }

    pub fn set_sub_device_index(&mut self, index: u32) {
        self.descriptor.sub_device_index = index;
    }

    pub fn add_channel(&mut self, name: impl Into<String>, channel_type: ChannelType) {
        self.channels_mut().push(Channel::new(name, channel_type));
    }

    pub fn add_button(&mut self, button: Button) {
        self.descriptor.buttons.push(button);
    }

    pub fn add_sensor(&mut self, sensor: Sensor) {
        self.descriptor.sensors.push(sensor);
    }

    pub fn add_input(&mut self, input: Input) {
        self.descriptor.inputs.push(input);
    }

    fn channels_mut(&mut self) -> &mut Vec<Channel> {
        self.channels
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn tag(&self) -> String {
        self.tag
            .read()
            .map(|t| t.clone())
            .unwrap_or_default()
    }

    pub fn set_tag(&self, tag: impl Into<String>) {
        let mut current = self.tag.write().unwrap_or_else(PoisonError::into_inner);
        *current = tag.into();
    }

    /// Snapshot of all channels in insertion order
    pub fn channels(&self) -> Vec<Channel> {
        self.channels
            .read()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Current value of a channel
    ///
    /// With duplicate names the first channel wins.
    pub fn get_value(&self, channel_name: &str) -> DeviceResult<f32> {
        let channels = self.channels.read().unwrap_or_else(PoisonError::into_inner);
        channels
            .iter()
            .find(|c| c.name == channel_name)
            .map(|c| c.value)
            .ok_or_else(|| DeviceError::ChannelNotFound(channel_name.to_string()))
    }

    /// Overwrite a channel value without notifying the controller
    ///
    /// Returns `false` when the channel does not exist.
    pub fn set_value(&self, value: f32, channel_name: &str) -> bool {
        let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
        match channels.iter_mut().find(|c| c.name == channel_name) {
            Some(channel) => {
                channel.value = value;
                true
            }
            None => {
                warn!(
                    unique_id = %self.descriptor.unique_id,
                    channel = %channel_name,
                    "Channel not found, value not set"
                );
                false
            }
        }
    }

    /// Store a new channel value and report it to the controller
    ///
    /// Nothing is stored or sent when `value` equals the stored value. The
    /// comparison is exact, so values that went through a lossy unit
    /// conversion may still count as a change. Returns whether the value
    /// changed.
    ///
    /// Concurrent updates are reported one at a time in the order they were
    /// stored, each with its own value.
    pub async fn update_value(&self, value: f32, channel_name: &str, channel_type: ChannelType) -> bool {
        let _update = self.updates.lock().await;
        let changed = {
            let mut channels = self.channels.write().unwrap_or_else(PoisonError::into_inner);
            match channels.iter_mut().find(|c| c.name == channel_name) {
                Some(channel) if channel.value != value => {
                    channel.value = value;
                    true
                }
                Some(_) => false,
                None => {
                    warn!(
                        unique_id = %self.descriptor.unique_id,
                        channel = %channel_name,
                        "Channel not found, update ignored"
                    );
                    return false;
                }
            }
        };

        if !changed {
            debug!(
                unique_id = %self.descriptor.unique_id,
                channel = %channel_name,
                value,
                "Value unchanged, not sending update"
            );
            return false;
        }

        if let Some(sink) = self.sink() {
            sink.send_channel_update(self, channel_name, value, channel_type)
                .await;
        }
        true
    }

    /// Report a reading for the sensor with id `sensor_id`
    ///
    /// The sensor index on the wire is its position in the sensor list.
    /// Returns `Ok(false)` while the device is not initialized.
    pub async fn update_sensor_value(&self, sensor_id: &str, value: f32) -> DeviceResult<bool> {
        let index = self
            .descriptor
            .sensors
            .iter()
            .position(|s| s.id == sensor_id)
            .ok_or_else(|| DeviceError::SensorNotFound(sensor_id.to_string()))?;

        if !self.is_init_done() {
            debug!(unique_id = %self.descriptor.unique_id, sensor = %sensor_id, "Device not initialized, sensor value dropped");
            return Ok(false);
        }

        let Some(sink) = self.sink() else {
            return Ok(false);
        };
        sink.send_sensor_value(value, &self.tag(), sensor_id, index as u32)
            .await;
        Ok(true)
    }

    /// Report a button event for the button at `index`
    pub async fn press_button(&self, index: u32, value: f32) -> bool {
        if !self.is_init_done() {
            debug!(unique_id = %self.descriptor.unique_id, index, "Device not initialized, button event dropped");
            return false;
        }

        match self.sink() {
            Some(sink) => {
                sink.send_button_value(value, &self.tag(), index).await;
                true
            }
            None => false,
        }
    }

    fn sink(&self) -> Option<Arc<dyn ChannelSink>> {
        self.sink.as_ref().and_then(Weak::upgrade)
    }

    pub fn is_init_done(&self) -> bool {
        self.init_done.load(Ordering::Acquire)
    }

    /// Mark the device as initialized; this never resets
    pub fn set_init_done(&self) {
        self.init_done.store(true, Ordering::Release);
    }

    /// Claim the device for its init message
    ///
    /// Returns `true` for exactly one caller over the lifetime of the device.
    pub fn try_begin_init(&self) -> bool {
        self.init_done
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Descriptor sent in the init message, with the current tag and the
    /// channel layout filled in
    pub fn init_descriptor(&self) -> DeviceDescriptor {
        let mut descriptor = self.descriptor.clone();
        descriptor.tag = self.tag();
        descriptor.channels = self.channels().iter().map(Channel::descriptor).collect();
        descriptor
    }

    pub fn set_channel_message_handler(&self, handler: impl ChannelMessageHandler + 'static) {
        let mut current = self.handler.write().unwrap_or_else(PoisonError::into_inner);
        *current = Some(Arc::new(handler));
    }

    pub fn channel_message_handler(&self) -> Option<Arc<dyn ChannelMessageHandler>> {
        self.handler
            .read()
            .map(|h| h.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use vdcd_core::{InboundMessage, SensorType};

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Channel { tag: String, name: String, value: f32 },
        Sensor { tag: String, id: String, value: f32, index: u32 },
        Button { tag: String, value: f32, index: u32 },
    }

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<Sent>>,
    }

    impl RecordingSink {
        fn sent(&self) -> Vec<Sent> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChannelSink for RecordingSink {
        fn model_name(&self) -> &str {
            "test-model"
        }

        fn vendor_name(&self) -> &str {
            "test-vendor"
        }

        async fn send_channel_update(
            &self,
            device: &Device,
            channel_name: &str,
            value: f32,
            _channel_type: ChannelType,
        ) {
            // Yield so concurrent updaters get a chance to interleave
            tokio::task::yield_now().await;
            self.sent.lock().unwrap().push(Sent::Channel {
                tag: device.tag(),
                name: channel_name.to_string(),
                value,
            });
        }

        async fn send_sensor_value(&self, value: f32, tag: &str, sensor_id: &str, index: u32) {
            self.sent.lock().unwrap().push(Sent::Sensor {
                tag: tag.to_string(),
                id: sensor_id.to_string(),
                value,
                index,
            });
        }

        async fn send_button_value(&self, value: f32, tag: &str, index: u32) {
            self.sent.lock().unwrap().push(Sent::Button {
                tag: tag.to_string(),
                value,
                index,
            });
        }
    }

    fn channel_names(device: &Device) -> Vec<String> {
        device.channels().into_iter().map(|c| c.name).collect()
    }

    #[test]
    fn test_constructors_pick_channels() {
        let sink = Arc::new(RecordingSink::default());

        let basic = Device::new(&sink, "basic");
        assert_eq!(basic.output(), Some(OutputKind::Basic));
        assert!(basic.channels().is_empty());
        assert_eq!(basic.descriptor().model_name, "test-model");
        assert_eq!(basic.descriptor().vendor_name, "test-vendor");

        let plain = Device::new_light(&sink, "plain", false);
        assert_eq!(plain.output(), Some(OutputKind::Light));
        assert_eq!(channel_names(&plain), vec!["basic_switch"]);

        let dimmable = Device::new_light(&sink, "dim", true);
        assert_eq!(channel_names(&dimmable), vec!["basic_switch", "brightness"]);

        let color = Device::new_color_light(&sink, "rgb");
        assert_eq!(color.output(), Some(OutputKind::ColorLight));
        assert_eq!(
            channel_names(&color),
            vec!["basic_switch", "brightness", "hue", "saturation", "colortemp"]
        );

        let ct = Device::new_ct_light(&sink, "ct");
        assert_eq!(ct.output(), Some(OutputKind::CtLight));
        assert_eq!(channel_names(&ct), vec!["basic_switch", "brightness", "colortemp"]);

        let button = Device::new_button(&sink, "btn");
        assert_eq!(button.output(), None);
        assert!(button.channels().is_empty());
        assert_eq!(button.buttons().len(), 1);
        assert_eq!(button.buttons()[0].button_type, ButtonType::Single);
    }

    #[test]
    fn test_get_and_set_value() {
        let sink = Arc::new(RecordingSink::default());
        let device = Device::new_light(&sink, "dim", true);

        assert_eq!(device.get_value("brightness"), Ok(0.0));
        assert!(device.set_value(55.0, "brightness"));
        assert_eq!(device.get_value("brightness"), Ok(55.0));

        assert!(!device.set_value(1.0, "hue"));
        assert_eq!(
            device.get_value("hue"),
            Err(DeviceError::ChannelNotFound("hue".to_string()))
        );
        assert!(sink.sent().is_empty());
    }

    #[test]
    fn test_duplicate_channel_first_wins() {
        let sink = Arc::new(RecordingSink::default());
        let mut device = Device::new(&sink, "dup");
        device.add_channel("level", ChannelType::Brightness);
        device.add_channel("level", ChannelType::Hue);

        device.set_value(10.0, "level");
        let channels = device.channels();
        assert_eq!(channels[0].value, 10.0);
        assert_eq!(channels[1].value, 0.0);
    }

    #[tokio::test]
    async fn test_update_value_sends_only_on_change() {
        let sink = Arc::new(RecordingSink::default());
        let device = Device::new_light(&sink, "dim", true);
        device.set_tag("dim");

        assert!(device.update_value(42.0, "brightness", ChannelType::Brightness).await);
        assert!(!device.update_value(42.0, "brightness", ChannelType::Brightness).await);
        assert!(device.update_value(43.0, "brightness", ChannelType::Brightness).await);

        assert_eq!(
            sink.sent(),
            vec![
                Sent::Channel { tag: "dim".to_string(), name: "brightness".to_string(), value: 42.0 },
                Sent::Channel { tag: "dim".to_string(), name: "brightness".to_string(), value: 43.0 },
            ]
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_report_every_value_once() {
        let sink = Arc::new(RecordingSink::default());
        let device = Arc::new(Device::new_light(&sink, "dim", true));

        let tasks: Vec<_> = (1..=20)
            .map(|i| {
                let device = Arc::clone(&device);
                tokio::spawn(async move {
                    device
                        .update_value(i as f32, "brightness", ChannelType::Brightness)
                        .await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        let values: Vec<f32> = sink
            .sent()
            .into_iter()
            .filter_map(|sent| match sent {
                Sent::Channel { value, .. } => Some(value),
                _ => None,
            })
            .collect();
        assert_eq!(values.len(), 20);

        let mut distinct = values.clone();
        distinct.sort_by(|a, b| a.partial_cmp(b).unwrap());
        distinct.dedup();
        assert_eq!(distinct.len(), 20);

        assert_eq!(values.last().copied(), Some(device.get_value("brightness").unwrap()));
    }

    #[tokio::test]
    async fn test_update_to_initial_zero_is_not_a_change() {
        let sink = Arc::new(RecordingSink::default());
        let device = Device::new_light(&sink, "plain", false);

        assert!(!device.update_value(0.0, "basic_switch", ChannelType::Undefined).await);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_update_value_exact_float_comparison() {
        let sink = Arc::new(RecordingSink::default());
        let device = Device::new_ct_light(&sink, "ct");

        // 3000 K -> mired -> K -> mired does not land on the same float
        let mired = 1_000_000.0_f32 / 3000.0;
        let kelvin = 1_000_000.0_f32 / mired;
        let round_tripped = 1_000_000.0_f32 / kelvin.round();

        assert!(device.update_value(mired, "colortemp", ChannelType::ColorTemperature).await);
        let resent = device
            .update_value(round_tripped, "colortemp", ChannelType::ColorTemperature)
            .await;
        assert_eq!(resent, round_tripped != mired);

        let sum = 0.1_f32 + 0.2_f32;
        assert!(device.update_value(sum, "brightness", ChannelType::Brightness).await);
        assert_eq!(
            device.update_value(0.3, "brightness", ChannelType::Brightness).await,
            sum != 0.3_f32
        );
    }

    #[tokio::test]
    async fn test_update_value_unknown_channel_is_noop() {
        let sink = Arc::new(RecordingSink::default());
        let device = Device::new(&sink, "basic");

        assert!(!device.update_value(1.0, "brightness", ChannelType::Brightness).await);
        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_dropped_sink_still_tracks_value() {
        let sink = Arc::new(RecordingSink::default());
        let device = Device::new_light(&sink, "dim", true);
        drop(sink);

        assert!(device.update_value(12.0, "brightness", ChannelType::Brightness).await);
        assert_eq!(device.get_value("brightness"), Ok(12.0));
    }

    #[tokio::test]
    async fn test_sensor_and_button_wait_for_init() {
        let sink = Arc::new(RecordingSink::default());
        let mut device = Device::new_button(&sink, "multi");
        device.add_sensor(Sensor {
            id: "temperature".to_string(),
            sensor_type: SensorType::Temperature,
            ..Default::default()
        });
        device.add_sensor(Sensor {
            id: "humidity".to_string(),
            sensor_type: SensorType::Humidity,
            ..Default::default()
        });
        device.set_tag("multi");

        assert_eq!(device.update_sensor_value("humidity", 40.0).await, Ok(false));
        assert!(!device.press_button(0, 1.0).await);
        assert!(sink.sent().is_empty());

        device.set_init_done();
        assert_eq!(device.update_sensor_value("humidity", 41.0).await, Ok(true));
        assert!(device.press_button(0, 1.0).await);
        assert_eq!(
            device.update_sensor_value("pressure", 1.0).await,
            Err(DeviceError::SensorNotFound("pressure".to_string()))
        );

        assert_eq!(
            sink.sent(),
            vec![
                Sent::Sensor { tag: "multi".to_string(), id: "humidity".to_string(), value: 41.0, index: 1 },
                Sent::Button { tag: "multi".to_string(), value: 1.0, index: 0 },
            ]
        );
    }

    #[test]
    fn test_try_begin_init_claims_once() {
        let sink = Arc::new(RecordingSink::default());
        let device = Device::new(&sink, "once");

        assert!(!device.is_init_done());
        assert!(device.try_begin_init());
        assert!(!device.try_begin_init());
        assert!(device.is_init_done());

        device.set_init_done();
        assert!(device.is_init_done());
    }

    #[test]
    fn test_init_descriptor_carries_tag_and_channels() {
        let sink = Arc::new(RecordingSink::default());
        let mut device = Device::new_light(&sink, "AA:BB", true);
        device.set_name("Kitchen");
        device.set_tag("kitchen");

        let descriptor = device.init_descriptor();
        assert_eq!(descriptor.tag, "kitchen");
        assert_eq!(descriptor.name, "Kitchen");
        assert_eq!(descriptor.channels.len(), 2);
        assert_eq!(descriptor.channels[1].id, "brightness");
        assert_eq!(descriptor.channels[1].channel_type, ChannelType::Brightness);
        assert!(device.descriptor().channels.is_empty());
    }

    #[test]
    fn test_handler_closure() {
        let sink = Arc::new(RecordingSink::default());
        let device = Arc::new(Device::new_light(&sink, "dim", true));
        assert!(device.channel_message_handler().is_none());

        device.set_channel_message_handler(|msg: &InboundMessage, device: &Arc<Device>| {
            device.set_value(msg.value, &msg.channel_name);
        });

        let msg = InboundMessage {
            channel_name: "brightness".to_string(),
            value: 80.0,
            ..Default::default()
        };
        let handler = device.channel_message_handler().unwrap();
        handler.on_channel_message(&msg, &device);

        assert_eq!(device.get_value("brightness"), Ok(80.0));
    }
}
