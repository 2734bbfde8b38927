use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};
use vdcd_device::Device;

/// Devices known to a client, in registration order
///
/// Registration and routing happen on different tasks, so the list sits
/// behind a read/write lock. The lock is never held across an `.await`.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<Vec<Arc<Device>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a device
    ///
    /// Duplicates are not rejected; a second device with the same unique id
    /// and sub device index, or with a tag another device already holds,
    /// only produces a warning.
    pub fn add(&self, device: Arc<Device>) {
        let mut devices = self.devices.write().unwrap_or_else(PoisonError::into_inner);

        let tag = device.tag();
        if !tag.is_empty() && tag_holder(&devices, &device, &tag).is_some() {
            warn!(
                unique_id = %device.unique_id(),
                tag = %tag,
                "Tag is already held by another device"
            );
        }

        if devices.iter().any(|d| {
            d.unique_id() == device.unique_id() && d.sub_device_index() == device.sub_device_index()
        }) {
            warn!(
                unique_id = %device.unique_id(),
                sub_device_index = device.sub_device_index(),
                "Device with this unique id is already registered"
            );
        }

        debug!(unique_id = %device.unique_id(), "Registering device");
        devices.push(device);
    }

    pub fn len(&self) -> usize {
        self.devices.read().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all devices in registration order
    pub fn all(&self) -> Vec<Arc<Device>> {
        self.devices
            .read()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    fn find(&self, predicate: impl Fn(&Device) -> bool) -> Option<Arc<Device>> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        devices.iter().find(|d| predicate(d)).cloned()
    }

    pub fn by_unique_id(&self, unique_id: &str) -> Option<Arc<Device>> {
        self.find(|d| d.unique_id() == unique_id)
    }

    pub fn by_unique_id_and_sub_device_index(
        &self,
        unique_id: &str,
        sub_device_index: u32,
    ) -> Option<Arc<Device>> {
        self.find(|d| d.unique_id() == unique_id && d.sub_device_index() == sub_device_index)
    }

    pub fn by_tag(&self, tag: &str) -> Option<Arc<Device>> {
        self.find(|d| d.tag() == tag)
    }

    /// Resolve the target of an inbound channel message
    ///
    /// With a single registered device the tag is ignored.
    pub fn route(&self, tag: &str) -> Option<Arc<Device>> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        match devices.as_slice() {
            [] => None,
            [only] => Some(Arc::clone(only)),
            many => many.iter().find(|d| d.tag() == tag).cloned(),
        }
    }

    /// Tags held by more than one distinct device, in registration order
    ///
    /// Inbound messages for such a tag only ever reach the first holder.
    pub fn shared_tags(&self) -> Vec<String> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);
        let mut shared: Vec<String> = Vec::new();
        for device in devices.iter() {
            let tag = device.tag();
            if !tag.is_empty()
                && !shared.contains(&tag)
                && tag_holder(&devices, device, &tag).is_some()
            {
                shared.push(tag);
            }
        }
        shared
    }

    /// Claim every device that has not been initialized yet
    ///
    /// Empty tags are filled from the unique id first. Each device is
    /// returned by at most one call, even under concurrent callers.
    pub fn claim_pending(&self) -> Vec<Arc<Device>> {
        let devices = self.devices.read().unwrap_or_else(PoisonError::into_inner);

        for device in devices.iter() {
            if device.tag().is_empty() {
                device.set_tag(device.unique_id());
            }
        }

        let pending: Vec<Arc<Device>> = devices
            .iter()
            .filter(|d| d.try_begin_init())
            .cloned()
            .collect();

        for device in &pending {
            let tag = device.tag();
            if let Some(holder) = tag_holder(&devices, device, &tag) {
                warn!(
                    unique_id = %device.unique_id(),
                    sub_device_index = device.sub_device_index(),
                    other_sub_device_index = holder.sub_device_index(),
                    tag = %tag,
                    "Tag is shared with another device, messages only reach the first"
                );
            }
        }
        pending
    }
}

/// Another device than `device` that holds `tag`
fn tag_holder<'a>(devices: &'a [Arc<Device>], device: &Arc<Device>, tag: &str) -> Option<&'a Arc<Device>> {
    devices
        .iter()
        .find(|d| !Arc::ptr_eq(d, device) && d.tag() == tag)
}
