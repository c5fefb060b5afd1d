//! In-memory device table.

use super::{Device, DeviceRegistry};

/// Vector-backed [`DeviceRegistry`].
#[derive(Debug, Clone, Default)]
pub struct DeviceTable {
    devices: Vec<Device>,
}

impl DeviceTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table seeded with `devices`; later duplicates replace earlier ones.
    pub fn with_devices(devices: impl IntoIterator<Item = Device>) -> Self {
        let mut table = Self::new();
        for device in devices {
            table.upsert_device(device);
        }
        table
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when no device is known.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl DeviceRegistry for DeviceTable {
    fn devices(&self) -> &[Device] {
        &self.devices
    }

    fn upsert_device(&mut self, device: Device) {
        match self.devices.iter_mut().find(|d| d.sn == device.sn) {
            Some(slot) => *slot = device,
            None => self.devices.push(device),
        }
    }

    fn remove_device(&mut self, sn: &str) -> Option<Device> {
        let pos = self.devices.iter().position(|d| d.sn == sn)?;
        Some(self.devices.remove(pos))
    }
}
