//! Device catalog: enumeration snapshot and identifier resolution.

use crate::error::{CapCamError, Result};
use crate::traits::{CaptureBackend, DeviceDescriptor};

/// Snapshot of the capture devices attached at enumeration time.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    devices: Vec<DeviceDescriptor>,
}

impl DeviceCatalog {
    /// Query the backend for the devices attached right now.
    pub fn enumerate<B: CaptureBackend>(backend: &B) -> Result<Self> {
        Ok(Self::from_devices(backend.enumerate()?))
    }

    /// Build a catalog from an already enumerated device list.
    #[must_use]
    pub const fn from_devices(devices: Vec<DeviceDescriptor>) -> Self {
        Self { devices }
    }

    /// Enumerated devices, in enumeration order.
    #[must_use]
    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    /// Resolve a user-supplied identifier to a device.
    ///
    /// A non-negative integer is an index into the enumeration. Anything else
    /// is matched case-insensitively as a substring of the display names and
    /// the first match wins.
    pub fn resolve(&self, identifier: &str) -> Result<&DeviceDescriptor> {
        if self.devices.is_empty() {
            return Err(CapCamError::NoDevicesFound);
        }

        if let Ok(index) = identifier.parse::<usize>() {
            return self.devices.get(index).ok_or_else(|| {
                CapCamError::InvalidDevice(format!(
                    "index {index} out of range ({} devices)",
                    self.devices.len()
                ))
            });
        }

        let needle = identifier.to_lowercase();
        self.devices
            .iter()
            .find(|device| device.name.to_lowercase().contains(&needle))
            .ok_or_else(|| CapCamError::InvalidDevice(format!("no device matches {identifier:?}")))
    }
}
