//! Physical device enumeration and hint-based selection.
//!
//! [`enumerate_physical_devices`] produces one immutable
//! [`PhysicalDeviceDescriptor`] per accelerator the instance can see.
//! [`select_device`] picks an index from an optional user hint; the
//! matching rules and the silent fallback to the first device are part of
//! the CLI contract and must not change.

use std::fmt::Debug;

use ash::vk;
use thiserror::Error;

use crate::instance::{FetchPhysicalDeviceError, Instance};

#[derive(Debug, Error)]
pub enum EnumerateDevicesError {
    /// The driver is healthy but exposes no accelerator. An expected
    /// operational outcome, not a programming error.
    #[error("No available physical device found")]
    NoDevicesFound,
    #[error("vkEnumeratePhysicalDevices failed: {0}")]
    Vulkan(vk::Result),
}

impl From<FetchPhysicalDeviceError> for EnumerateDevicesError {
    fn from(value: FetchPhysicalDeviceError) -> Self {
        match value {
            FetchPhysicalDeviceError::Vulkan(e) => Self::Vulkan(e),
        }
    }
}

/// Immutable description of one discovered accelerator.
pub struct PhysicalDeviceDescriptor {
    handle: vk::PhysicalDevice,
    name: String,
    device_id: u32,
    properties: vk::PhysicalDeviceProperties,
}

impl Debug for PhysicalDeviceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalDeviceDescriptor")
            .field("name", &self.name)
            .field("device_id", &self.id_hex())
            .finish_non_exhaustive()
    }
}

impl PhysicalDeviceDescriptor {
    /// The raw handle, only valid with the instance that enumerated it.
    pub fn raw_handle(&self) -> vk::PhysicalDevice {
        self.handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device_id(&self) -> u32 {
        self.device_id
    }

    /// Full driver-reported properties, not further inspected here.
    pub fn properties(&self) -> &vk::PhysicalDeviceProperties {
        &self.properties
    }

    /// The identifier the way `--list-devices` prints it: 8 uppercase hex
    /// digits, zero padded, `0x` prefixed.
    pub fn id_hex(&self) -> String {
        format!("0x{:08X}", self.device_id)
    }
}

/// List every physical device visible to the instance.
///
/// An empty list is reported as [`EnumerateDevicesError::NoDevicesFound`]
/// so callers can treat it as a recoverable condition distinct from a
/// failed enumeration call.
pub fn enumerate_physical_devices(
    instance: &Instance,
) -> Result<Vec<PhysicalDeviceDescriptor>, EnumerateDevicesError> {
    let handles = instance.fetch_raw_physical_devices()?;
    if handles.is_empty() {
        return Err(EnumerateDevicesError::NoDevicesFound);
    }

    let mut descriptors = Vec::with_capacity(handles.len());
    for handle in handles {
        //SAFETY: handle was just enumerated from this instance.
        let properties =
            unsafe { instance.get_raw_physical_device_properties(handle) };
        let name = properties
            .device_name_as_c_str()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        descriptors.push(PhysicalDeviceDescriptor {
            handle,
            name,
            device_id: properties.device_id,
            properties,
        });
    }

    Ok(descriptors)
}

/// Pick one descriptor index from an optional user hint.
///
/// First match wins, in precedence order:
/// 1. hint starting with `0x`: exact match on the hexadecimal device id;
/// 2. exact, case-sensitive match on the device name;
/// 3. first device whose name contains the hint as a substring;
/// 4. index 0.
///
/// A hint that matches nothing falls back to index 0 without an error;
/// that case is logged at warning level so a typoed `-d` does not pass
/// unnoticed.
pub fn select_device(
    descriptors: &[PhysicalDeviceDescriptor],
    hint: Option<&str>,
) -> usize {
    if let Some(hint) = hint {
        if let Some(hex) = hint.strip_prefix("0x") {
            if let Ok(id) = u32::from_str_radix(hex, 16) {
                if let Some(index) =
                    descriptors.iter().position(|d| d.device_id == id)
                {
                    return index;
                }
            }
        } else {
            if let Some(index) =
                descriptors.iter().position(|d| d.name == hint)
            {
                return index;
            }
            if let Some(index) =
                descriptors.iter().position(|d| d.name.contains(hint))
            {
                return index;
            }
        }
        tracing::warn!(
            "Device hint {:?} matched nothing, falling back to device 0",
            hint
        );
    }
    0
}
