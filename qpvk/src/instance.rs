//! Instance creation and diagnostics routing.
//!
//! [`Instance`] wraps the `ash::Instance` created from a negotiated
//! [`CapabilitySet`]. It owns the entry-point loader, the optional debug
//! messenger, and the optional surface extension loader, and it destroys
//! them in reverse order on drop. Driver diagnostics arriving through the
//! messenger are forwarded to [`tracing`] with a `[vk] ` prefix.

use std::ffi::{CStr, CString, c_char};
use std::fmt::Debug;

use ash::vk;
use thiserror::Error;

use crate::negotiate::CapabilitySet;

#[derive(Debug, Error)]
pub enum InstanceCreationError {
    #[error("Invalid application name (contains interior NUL)")]
    InvalidAppName,
    #[error("Invalid layer or extension name (contains interior NUL): {0}")]
    InvalidName(#[from] std::ffi::NulError),
    #[error("vkCreateInstance failed: {0}")]
    Creation(vk::Result),
    #[error("vkCreateDebugUtilsMessengerEXT failed: {0}")]
    DebugMessenger(vk::Result),
}

#[derive(Debug, Error)]
pub enum FetchPhysicalDeviceError {
    #[error("vkEnumeratePhysicalDevices failed: {0}")]
    Vulkan(vk::Result),
}

#[derive(Debug, Error)]
pub enum DestroyRawSurfaceError {
    #[error("Surface extension is not loaded")]
    ExtensionNotLoaded,
}

/// The root Vulkan object.
///
/// Created exactly once per process by the startup sequence; everything
/// after negotiation takes it by reference (or `Arc`) and must be torn
/// down before it.
pub struct Instance {
    entry: ash::Entry,
    handle: ash::Instance,
    debug_messenger:
        Option<(vk::DebugUtilsMessengerEXT, ash::ext::debug_utils::Instance)>,
    surface_instance: Option<ash::khr::surface::Instance>,
    capabilities: CapabilitySet,
}

impl Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("handle", &self.handle.handle())
            .finish_non_exhaustive()
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        tracing::debug!("Dropping instance {:?}", self.handle.handle());
        if let Some((messenger, debug_utils_instance)) =
            self.debug_messenger.take()
        {
            //SAFETY: last use of this messenger; it was created from this
            //instance and debug_utils_instance is derived from it.
            unsafe {
                debug_utils_instance
                    .destroy_debug_utils_messenger(messenger, None)
            };
        }
        //SAFETY: We are in drop so this is the last use of the instance.
        //Every derived object must already be gone.
        unsafe { self.handle.destroy_instance(None) };
    }
}

/// Forwards driver diagnostics to `tracing`.
///
/// Error and warning severities map to their log levels, informational to
/// info, anything else is dropped. Always tells the driver not to abort
/// the triggering call, and never unwinds.
unsafe extern "system" fn diagnostics_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    //SAFETY: Vulkan guarantees p_callback_data and its message are valid
    //for the duration of the callback.
    let message = unsafe { CStr::from_ptr((*p_callback_data).p_message) }
        .to_string_lossy();

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            tracing::error!("[vk] {}", message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            tracing::warn!("[vk] {}", message);
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::INFO => {
            tracing::info!("[vk] {}", message);
        }
        _ => {}
    }

    vk::FALSE
}

impl Instance {
    /// Create the process-wide instance from a negotiated capability set.
    ///
    /// `api_version_floor` is the packed minimum API version to request,
    /// e.g. `vk::API_VERSION_1_1`. When the set negotiated
    /// `VK_EXT_debug_utils`, the diagnostics messenger is installed before
    /// this returns; a registration failure destroys the fresh instance
    /// and is reported as an error.
    pub fn new(
        entry: ash::Entry,
        app_name: &str,
        api_version_floor: u32,
        capabilities: CapabilitySet,
    ) -> Result<Self, InstanceCreationError> {
        use InstanceCreationError as Error;

        let app_name_cstring =
            CString::new(app_name).map_err(|_| Error::InvalidAppName)?;

        let layer_cstrings = capabilities
            .layers
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let ext_cstrings = capabilities
            .extensions
            .iter()
            .map(|name| CString::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        let layer_ptrs: Vec<*const c_char> =
            layer_cstrings.iter().map(|name| name.as_ptr()).collect();
        let ext_ptrs: Vec<*const c_char> =
            ext_cstrings.iter().map(|name| name.as_ptr()).collect();

        let engine_name = c"qpvk";
        let engine_version = vk::make_api_version(0, 0, 1, 0);

        let app_info = vk::ApplicationInfo::default()
            .application_name(&app_name_cstring)
            .application_version(engine_version)
            .engine_name(engine_name)
            .engine_version(engine_version)
            .api_version(api_version_floor);

        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&ext_ptrs);

        //SAFETY: create_info only references CStrings that outlive the
        //call, and every requested name was confirmed available during
        //discovery.
        let handle = unsafe { entry.create_instance(&create_info, None) }
            .map_err(Error::Creation)?;

        // ash resolved the instance-scoped entry points while creating
        // `handle`, so the extension loaders below dispatch correctly.
        let debug_messenger = if capabilities.debug_utils {
            let debug_utils_instance =
                ash::ext::debug_utils::Instance::new(&entry, &handle);
            let messenger_info = vk::DebugUtilsMessengerCreateInfoEXT::default()
                .message_severity(
                    vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                        | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                )
                .message_type(
                    vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                        | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                        | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
                )
                .pfn_user_callback(Some(diagnostics_callback));

            //SAFETY: messenger_info is fully initialized and
            //VK_EXT_debug_utils was enabled on handle.
            match unsafe {
                debug_utils_instance
                    .create_debug_utils_messenger(&messenger_info, None)
            } {
                Ok(messenger) => Some((messenger, debug_utils_instance)),
                Err(e) => {
                    //SAFETY: nothing has been derived from handle yet.
                    unsafe { handle.destroy_instance(None) };
                    return Err(Error::DebugMessenger(e));
                }
            }
        } else {
            None
        };

        let surface_instance = capabilities
            .surface
            .then(|| ash::khr::surface::Instance::new(&entry, &handle));

        Ok(Self {
            entry,
            handle,
            debug_messenger,
            surface_instance,
            capabilities,
        })
    }

    /// The capability set this instance was created with.
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    pub fn diagnostics_installed(&self) -> bool {
        self.debug_messenger.is_some()
    }

    /// Get a vector of handles to available physical devices. These
    /// handles are only valid in the context of this instance.
    pub fn fetch_raw_physical_devices(
        &self,
    ) -> Result<Vec<vk::PhysicalDevice>, FetchPhysicalDeviceError> {
        //SAFETY: self.handle is a live instance.
        unsafe { self.handle.enumerate_physical_devices() }
            .map_err(FetchPhysicalDeviceError::Vulkan)
    }

    /// Get the properties of a physical device.
    ///
    /// # Safety
    /// `physical_device` must be a valid handle derived from this instance.
    pub unsafe fn get_raw_physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> vk::PhysicalDeviceProperties {
        //SAFETY: physical_device was derived from this instance
        unsafe { self.handle.get_physical_device_properties(physical_device) }
    }

    /// Destroy a raw VkSurfaceKHR.
    ///
    /// # Safety
    /// All objects derived from `surf` must be destroyed first, `surf`
    /// must be derived from this instance, and it must not be used after
    /// this call.
    pub unsafe fn destroy_raw_surface(
        &self,
        surf: vk::SurfaceKHR,
    ) -> Result<(), DestroyRawSurfaceError> {
        if let Some(ref surface_instance) = self.surface_instance {
            //SAFETY: surf is derived from this instance (passed on to
            //caller) and this is its last use.
            unsafe { surface_instance.destroy_surface(surf, None) };
            Ok(())
        } else {
            Err(DestroyRawSurfaceError::ExtensionNotLoaded)
        }
    }

    pub fn raw_instance(&self) -> vk::Instance {
        self.handle.handle()
    }

    pub fn ash_instance(&self) -> &ash::Instance {
        &self.handle
    }

    pub fn ash_entry(&self) -> &ash::Entry {
        &self.entry
    }
}
