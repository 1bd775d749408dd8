//! Instance layer and extension discovery.
//!
//! [`CapabilityCatalog`] is a plain-data snapshot of everything the driver
//! advertises at instance scope: the layer list, each layer's extensions,
//! and the driver-wide extension list. It is filled in by
//! [`CapabilityCatalog::query`] against a live loader, or built by hand in
//! tests so negotiation can be exercised without a driver.

use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("vkEnumerateInstanceLayerProperties failed: {0}")]
    Layers(vk::Result),
    #[error(
        "vkEnumerateInstanceExtensionProperties failed for layer {layer}: \
         {result}"
    )]
    LayerExtensions { layer: String, result: vk::Result },
    #[error("vkEnumerateInstanceExtensionProperties failed: {0}")]
    Extensions(vk::Result),
}

/// One discovered layer together with the extensions it provides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerCapabilities {
    pub name: String,
    pub extensions: Vec<String>,
}

impl LayerCapabilities {
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| ext == name)
    }
}

/// Snapshot of everything the driver advertises at instance scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityCatalog {
    pub layers: Vec<LayerCapabilities>,
    /// Driver-wide extensions, i.e. the no-layer query.
    pub extensions: Vec<String>,
}

impl CapabilityCatalog {
    /// Query the driver for its layers and extensions.
    ///
    /// Read-only discovery; performs one layer enumeration, one extension
    /// enumeration per layer, and one driver-wide extension enumeration.
    pub fn query(entry: &ash::Entry) -> Result<Self, DiscoveryError> {
        //SAFETY: entry is a live Vulkan entry;
        //vkEnumerateInstanceLayerProperties has no further preconditions.
        let layer_props = unsafe { entry.enumerate_instance_layer_properties() }
            .map_err(DiscoveryError::Layers)?;

        let mut layers = Vec::with_capacity(layer_props.len());
        for props in &layer_props {
            // A layer name that is not NUL-terminated is driver garbage;
            // skip the entry rather than guessing at its name.
            let name_cstr = match props.layer_name_as_c_str() {
                Ok(name) => name,
                Err(_) => continue,
            };
            let name = name_cstr.to_string_lossy().into_owned();

            //SAFETY: entry is a live Vulkan entry and name_cstr is a
            //NUL-terminated layer name returned by the driver itself.
            let ext_props = unsafe {
                entry.enumerate_instance_extension_properties(Some(name_cstr))
            }
            .map_err(|result| DiscoveryError::LayerExtensions {
                layer: name.clone(),
                result,
            })?;

            layers.push(LayerCapabilities {
                name,
                extensions: extension_names(&ext_props),
            });
        }

        //SAFETY: entry is a live Vulkan entry; passing None queries the
        //driver-wide extensions and dereferences no layer name.
        let global_props =
            unsafe { entry.enumerate_instance_extension_properties(None) }
                .map_err(DiscoveryError::Extensions)?;

        Ok(Self {
            layers,
            extensions: extension_names(&global_props),
        })
    }

    pub fn layer(&self, name: &str) -> Option<&LayerCapabilities> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| ext == name)
    }
}

fn extension_names(props: &[vk::ExtensionProperties]) -> Vec<String> {
    props
        .iter()
        .filter_map(|ext| ext.extension_name_as_c_str().ok())
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic_catalog() -> CapabilityCatalog {
        CapabilityCatalog {
            layers: vec![LayerCapabilities {
                name: "VK_LAYER_KHRONOS_validation".to_owned(),
                extensions: vec!["VK_EXT_debug_utils".to_owned()],
            }],
            extensions: vec![
                "VK_KHR_surface".to_owned(),
                "VK_KHR_xcb_surface".to_owned(),
            ],
        }
    }

    #[test]
    fn layer_lookup_finds_by_exact_name() {
        let catalog = synthetic_catalog();

        let layer = catalog.layer("VK_LAYER_KHRONOS_validation");
        assert!(layer.is_some_and(|l| l.has_extension("VK_EXT_debug_utils")));
        assert!(catalog.layer("VK_LAYER_KHRONOS").is_none());
    }

    #[test]
    fn has_extension_checks_driver_wide_list_only() {
        let catalog = synthetic_catalog();

        assert!(catalog.has_extension("VK_KHR_surface"));
        // Layer-scoped extensions are not part of the driver-wide list.
        assert!(!catalog.has_extension("VK_EXT_debug_utils"));
    }
}
