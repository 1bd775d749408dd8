//! Capability negotiation.
//!
//! [`negotiate`] turns a [`CapabilityCatalog`] plus a debug flag into the
//! [`CapabilitySet`] that instance creation will request. It is a pure
//! function: the platform-conditional part is a data table
//! ([`SurfacePlatform`]) passed in as an argument, so every platform's
//! behavior can be tested with a synthetic catalog on any host.

use crate::catalog::CapabilityCatalog;

/// Validation layer names recognized during negotiation. The loader has
/// shipped the same functionality under both names over the years; either
/// (or both) may be present.
pub const VALIDATION_LAYERS: [&str; 2] = [
    "VK_LAYER_KHRONOS_validation",
    "VK_LAYER_LUNARG_standard_validation",
];

pub const DEBUG_UTILS_EXTENSION: &str = "VK_EXT_debug_utils";
pub const SURFACE_EXTENSION: &str = "VK_KHR_surface";
pub const DISPLAY_EXTENSION: &str = "VK_KHR_display";

/// Platform tag selecting the candidate window-system surface extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfacePlatform {
    Linux,
    Windows,
    MacOs,
}

impl SurfacePlatform {
    /// The tag for the operating system this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else if cfg!(target_os = "macos") {
            Self::MacOs
        } else {
            Self::Linux
        }
    }

    /// Candidate surface-producing extensions for this platform, one per
    /// windowing backend. Negotiation requests whichever of these the
    /// driver actually advertises.
    pub fn surface_extensions(self) -> &'static [&'static str] {
        match self {
            Self::Linux => &[
                "VK_KHR_wayland_surface",
                "VK_KHR_xcb_surface",
                "VK_KHR_xlib_surface",
            ],
            Self::Windows => &["VK_KHR_win32_surface"],
            Self::MacOs => &[],
        }
    }
}

/// The negotiated request passed to instance creation.
///
/// Invariants: every name in `layers` and `extensions` was confirmed
/// available by the catalog it was negotiated from; no name appears twice;
/// order is insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    pub layers: Vec<String>,
    pub extensions: Vec<String>,
    /// `VK_EXT_debug_utils` was found in a negotiated layer; gates whether
    /// the diagnostics messenger is installed after instance creation.
    pub debug_utils: bool,
    pub surface: bool,
    pub display: bool,
}

impl CapabilitySet {
    fn push_layer(&mut self, name: &str) {
        if !self.layers.iter().any(|layer| layer == name) {
            self.layers.push(name.to_owned());
        }
    }

    fn push_extension(&mut self, name: &str) {
        if !self.extensions.iter().any(|ext| ext == name) {
            self.extensions.push(name.to_owned());
        }
    }
}

/// Decide which layers and extensions to request.
///
/// - With `debug_requested`, any available validation layer is requested,
///   and `VK_EXT_debug_utils` is requested if one of those layers provides
///   it. A driver with no validation layer yields an empty layer list; that
///   is not an error.
/// - `VK_KHR_surface` and `VK_KHR_display` are requested whenever the
///   driver advertises them, plus every advertised extension from the
///   platform's surface table. Unknown extensions are ignored.
pub fn negotiate(
    catalog: &CapabilityCatalog,
    debug_requested: bool,
    platform: SurfacePlatform,
) -> CapabilitySet {
    let mut set = CapabilitySet::default();

    if debug_requested {
        for layer in &catalog.layers {
            if VALIDATION_LAYERS.contains(&layer.name.as_str()) {
                set.push_layer(&layer.name);
            }
        }

        let debug_utils_available = set.layers.iter().any(|name| {
            catalog
                .layer(name)
                .is_some_and(|layer| layer.has_extension(DEBUG_UTILS_EXTENSION))
        });
        if debug_utils_available {
            set.debug_utils = true;
            set.push_extension(DEBUG_UTILS_EXTENSION);
        }
    }

    for ext in &catalog.extensions {
        if ext == SURFACE_EXTENSION {
            set.surface = true;
            set.push_extension(ext);
        } else if ext == DISPLAY_EXTENSION {
            set.display = true;
            set.push_extension(ext);
        } else if platform.surface_extensions().contains(&ext.as_str()) {
            set.push_extension(ext);
        }
    }

    tracing::debug!(
        "Negotiated {} layer(s) and {} extension(s)",
        set.layers.len(),
        set.extensions.len()
    );

    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::LayerCapabilities;

    fn layer(name: &str, extensions: &[&str]) -> LayerCapabilities {
        LayerCapabilities {
            name: name.to_owned(),
            extensions: extensions.iter().map(|e| (*e).to_owned()).collect(),
        }
    }

    fn full_catalog() -> CapabilityCatalog {
        CapabilityCatalog {
            layers: vec![
                layer("VK_LAYER_MESA_overlay", &[]),
                layer("VK_LAYER_KHRONOS_validation", &["VK_EXT_debug_utils"]),
                layer(
                    "VK_LAYER_LUNARG_standard_validation",
                    &["VK_EXT_debug_utils"],
                ),
            ],
            extensions: vec![
                "VK_KHR_surface".to_owned(),
                "VK_KHR_display".to_owned(),
                "VK_KHR_wayland_surface".to_owned(),
                "VK_KHR_xcb_surface".to_owned(),
                "VK_KHR_xlib_surface".to_owned(),
                "VK_KHR_win32_surface".to_owned(),
                "VK_EXT_vendor_specific_thing".to_owned(),
            ],
        }
    }

    #[test]
    fn debug_off_requests_no_layers_or_debug_utils() {
        let set = negotiate(&full_catalog(), false, SurfacePlatform::Linux);

        assert!(set.layers.is_empty());
        assert!(!set.debug_utils);
        assert!(!set.extensions.iter().any(|e| e == DEBUG_UTILS_EXTENSION));
    }

    #[test]
    fn debug_on_requests_every_validation_layer_present() {
        let set = negotiate(&full_catalog(), true, SurfacePlatform::Linux);

        assert_eq!(
            set.layers,
            vec![
                "VK_LAYER_KHRONOS_validation".to_owned(),
                "VK_LAYER_LUNARG_standard_validation".to_owned(),
            ]
        );
        assert!(set.debug_utils);
        assert_eq!(
            set.extensions
                .iter()
                .filter(|e| *e == DEBUG_UTILS_EXTENSION)
                .count(),
            1
        );
    }

    #[test]
    fn missing_validation_layer_is_not_an_error() {
        let catalog = CapabilityCatalog {
            layers: vec![layer("VK_LAYER_MESA_overlay", &[])],
            extensions: vec!["VK_KHR_surface".to_owned()],
        };

        let set = negotiate(&catalog, true, SurfacePlatform::Linux);

        assert!(set.layers.is_empty());
        assert!(!set.debug_utils);
        assert_eq!(set.extensions, vec!["VK_KHR_surface".to_owned()]);
    }

    #[test]
    fn debug_utils_requires_a_negotiated_layer_to_provide_it() {
        // The validation layer is present but does not list debug utils.
        let catalog = CapabilityCatalog {
            layers: vec![layer("VK_LAYER_KHRONOS_validation", &[])],
            extensions: vec!["VK_EXT_debug_utils".to_owned()],
        };

        let set = negotiate(&catalog, true, SurfacePlatform::Linux);

        assert_eq!(set.layers.len(), 1);
        assert!(!set.debug_utils);
        assert!(!set.extensions.iter().any(|e| e == DEBUG_UTILS_EXTENSION));
    }

    #[test]
    fn platform_table_filters_surface_extensions() {
        let linux = negotiate(&full_catalog(), false, SurfacePlatform::Linux);
        assert!(linux.extensions.iter().any(|e| e == "VK_KHR_xcb_surface"));
        assert!(!linux.extensions.iter().any(|e| e == "VK_KHR_win32_surface"));

        let windows =
            negotiate(&full_catalog(), false, SurfacePlatform::Windows);
        assert!(
            windows.extensions.iter().any(|e| e == "VK_KHR_win32_surface")
        );
        assert!(!windows.extensions.iter().any(|e| e == "VK_KHR_xcb_surface"));

        let macos = negotiate(&full_catalog(), false, SurfacePlatform::MacOs);
        assert_eq!(
            macos.extensions,
            vec!["VK_KHR_surface".to_owned(), "VK_KHR_display".to_owned()]
        );
    }

    #[test]
    fn surface_and_display_flags_track_the_catalog() {
        let set = negotiate(&full_catalog(), false, SurfacePlatform::Linux);
        assert!(set.surface);
        assert!(set.display);

        let bare = negotiate(
            &CapabilityCatalog::default(),
            false,
            SurfacePlatform::Linux,
        );
        assert!(!bare.surface);
        assert!(!bare.display);
        assert!(bare.extensions.is_empty());
    }

    #[test]
    fn nothing_is_invented() {
        let catalog = full_catalog();
        let set = negotiate(&catalog, true, SurfacePlatform::Linux);

        for ext in &set.extensions {
            let in_global = catalog.extensions.iter().any(|e| e == ext);
            let in_layer =
                catalog.layers.iter().any(|l| l.has_extension(ext));
            assert!(in_global || in_layer, "invented extension {ext}");
        }
        for layer in &set.layers {
            assert!(catalog.layer(layer).is_some(), "invented layer {layer}");
        }
    }

    #[test]
    fn duplicate_catalog_entries_are_requested_once() {
        let mut catalog = full_catalog();
        catalog.extensions.push("VK_KHR_surface".to_owned());
        catalog
            .layers
            .push(layer("VK_LAYER_KHRONOS_validation", &["VK_EXT_debug_utils"]));

        let set = negotiate(&catalog, true, SurfacePlatform::Linux);

        assert_eq!(
            set.extensions.iter().filter(|e| *e == "VK_KHR_surface").count(),
            1
        );
        assert_eq!(
            set.layers
                .iter()
                .filter(|l| *l == "VK_LAYER_KHRONOS_validation")
                .count(),
            1
        );
    }

    #[test]
    fn full_catalog_is_never_truncated() {
        // Every candidate the algorithm knows about, all at once. The
        // negotiated list must hold them all.
        let set = negotiate(&full_catalog(), true, SurfacePlatform::Linux);

        assert_eq!(
            set.extensions,
            vec![
                "VK_EXT_debug_utils".to_owned(),
                "VK_KHR_surface".to_owned(),
                "VK_KHR_display".to_owned(),
                "VK_KHR_wayland_surface".to_owned(),
                "VK_KHR_xcb_surface".to_owned(),
                "VK_KHR_xlib_surface".to_owned(),
            ]
        );
    }
}
