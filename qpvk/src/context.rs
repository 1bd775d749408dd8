//! Post-selection lifecycle container.
//!
//! [`Context`] holds everything created after device selection: the chosen
//! physical device plus (currently unpopulated) slots for the logical
//! device, allocator, surface, swapchain and its image list. Creation of
//! those resources is a seam left for later; the state machine and the
//! teardown ordering are fixed here so filling the seam in cannot change
//! them.

use std::sync::Arc;

use ash::vk;

use crate::device::PhysicalDeviceDescriptor;
use crate::instance::Instance;

/// How far construction has progressed. Transitions only move forward;
/// teardown may run from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContextState {
    DeviceBound,
    LogicalDeviceReady,
    SurfaceReady,
    SwapchainReady,
}

/// One resource release performed during teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TeardownStep {
    Allocator,
    SwapchainImages,
    Swapchain,
    LogicalDevice,
    Surface,
}

/// The resources owned after device selection and their teardown order.
///
/// Every slot is `Option`al; a slot is only populated once the matching
/// creation step has run, and releasing an unpopulated slot is a no-op.
/// The instance is a back-reference: it is not owned here, but the surface
/// can only be destroyed through it, and the `Arc` guarantees it outlives
/// this context.
pub struct Context {
    instance: Arc<Instance>,
    physical_device: PhysicalDeviceDescriptor,
    device: Option<ash::Device>,
    allocator: Option<gpu_allocator::vulkan::Allocator>,
    surface: Option<vk::SurfaceKHR>,
    swapchain: Option<(vk::SwapchainKHR, ash::khr::swapchain::Device)>,
    swapchain_images: Vec<vk::Image>,
    supports_khr_swapchain: bool,
    graphics_queue_family: Option<u32>,
    present_queue_family: Option<u32>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("physical_device", &self.physical_device)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Bind the selected physical device. The resulting context is in
    /// [`ContextState::DeviceBound`]; everything else is unpopulated.
    pub fn new(
        instance: Arc<Instance>,
        physical_device: PhysicalDeviceDescriptor,
    ) -> Self {
        Self {
            instance,
            physical_device,
            device: None,
            allocator: None,
            surface: None,
            swapchain: None,
            swapchain_images: Vec::new(),
            supports_khr_swapchain: false,
            graphics_queue_family: None,
            present_queue_family: None,
        }
    }

    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    pub fn physical_device(&self) -> &PhysicalDeviceDescriptor {
        &self.physical_device
    }

    pub fn state(&self) -> ContextState {
        state_for(
            self.device.is_some(),
            self.surface.is_some(),
            self.swapchain.is_some(),
        )
    }

    pub fn supports_khr_swapchain(&self) -> bool {
        self.supports_khr_swapchain
    }

    pub fn graphics_queue_family(&self) -> Option<u32> {
        self.graphics_queue_family
    }

    pub fn present_queue_family(&self) -> Option<u32> {
        self.present_queue_family
    }

    fn teardown_plan(&self) -> Vec<TeardownStep> {
        teardown_plan_for(
            self.allocator.is_some(),
            !self.swapchain_images.is_empty(),
            self.swapchain.is_some(),
            self.device.is_some(),
            self.surface.is_some(),
        )
    }
}

fn state_for(device: bool, surface: bool, swapchain: bool) -> ContextState {
    if swapchain {
        ContextState::SwapchainReady
    } else if surface {
        ContextState::SurfaceReady
    } else if device {
        ContextState::LogicalDeviceReady
    } else {
        ContextState::DeviceBound
    }
}

/// The releases the destructor will perform for a given population, in
/// the mandatory resource-dependency order: allocator, swapchain image
/// storage, swapchain, logical device, surface.
fn teardown_plan_for(
    allocator: bool,
    swapchain_images: bool,
    swapchain: bool,
    device: bool,
    surface: bool,
) -> Vec<TeardownStep> {
    let mut plan = Vec::new();
    if allocator {
        plan.push(TeardownStep::Allocator);
    }
    if swapchain_images {
        plan.push(TeardownStep::SwapchainImages);
    }
    if swapchain {
        plan.push(TeardownStep::Swapchain);
    }
    if device {
        plan.push(TeardownStep::LogicalDevice);
    }
    if surface {
        plan.push(TeardownStep::Surface);
    }
    plan
}

impl Drop for Context {
    fn drop(&mut self) {
        tracing::debug!(
            "Dropping context in state {:?}, releasing {:?}",
            self.state(),
            self.teardown_plan()
        );

        if let Some(allocator) = self.allocator.take() {
            drop(allocator);
        }
        self.swapchain_images.clear();
        if let Some((swapchain, swapchain_device)) = self.swapchain.take() {
            //SAFETY: the swapchain was created from swapchain_device's
            //logical device and its images were released above; this is
            //its last use.
            unsafe { swapchain_device.destroy_swapchain(swapchain, None) };
        }
        if let Some(device) = self.device.take() {
            //SAFETY: every object derived from this device (allocator,
            //swapchain) has been released above.
            unsafe { device.destroy_device(None) };
        }
        if let Some(surface) = self.surface.take() {
            //SAFETY: the surface was created from self.instance and
            //nothing derived from it remains.
            if let Err(e) = unsafe { self.instance.destroy_raw_surface(surface) }
            {
                tracing::error!(
                    "Leaking surface during context teardown: {}",
                    e
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_order_forward() {
        assert!(ContextState::DeviceBound < ContextState::LogicalDeviceReady);
        assert!(ContextState::LogicalDeviceReady < ContextState::SurfaceReady);
        assert!(ContextState::SurfaceReady < ContextState::SwapchainReady);
    }

    #[test]
    fn state_derives_from_populated_slots() {
        assert_eq!(state_for(false, false, false), ContextState::DeviceBound);
        assert_eq!(
            state_for(true, false, false),
            ContextState::LogicalDeviceReady
        );
        assert_eq!(state_for(true, true, false), ContextState::SurfaceReady);
        assert_eq!(state_for(true, true, true), ContextState::SwapchainReady);
    }

    #[test]
    fn device_bound_teardown_releases_nothing() {
        // A context holding only the physical device reference has no
        // driver objects to release.
        assert!(teardown_plan_for(false, false, false, false, false)
            .is_empty());
    }

    #[test]
    fn full_teardown_follows_dependency_order() {
        assert_eq!(
            teardown_plan_for(true, true, true, true, true),
            vec![
                TeardownStep::Allocator,
                TeardownStep::SwapchainImages,
                TeardownStep::Swapchain,
                TeardownStep::LogicalDevice,
                TeardownStep::Surface,
            ]
        );
    }

    #[test]
    fn partial_teardown_skips_unpopulated_slots() {
        assert_eq!(
            teardown_plan_for(false, false, false, true, true),
            vec![TeardownStep::LogicalDevice, TeardownStep::Surface]
        );
        assert_eq!(
            teardown_plan_for(true, false, false, true, false),
            vec![TeardownStep::Allocator, TeardownStep::LogicalDevice]
        );
    }
}
