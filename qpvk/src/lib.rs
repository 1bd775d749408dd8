//! Vulkan startup negotiation, built on [`ash`].
//!
//! This crate covers the part of bringing up a Vulkan application that
//! happens before any rendering exists: discovering what the local driver
//! offers, deciding what to ask for, creating the instance, routing driver
//! diagnostics into `tracing`, and picking a physical device.
//!
//! # Pipeline
//!
//! ```text
//! CapabilityCatalog::query       what the driver has
//!         │
//! negotiate::negotiate           what we ask for (platform-aware, pure)
//!         │
//! Instance::new                  the process-wide handle + diagnostics
//!         │
//! device::enumerate_physical_devices
//!         │
//! device::select_device          hint-by-id / -name / -substring / first
//!         │
//! Context::new                   lifecycle container for everything after
//! ```
//!
//! Each stage consumes only the output of the previous one; negotiation and
//! selection are plain functions over plain data so they can be exercised
//! with synthetic catalogs and descriptors.
//!
//! # Naming conventions
//!
//! | prefix  | meaning                                   |
//! |---------|-------------------------------------------|
//! | `raw_*` | accepts or returns a raw `ash::vk` handle |
//! | `ash_*` | returns the `ash` wrapper object          |

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::undocumented_unsafe_blocks)]

pub mod catalog;
pub mod context;
pub mod device;
pub mod instance;
pub mod negotiate;

pub use ash;
