//! Per-device auxiliary caches.
//!
//! State the chassis must own because later calls need it to correctly
//! wrap and unwrap handles: render-pass attachment usage, the swapchain
//! image table, descriptor-pool set membership, and shadow copies of
//! descriptor-update templates. All of it lives behind the device's
//! [`DeviceStateLock`](crate::locks::DeviceStateLock); population and
//! cascade-erase run under the exclusive guard, lookups under the shared
//! guard. Bookkeeping runs identically whether or not handle wrapping is
//! enabled.

use std::collections::{HashMap, HashSet};

use ash::vk;

use crate::types::{DescriptorUpdateTemplateEntry, SubpassUsage};

/// One known swapchain image: the driver's handle and the value handed
/// to the application. Identical when wrapping is disabled.
#[derive(Debug, Clone, Copy)]
pub struct SwapchainImage {
    pub native: vk::Image,
    pub wrapped: vk::Image,
}

#[derive(Default)]
pub struct DeviceState {
    /// Render pass (application-visible raw value) -> per-subpass usage.
    pub render_pass_usage: HashMap<u64, Vec<SubpassUsage>>,
    /// Swapchain -> ordered image list. Append-only: re-enumeration
    /// returns previously issued identifiers for already-known images.
    pub swapchain_images: HashMap<u64, Vec<SwapchainImage>>,
    /// Descriptor pool -> sets allocated from it, for cascade erase on
    /// pool destroy and reset.
    pub pool_sets: HashMap<u64, HashSet<u64>>,
    /// Update template -> deep copy of its entry descriptions.
    pub update_templates: HashMap<u64, Vec<DescriptorUpdateTemplateEntry>>,
}

impl DeviceState {
    /// Usage for one subpass of a recorded render pass. `None` when the
    /// render pass was never recorded (wrapping mode may have changed
    /// since creation) or the subpass index is out of range.
    pub fn subpass_usage(&self, render_pass: u64, subpass: u32) -> Option<SubpassUsage> {
        self.render_pass_usage
            .get(&render_pass)?
            .get(subpass as usize)
            .copied()
    }
}
