//! Swapchain entry points and the swapchain-image table.

use ash::vk;
use ash::vk::Handle;

use crate::chain::report_validation_failure;
use crate::state::SwapchainImage;
use crate::types::SwapchainCreateInfo;
use crate::{Chassis, LayerResult};

impl Chassis {
    pub fn create_swapchain(
        &self,
        device: vk::Device,
        info: &SwapchainCreateInfo,
    ) -> LayerResult<vk::SwapchainKHR> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_swapchain(device, info) {
                report_validation_failure(v.tag(), "create_swapchain", device.as_raw());
                failed = true;
                if ctx.settings().stop_on_first_error {
                    break;
                }
            }
        }
        if failed && ctx.settings().stop_on_first_error {
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }
        {
            let _guard = ctx.state.write();
            for v in &validators {
                v.pre_call_record_create_swapchain(device, info);
            }
        }

        // The old swapchain is the only layer-wrapped input; the surface
        // was created outside the layer and passes through.
        let mut forwarded = info.clone();
        forwarded.old_swapchain = self.unwrap_h(wrap, info.old_swapchain);

        let native = ctx.driver().create_swapchain(device, &forwarded)?;
        let swapchain = self.wrap_h(wrap, native);
        {
            let mut state = ctx.state.write();
            state
                .swapchain_images
                .insert(swapchain.as_raw(), Vec::new());
            for v in &validators {
                v.post_call_record_create_swapchain(device, info, swapchain);
            }
        }
        Ok(swapchain)
    }

    pub fn destroy_swapchain(&self, device: vk::Device, swapchain: vk::SwapchainKHR) {
        if swapchain == vk::SwapchainKHR::null() {
            return;
        }
        let Ok(ctx) = self.device_ctx(device) else {
            return;
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        {
            let mut state = ctx.state.write();
            for v in &validators {
                v.pre_call_record_destroy_swapchain(device, swapchain);
            }
            // Every image the swapchain owned goes with it.
            if let Some(images) = state.swapchain_images.remove(&swapchain.as_raw()) {
                for image in images {
                    self.erase_h(wrap, image.wrapped);
                }
            }
        }
        let native = self.erase_h(wrap, swapchain);
        ctx.driver().destroy_swapchain(device, native);
        for v in &validators {
            v.post_call_record_destroy_swapchain(device, swapchain);
        }
    }

    /// Two-phase image query. Wrapped identifiers are stable across
    /// repeated enumeration: an already-known image keeps the identifier
    /// issued for it the first time, only newly seen images are wrapped.
    pub fn get_swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        count: &mut u32,
        out: Option<&mut [vk::Image]>,
    ) -> vk::Result {
        let ctx = match self.device_ctx(device) {
            Ok(ctx) => ctx,
            Err(status) => return status,
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_get_swapchain_images(device, swapchain) {
                report_validation_failure(v.tag(), "get_swapchain_images", swapchain.as_raw());
                failed = true;
                if ctx.settings().stop_on_first_error {
                    break;
                }
            }
        }
        if failed && ctx.settings().stop_on_first_error {
            return vk::Result::ERROR_VALIDATION_FAILED_EXT;
        }

        let native_sc = self.unwrap_h(wrap, swapchain);
        match out {
            None => ctx
                .driver()
                .get_swapchain_images(device, native_sc, count, None),
            Some(images) => {
                let status = ctx.driver().get_swapchain_images(
                    device,
                    native_sc,
                    count,
                    Some(&mut *images),
                );
                if status == vk::Result::SUCCESS || status == vk::Result::INCOMPLETE {
                    let filled = (*count as usize).min(images.len());
                    let mut state = ctx.state.write();
                    let table = state
                        .swapchain_images
                        .entry(swapchain.as_raw())
                        .or_default();
                    for slot in &mut images[..filled] {
                        let native = *slot;
                        let wrapped = match table.iter().find(|e| e.native == native) {
                            Some(known) => known.wrapped,
                            None => {
                                let wrapped = self.wrap_h(wrap, native);
                                table.push(SwapchainImage { native, wrapped });
                                wrapped
                            }
                        };
                        *slot = wrapped;
                    }
                    for v in &validators {
                        v.post_call_record_get_swapchain_images(
                            device,
                            swapchain,
                            &images[..filled],
                        );
                    }
                }
                status
            }
        }
    }
}
