//! Image-view and sampler-Ycbcr-conversion entry points.
//!
//! Image-view creation is the chassis's pNext-chain case: a
//! sampler-Ycbcr-conversion handle may arrive inside the extension
//! chain and must be unwrapped exactly once before forwarding.

use ash::vk;
use ash::vk::Handle;

use crate::chain::report_validation_failure;
use crate::types::{ImageViewChainInfo, ImageViewCreateInfo, SamplerYcbcrConversionCreateInfo};
use crate::{Chassis, LayerResult};

impl Chassis {
    pub fn create_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        info: &SamplerYcbcrConversionCreateInfo,
    ) -> LayerResult<vk::SamplerYcbcrConversion> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_sampler_ycbcr_conversion(device, info) {
                report_validation_failure(
                    v.tag(),
                    "create_sampler_ycbcr_conversion",
                    device.as_raw(),
                );
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
                v.pre_call_record_create_sampler_ycbcr_conversion(device, info);
            }
        }

        let native = ctx.driver().create_sampler_ycbcr_conversion(device, info)?;
        let conversion = self.wrap_h(wrap, native);
        for v in &validators {
            v.post_call_record_create_sampler_ycbcr_conversion(device, info, conversion);
        }
        Ok(conversion)
    }

    pub fn destroy_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        conversion: vk::SamplerYcbcrConversion,
    ) {
        if conversion == vk::SamplerYcbcrConversion::null() {
            return;
        }
        let Ok(ctx) = self.device_ctx(device) else {
            return;
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        for v in &validators {
            v.pre_call_record_destroy_sampler_ycbcr_conversion(device, conversion);
        }
        let native = self.erase_h(wrap, conversion);
        ctx.driver().destroy_sampler_ycbcr_conversion(device, native);
        for v in &validators {
            v.post_call_record_destroy_sampler_ycbcr_conversion(device, conversion);
        }
    }

    pub fn create_image_view(
        &self,
        device: vk::Device,
        info: &ImageViewCreateInfo,
    ) -> LayerResult<vk::ImageView> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_image_view(device, info) {
                report_validation_failure(v.tag(), "create_image_view", info.image.as_raw());
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
                v.pre_call_record_create_image_view(device, info);
            }
        }

        // Unwrap the image and every handle reachable through the
        // extension chain, each exactly once.
        let mut forwarded = info.clone();
        forwarded.image = self.unwrap_h(wrap, info.image);
        for link in &mut forwarded.chain {
            if let ImageViewChainInfo::SamplerYcbcrConversion { conversion } = link {
                *conversion = self.unwrap_h(wrap, *conversion);
            }
        }

        let native = ctx.driver().create_image_view(device, &forwarded)?;
        let view = self.wrap_h(wrap, native);
        for v in &validators {
            v.post_call_record_create_image_view(device, info, view);
        }
        Ok(view)
    }

    pub fn destroy_image_view(&self, device: vk::Device, view: vk::ImageView) {
        if view == vk::ImageView::null() {
            return;
        }
        let Ok(ctx) = self.device_ctx(device) else {
            return;
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        for v in &validators {
            v.pre_call_record_destroy_image_view(device, view);
        }
        let native = self.erase_h(wrap, view);
        ctx.driver().destroy_image_view(device, native);
        for v in &validators {
            v.post_call_record_destroy_image_view(device, view);
        }
    }
}
