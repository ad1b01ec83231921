//! Render-pass entry points and the attachment-usage cache.

use ash::vk;
use ash::vk::Handle;

use crate::chain::report_validation_failure;
use crate::types::{RenderPassCreateInfo, SubpassUsage};
use crate::{Chassis, LayerResult};

impl Chassis {
    pub fn create_render_pass(
        &self,
        device: vk::Device,
        info: &RenderPassCreateInfo,
    ) -> LayerResult<vk::RenderPass> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_render_pass(device, info) {
                report_validation_failure(v.tag(), "create_render_pass", device.as_raw());
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
                v.pre_call_record_create_render_pass(device, info);
            }
        }

        let native = ctx.driver().create_render_pass(device, info)?;
        let render_pass = self.wrap_h(wrap, native);

        let usage: Vec<SubpassUsage> = info
            .subpasses
            .iter()
            .map(SubpassUsage::from_subpass)
            .collect();
        {
            let mut state = ctx.state.write();
            state.render_pass_usage.insert(render_pass.as_raw(), usage);
            for v in &validators {
                v.post_call_record_create_render_pass(device, info, render_pass);
            }
        }
        Ok(render_pass)
    }

    pub fn destroy_render_pass(&self, device: vk::Device, render_pass: vk::RenderPass) {
        if render_pass == vk::RenderPass::null() {
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
                v.pre_call_record_destroy_render_pass(device, render_pass);
            }
            // Tolerates a render pass the chassis never recorded.
            state.render_pass_usage.remove(&render_pass.as_raw());
        }
        let native = self.erase_h(wrap, render_pass);
        ctx.driver().destroy_render_pass(device, native);
        for v in &validators {
            v.post_call_record_destroy_render_pass(device, render_pass);
        }
    }

    /// Recorded usage for `(render_pass, subpass)`, if the chassis saw
    /// the render pass being created.
    pub fn render_pass_subpass_usage(
        &self,
        device: vk::Device,
        render_pass: vk::RenderPass,
        subpass: u32,
    ) -> Option<SubpassUsage> {
        let ctx = self.device_table.get(device.as_raw())?;
        let state = ctx.state.read();
        state.subpass_usage(render_pass.as_raw(), subpass)
    }
}
