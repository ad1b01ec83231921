//! Pipeline layout and pipeline entry points.
//!
//! Graphics pipeline creation threads a [`PipelineCallState`] through the
//! validator hooks, pre-resolved from the render-pass usage cache so
//! validators never chase the cache under their own locking. Ray tracing
//! pipeline creation is the one call that can complete under a deferred
//! operation; the wrapped output handles are then issued from reserved
//! identifiers whose native mappings are fulfilled when completion is
//! observed.

use ash::vk;
use ash::vk::Handle;

use crate::chain::report_validation_failure;
use crate::deferred::DeferredResult;
use crate::types::{
    GraphicsPipelineCreateInfo, PipelineCallState, PipelineLayoutCreateInfo,
    RayTracingPipelineCreateInfo,
};
use crate::{Chassis, LayerResult};

impl Chassis {
    // ── Pipeline layout ─────────────────────────────────────

    pub fn create_pipeline_layout(
        &self,
        device: vk::Device,
        info: &PipelineLayoutCreateInfo,
    ) -> LayerResult<vk::PipelineLayout> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_pipeline_layout(device, info) {
                report_validation_failure(v.tag(), "create_pipeline_layout", device.as_raw());
                failed = true;
                if ctx.settings().stop_on_first_error {
                    break;
                }
            }
        }
        if failed && ctx.settings().stop_on_first_error {
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }
        for v in &validators {
            v.pre_call_record_create_pipeline_layout(device, info);
        }

        let mut forwarded = info.clone();
        for layout in &mut forwarded.set_layouts {
            *layout = self.unwrap_h(wrap, *layout);
        }
        let native = ctx.driver().create_pipeline_layout(device, &forwarded)?;
        let layout = self.wrap_h(wrap, native);
        for v in &validators {
            v.post_call_record_create_pipeline_layout(device, info, layout);
        }
        Ok(layout)
    }

    pub fn destroy_pipeline_layout(&self, device: vk::Device, layout: vk::PipelineLayout) {
        if layout == vk::PipelineLayout::null() {
            return;
        }
        let Ok(ctx) = self.device_ctx(device) else {
            return;
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        for v in &validators {
            v.pre_call_record_destroy_pipeline_layout(device, layout);
        }
        let native = self.erase_h(wrap, layout);
        ctx.driver().destroy_pipeline_layout(device, native);
        for v in &validators {
            v.post_call_record_destroy_pipeline_layout(device, layout);
        }
    }

    // ── Graphics pipelines ──────────────────────────────────

    /// Mirrors the wrapped API's batch convention: a status code plus one
    /// pipeline per create info.
    pub fn create_graphics_pipelines(
        &self,
        device: vk::Device,
        infos: &[GraphicsPipelineCreateInfo],
    ) -> (vk::Result, Vec<vk::Pipeline>) {
        let ctx = match self.device_ctx(device) {
            Ok(ctx) => ctx,
            Err(status) => return (status, Vec::new()),
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        // Resolve the render-pass usage for each create info up front,
        // keyed by the handle values the application passed.
        let mut call_state = PipelineCallState {
            subpass_usage: {
                let state = ctx.state.read();
                infos
                    .iter()
                    .map(|info| state.subpass_usage(info.render_pass.as_raw(), info.subpass))
                    .collect()
            },
        };

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_graphics_pipelines(device, infos, &call_state) {
                report_validation_failure(v.tag(), "create_graphics_pipelines", device.as_raw());
                failed = true;
                if ctx.settings().stop_on_first_error {
                    break;
                }
            }
        }
        if failed && ctx.settings().stop_on_first_error {
            return (vk::Result::ERROR_VALIDATION_FAILED_EXT, Vec::new());
        }
        {
            let _guard = ctx.state.write();
            for v in &validators {
                v.pre_call_record_create_graphics_pipelines(device, infos, &mut call_state);
            }
        }

        let forwarded: Vec<GraphicsPipelineCreateInfo> = infos
            .iter()
            .map(|info| {
                let mut fwd = info.clone();
                fwd.layout = self.unwrap_h(wrap, info.layout);
                fwd.render_pass = self.unwrap_h(wrap, info.render_pass);
                fwd
            })
            .collect();
        let (status, natives) = ctx.driver().create_graphics_pipelines(device, &forwarded);

        let pipelines: Vec<vk::Pipeline> =
            natives.into_iter().map(|p| self.wrap_h(wrap, p)).collect();
        {
            let _guard = ctx.state.write();
            for v in &validators {
                v.post_call_record_create_graphics_pipelines(
                    device,
                    infos,
                    &call_state,
                    &pipelines,
                );
            }
        }
        (status, pipelines)
    }

    // ── Ray tracing pipelines ───────────────────────────────

    /// When `deferred_op` is live and the driver answers
    /// `OPERATION_DEFERRED_KHR`, the returned pipelines are reserved
    /// identifiers with no native mapping yet; the mapping is fulfilled
    /// on the first completion observation of the operation.
    pub fn create_ray_tracing_pipelines(
        &self,
        device: vk::Device,
        deferred_op: vk::DeferredOperationKHR,
        infos: &[RayTracingPipelineCreateInfo],
    ) -> (vk::Result, Vec<vk::Pipeline>) {
        let ctx = match self.device_ctx(device) {
            Ok(ctx) => ctx,
            Err(status) => return (status, Vec::new()),
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_ray_tracing_pipelines(device, infos) {
                report_validation_failure(
                    v.tag(),
                    "create_ray_tracing_pipelines",
                    device.as_raw(),
                );
                failed = true;
                if ctx.settings().stop_on_first_error {
                    break;
                }
            }
        }
        if failed && ctx.settings().stop_on_first_error {
            return (vk::Result::ERROR_VALIDATION_FAILED_EXT, Vec::new());
        }
        {
            let _guard = ctx.state.write();
            for v in &validators {
                v.pre_call_record_create_ray_tracing_pipelines(device, infos);
            }
        }

        let forwarded: Vec<RayTracingPipelineCreateInfo> = infos
            .iter()
            .map(|info| {
                let mut fwd = info.clone();
                fwd.layout = self.unwrap_h(wrap, info.layout);
                fwd
            })
            .collect();
        let native_op = self.unwrap_h(wrap, deferred_op);
        let (status, natives) =
            ctx.driver()
                .create_ray_tracing_pipelines(device, native_op, &forwarded);

        let pipelines: Vec<vk::Pipeline> = if status == vk::Result::OPERATION_DEFERRED_KHR && wrap
        {
            // Handles go out now; the objects become real later. Issue
            // reserved identifiers and fulfill them when the operation's
            // completion is observed.
            let reserved: Vec<vk::Pipeline> = natives
                .iter()
                .map(|_| vk::Pipeline::from_raw(self.registry.reserve()))
                .collect();
            let pairs: Vec<(u64, u64)> = reserved
                .iter()
                .zip(&natives)
                .map(|(w, n)| (w.as_raw(), n.as_raw()))
                .collect();
            let op_key = native_op.as_raw();
            ctx.deferred.produce_result(op_key, DeferredResult { pipelines: pairs });
            let registry = self.registry.clone();
            ctx.deferred.register_post_check(
                op_key,
                Box::new(move |result| {
                    for &(wrapped, native) in &result.pipelines {
                        registry.fulfill(wrapped, native);
                    }
                }),
            );
            reserved
        } else {
            natives.into_iter().map(|p| self.wrap_h(wrap, p)).collect()
        };

        for v in &validators {
            v.post_call_record_create_ray_tracing_pipelines(device, infos, &pipelines);
        }
        (status, pipelines)
    }

    pub fn destroy_pipeline(&self, device: vk::Device, pipeline: vk::Pipeline) {
        if pipeline == vk::Pipeline::null() {
            return;
        }
        let Ok(ctx) = self.device_ctx(device) else {
            return;
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        for v in &validators {
            v.pre_call_record_destroy_pipeline(device, pipeline);
        }
        let native = self.erase_h(wrap, pipeline);
        ctx.driver().destroy_pipeline(device, native);
        for v in &validators {
            v.post_call_record_destroy_pipeline(device, pipeline);
        }
    }
}
