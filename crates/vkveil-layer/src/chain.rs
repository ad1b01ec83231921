//! Validator interface and the per-context validator chain.
//!
//! Each enabled validation feature is one [`Validator`] object. A
//! context walks its chain on every intercepted call: PreCallValidate
//! (read-only) for every validator, PreCallRecord, the forwarded driver
//! call, then PostCallRecord. Every hook has a default no-op body so a
//! validator only overrides the operations it cares about.

use std::sync::Arc;

use ash::vk;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};

use vkveil_core::ValidatorTag;

use crate::types::*;

/// Hooks a validation feature may implement. Read-only `pre_call_validate`
/// hooks return `true` to report a failure; record hooks mutate the
/// validator's own tracked state and return nothing.
#[allow(unused_variables)]
pub trait Validator: Send + Sync {
    fn tag(&self) -> ValidatorTag;

    // ── Instance lifecycle ──────────────────────────────────
    fn post_call_record_create_instance(&self, instance: vk::Instance, info: &InstanceCreateInfo) {
    }
    fn pre_call_record_destroy_instance(&self, instance: vk::Instance) {}
    fn pre_call_validate_enumerate_physical_devices(&self, instance: vk::Instance) -> bool {
        false
    }
    fn post_call_record_enumerate_physical_devices(
        &self,
        instance: vk::Instance,
        devices: &[vk::PhysicalDevice],
    ) {
    }
    fn pre_call_validate_create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        info: &DeviceCreateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        info: &DeviceCreateInfo,
    ) {
    }
    fn post_call_record_create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        info: &DeviceCreateInfo,
        device: vk::Device,
    ) {
    }

    // ── Device lifecycle ────────────────────────────────────
    fn pre_call_record_destroy_device(&self, device: vk::Device) {}
    fn post_call_record_destroy_device(&self, device: vk::Device) {}
    fn post_call_record_get_device_queue(
        &self,
        device: vk::Device,
        family: u32,
        index: u32,
        queue: vk::Queue,
    ) {
    }

    // ── Render pass ─────────────────────────────────────────
    fn pre_call_validate_create_render_pass(
        &self,
        device: vk::Device,
        info: &RenderPassCreateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_create_render_pass(&self, device: vk::Device, info: &RenderPassCreateInfo) {
    }
    fn post_call_record_create_render_pass(
        &self,
        device: vk::Device,
        info: &RenderPassCreateInfo,
        render_pass: vk::RenderPass,
    ) {
    }
    fn pre_call_record_destroy_render_pass(&self, device: vk::Device, render_pass: vk::RenderPass) {
    }
    fn post_call_record_destroy_render_pass(
        &self,
        device: vk::Device,
        render_pass: vk::RenderPass,
    ) {
    }

    // ── Swapchain ───────────────────────────────────────────
    fn pre_call_validate_create_swapchain(
        &self,
        device: vk::Device,
        info: &SwapchainCreateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_create_swapchain(&self, device: vk::Device, info: &SwapchainCreateInfo) {}
    fn post_call_record_create_swapchain(
        &self,
        device: vk::Device,
        info: &SwapchainCreateInfo,
        swapchain: vk::SwapchainKHR,
    ) {
    }
    fn pre_call_record_destroy_swapchain(&self, device: vk::Device, swapchain: vk::SwapchainKHR) {}
    fn post_call_record_destroy_swapchain(&self, device: vk::Device, swapchain: vk::SwapchainKHR) {
    }
    fn pre_call_validate_get_swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
    ) -> bool {
        false
    }
    fn post_call_record_get_swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        images: &[vk::Image],
    ) {
    }

    // ── Sampler Ycbcr conversion ────────────────────────────
    fn pre_call_validate_create_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        info: &SamplerYcbcrConversionCreateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_create_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        info: &SamplerYcbcrConversionCreateInfo,
    ) {
    }
    fn post_call_record_create_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        info: &SamplerYcbcrConversionCreateInfo,
        conversion: vk::SamplerYcbcrConversion,
    ) {
    }
    fn pre_call_record_destroy_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        conversion: vk::SamplerYcbcrConversion,
    ) {
    }
    fn post_call_record_destroy_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        conversion: vk::SamplerYcbcrConversion,
    ) {
    }

    // ── Image view ──────────────────────────────────────────
    fn pre_call_validate_create_image_view(
        &self,
        device: vk::Device,
        info: &ImageViewCreateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_create_image_view(&self, device: vk::Device, info: &ImageViewCreateInfo) {}
    fn post_call_record_create_image_view(
        &self,
        device: vk::Device,
        info: &ImageViewCreateInfo,
        view: vk::ImageView,
    ) {
    }
    fn pre_call_record_destroy_image_view(&self, device: vk::Device, view: vk::ImageView) {}
    fn post_call_record_destroy_image_view(&self, device: vk::Device, view: vk::ImageView) {}

    // ── Descriptor set layout / pipeline layout ─────────────
    fn pre_call_validate_create_descriptor_set_layout(
        &self,
        device: vk::Device,
        info: &DescriptorSetLayoutCreateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_create_descriptor_set_layout(
        &self,
        device: vk::Device,
        info: &DescriptorSetLayoutCreateInfo,
    ) {
    }
    fn post_call_record_create_descriptor_set_layout(
        &self,
        device: vk::Device,
        info: &DescriptorSetLayoutCreateInfo,
        layout: vk::DescriptorSetLayout,
    ) {
    }
    fn pre_call_record_destroy_descriptor_set_layout(
        &self,
        device: vk::Device,
        layout: vk::DescriptorSetLayout,
    ) {
    }
    fn post_call_record_destroy_descriptor_set_layout(
        &self,
        device: vk::Device,
        layout: vk::DescriptorSetLayout,
    ) {
    }
    fn pre_call_validate_create_pipeline_layout(
        &self,
        device: vk::Device,
        info: &PipelineLayoutCreateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_create_pipeline_layout(
        &self,
        device: vk::Device,
        info: &PipelineLayoutCreateInfo,
    ) {
    }
    fn post_call_record_create_pipeline_layout(
        &self,
        device: vk::Device,
        info: &PipelineLayoutCreateInfo,
        layout: vk::PipelineLayout,
    ) {
    }
    fn pre_call_record_destroy_pipeline_layout(
        &self,
        device: vk::Device,
        layout: vk::PipelineLayout,
    ) {
    }
    fn post_call_record_destroy_pipeline_layout(
        &self,
        device: vk::Device,
        layout: vk::PipelineLayout,
    ) {
    }

    // ── Descriptor pool / sets ──────────────────────────────
    fn pre_call_validate_create_descriptor_pool(
        &self,
        device: vk::Device,
        info: &DescriptorPoolCreateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_create_descriptor_pool(
        &self,
        device: vk::Device,
        info: &DescriptorPoolCreateInfo,
    ) {
    }
    fn post_call_record_create_descriptor_pool(
        &self,
        device: vk::Device,
        info: &DescriptorPoolCreateInfo,
        pool: vk::DescriptorPool,
    ) {
    }
    fn pre_call_record_destroy_descriptor_pool(&self, device: vk::Device, pool: vk::DescriptorPool) {
    }
    fn post_call_record_destroy_descriptor_pool(
        &self,
        device: vk::Device,
        pool: vk::DescriptorPool,
    ) {
    }
    fn pre_call_validate_reset_descriptor_pool(
        &self,
        device: vk::Device,
        pool: vk::DescriptorPool,
    ) -> bool {
        false
    }
    fn pre_call_record_reset_descriptor_pool(&self, device: vk::Device, pool: vk::DescriptorPool) {}
    fn post_call_record_reset_descriptor_pool(&self, device: vk::Device, pool: vk::DescriptorPool) {
    }
    fn pre_call_validate_allocate_descriptor_sets(
        &self,
        device: vk::Device,
        info: &DescriptorSetAllocateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_allocate_descriptor_sets(
        &self,
        device: vk::Device,
        info: &DescriptorSetAllocateInfo,
    ) {
    }
    fn post_call_record_allocate_descriptor_sets(
        &self,
        device: vk::Device,
        info: &DescriptorSetAllocateInfo,
        sets: &[vk::DescriptorSet],
    ) {
    }
    fn pre_call_record_free_descriptor_sets(
        &self,
        device: vk::Device,
        pool: vk::DescriptorPool,
        sets: &[vk::DescriptorSet],
    ) {
    }
    fn post_call_record_free_descriptor_sets(
        &self,
        device: vk::Device,
        pool: vk::DescriptorPool,
        sets: &[vk::DescriptorSet],
    ) {
    }

    // ── Descriptor update templates ─────────────────────────
    fn pre_call_validate_create_descriptor_update_template(
        &self,
        device: vk::Device,
        info: &DescriptorUpdateTemplateCreateInfo,
    ) -> bool {
        false
    }
    fn pre_call_record_create_descriptor_update_template(
        &self,
        device: vk::Device,
        info: &DescriptorUpdateTemplateCreateInfo,
    ) {
    }
    fn post_call_record_create_descriptor_update_template(
        &self,
        device: vk::Device,
        info: &DescriptorUpdateTemplateCreateInfo,
        template: vk::DescriptorUpdateTemplate,
    ) {
    }
    fn pre_call_record_destroy_descriptor_update_template(
        &self,
        device: vk::Device,
        template: vk::DescriptorUpdateTemplate,
    ) {
    }
    fn post_call_record_destroy_descriptor_update_template(
        &self,
        device: vk::Device,
        template: vk::DescriptorUpdateTemplate,
    ) {
    }
    fn pre_call_validate_update_descriptor_set_with_template(
        &self,
        device: vk::Device,
        set: vk::DescriptorSet,
        template: vk::DescriptorUpdateTemplate,
    ) -> bool {
        false
    }
    fn pre_call_record_update_descriptor_set_with_template(
        &self,
        device: vk::Device,
        set: vk::DescriptorSet,
        template: vk::DescriptorUpdateTemplate,
    ) {
    }
    fn post_call_record_update_descriptor_set_with_template(
        &self,
        device: vk::Device,
        set: vk::DescriptorSet,
        template: vk::DescriptorUpdateTemplate,
    ) {
    }

    // ── Pipelines ───────────────────────────────────────────
    fn pre_call_validate_create_graphics_pipelines(
        &self,
        device: vk::Device,
        infos: &[GraphicsPipelineCreateInfo],
        state: &PipelineCallState,
    ) -> bool {
        false
    }
    fn pre_call_record_create_graphics_pipelines(
        &self,
        device: vk::Device,
        infos: &[GraphicsPipelineCreateInfo],
        state: &mut PipelineCallState,
    ) {
    }
    fn post_call_record_create_graphics_pipelines(
        &self,
        device: vk::Device,
        infos: &[GraphicsPipelineCreateInfo],
        state: &PipelineCallState,
        pipelines: &[vk::Pipeline],
    ) {
    }
    fn pre_call_validate_create_ray_tracing_pipelines(
        &self,
        device: vk::Device,
        infos: &[RayTracingPipelineCreateInfo],
    ) -> bool {
        false
    }
    fn pre_call_record_create_ray_tracing_pipelines(
        &self,
        device: vk::Device,
        infos: &[RayTracingPipelineCreateInfo],
    ) {
    }
    fn post_call_record_create_ray_tracing_pipelines(
        &self,
        device: vk::Device,
        infos: &[RayTracingPipelineCreateInfo],
        pipelines: &[vk::Pipeline],
    ) {
    }
    fn pre_call_record_destroy_pipeline(&self, device: vk::Device, pipeline: vk::Pipeline) {}
    fn post_call_record_destroy_pipeline(&self, device: vk::Device, pipeline: vk::Pipeline) {}

    // ── Deferred operations ─────────────────────────────────
    fn post_call_record_create_deferred_operation(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) {
    }
    fn pre_call_record_destroy_deferred_operation(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) {
    }
    fn post_call_record_destroy_deferred_operation(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) {
    }
    fn pre_call_record_deferred_operation_join(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) {
    }
    fn post_call_record_deferred_operation_join(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
        result: vk::Result,
    ) {
    }
    fn post_call_record_get_deferred_operation_result(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
        result: vk::Result,
    ) {
    }
}

/// Builds validator objects for new contexts. Concrete validators live
/// outside this crate; the chassis only needs a way to instantiate them
/// per enabled tag. A device-level validator is produced under the
/// instance-level validator of the same tag, when one exists.
pub trait ValidatorFactory: Send + Sync {
    fn create_instance_validator(&self, tag: ValidatorTag) -> Option<Arc<dyn Validator>>;
    fn create_device_validator(
        &self,
        tag: ValidatorTag,
        instance_validator: Option<Arc<dyn Validator>>,
    ) -> Option<Arc<dyn Validator>>;
}

/// Factory that attaches nothing; useful when the layer is loaded purely
/// for handle virtualization.
pub struct NoopValidatorFactory;

impl ValidatorFactory for NoopValidatorFactory {
    fn create_instance_validator(&self, _tag: ValidatorTag) -> Option<Arc<dyn Validator>> {
        None
    }

    fn create_device_validator(
        &self,
        _tag: ValidatorTag,
        _instance_validator: Option<Arc<dyn Validator>>,
    ) -> Option<Arc<dyn Validator>> {
        None
    }
}

/// Ordered chain of validators attached to one context.
///
/// Releasing a validator at runtime nulls its slot in place instead of
/// erasing it, so threads mid-iteration over a snapshot are unaffected,
/// and parks the object in a retired list that is only dropped at
/// context teardown (an in-flight call may still hold a reference).
pub struct ValidatorChain {
    slots: RwLock<Vec<Option<Arc<dyn Validator>>>>,
    retired: Mutex<Vec<Arc<dyn Validator>>>,
}

impl ValidatorChain {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(Vec::new()),
            retired: Mutex::new(Vec::new()),
        }
    }

    /// Append a validator; chains are walked in attach order.
    pub fn attach(&self, validator: Arc<dyn Validator>) {
        debug!(tag = ?validator.tag(), "attaching validator");
        self.slots.write().push(Some(validator));
    }

    /// Clone the currently attached validators, in order. Entry points
    /// iterate over this snapshot so a concurrent release cannot
    /// invalidate the walk.
    pub fn snapshot(&self) -> Vec<Arc<dyn Validator>> {
        self.slots.read().iter().flatten().cloned().collect()
    }

    /// Find the attached validator with the given tag.
    pub fn find(&self, tag: ValidatorTag) -> Option<Arc<dyn Validator>> {
        self.slots
            .read()
            .iter()
            .flatten()
            .find(|v| v.tag() == tag)
            .cloned()
    }

    /// Administratively detach the validator with the given tag. Its
    /// hooks are no longer invoked; the object itself is reclaimed at
    /// context teardown. Returns whether a validator was released.
    pub fn release(&self, tag: ValidatorTag) -> bool {
        let mut slots = self.slots.write();
        for slot in slots.iter_mut() {
            if slot.as_ref().is_some_and(|v| v.tag() == tag) {
                if let Some(v) = slot.take() {
                    debug!(tag = ?tag, "releasing validator");
                    self.retired.lock().push(v);
                    return true;
                }
            }
        }
        false
    }

    /// Drop every attached and retired validator. Context teardown only.
    pub fn clear(&self) {
        self.slots.write().clear();
        self.retired.lock().clear();
    }

    pub fn attached_len(&self) -> usize {
        self.slots.read().iter().flatten().count()
    }

    pub fn retired_len(&self) -> usize {
        self.retired.lock().len()
    }
}

impl Default for ValidatorChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Emit the structured diagnostic for a PreCallValidate failure. The
/// chassis decides whether the call aborts; formatting and sinks belong
/// to the logging collaborator.
pub fn report_validation_failure(tag: ValidatorTag, operation: &str, handle: u64) {
    error!(
        target: "vkveil::validation",
        tag = ?tag,
        operation,
        handle = format_args!("{handle:#x}"),
        "validation failure reported"
    );
}
