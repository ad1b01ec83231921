//! The down-chain driver interface.
//!
//! The loader glue that resolves real driver symbols lives outside this
//! crate; the chassis only sees this trait, one method per intercepted
//! operation. Every handle crossing this boundary is a native value --
//! the chassis unwraps inputs before forwarding and wraps outputs after.

use ash::vk;

use crate::types::*;

/// Result alias for driver calls that mirror the wrapped API's
/// status-code convention.
pub type DriverResult<T> = Result<T, vk::Result>;

#[allow(clippy::too_many_arguments)]
pub trait Driver: Send + Sync {
    // ── Instance family ─────────────────────────────────────
    fn create_instance(&self, info: &InstanceCreateInfo) -> DriverResult<vk::Instance>;
    fn destroy_instance(&self, instance: vk::Instance);
    /// Two-phase query: with `out` absent only `count` is produced.
    fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
        count: &mut u32,
        out: Option<&mut [vk::PhysicalDevice]>,
    ) -> vk::Result;
    fn get_physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> PhysicalDeviceProperties;
    fn get_physical_device_features(&self, physical_device: vk::PhysicalDevice) -> Vec<String>;
    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        info: &DeviceCreateInfo,
    ) -> DriverResult<vk::Device>;

    // ── Device family ───────────────────────────────────────
    fn destroy_device(&self, device: vk::Device);
    fn get_device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue;

    fn create_render_pass(
        &self,
        device: vk::Device,
        info: &RenderPassCreateInfo,
    ) -> DriverResult<vk::RenderPass>;
    fn destroy_render_pass(&self, device: vk::Device, render_pass: vk::RenderPass);

    fn create_swapchain(
        &self,
        device: vk::Device,
        info: &SwapchainCreateInfo,
    ) -> DriverResult<vk::SwapchainKHR>;
    fn destroy_swapchain(&self, device: vk::Device, swapchain: vk::SwapchainKHR);
    fn get_swapchain_images(
        &self,
        device: vk::Device,
        swapchain: vk::SwapchainKHR,
        count: &mut u32,
        out: Option<&mut [vk::Image]>,
    ) -> vk::Result;

    fn create_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        info: &SamplerYcbcrConversionCreateInfo,
    ) -> DriverResult<vk::SamplerYcbcrConversion>;
    fn destroy_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        conversion: vk::SamplerYcbcrConversion,
    );

    fn create_image_view(
        &self,
        device: vk::Device,
        info: &ImageViewCreateInfo,
    ) -> DriverResult<vk::ImageView>;
    fn destroy_image_view(&self, device: vk::Device, view: vk::ImageView);

    fn create_descriptor_set_layout(
        &self,
        device: vk::Device,
        info: &DescriptorSetLayoutCreateInfo,
    ) -> DriverResult<vk::DescriptorSetLayout>;
    fn destroy_descriptor_set_layout(&self, device: vk::Device, layout: vk::DescriptorSetLayout);

    fn create_pipeline_layout(
        &self,
        device: vk::Device,
        info: &PipelineLayoutCreateInfo,
    ) -> DriverResult<vk::PipelineLayout>;
    fn destroy_pipeline_layout(&self, device: vk::Device, layout: vk::PipelineLayout);

    fn create_descriptor_pool(
        &self,
        device: vk::Device,
        info: &DescriptorPoolCreateInfo,
    ) -> DriverResult<vk::DescriptorPool>;
    fn destroy_descriptor_pool(&self, device: vk::Device, pool: vk::DescriptorPool);
    fn reset_descriptor_pool(&self, device: vk::Device, pool: vk::DescriptorPool) -> vk::Result;
    fn allocate_descriptor_sets(
        &self,
        device: vk::Device,
        info: &DescriptorSetAllocateInfo,
    ) -> DriverResult<Vec<vk::DescriptorSet>>;
    fn free_descriptor_sets(
        &self,
        device: vk::Device,
        pool: vk::DescriptorPool,
        sets: &[vk::DescriptorSet],
    ) -> vk::Result;

    fn create_descriptor_update_template(
        &self,
        device: vk::Device,
        info: &DescriptorUpdateTemplateCreateInfo,
    ) -> DriverResult<vk::DescriptorUpdateTemplate>;
    fn destroy_descriptor_update_template(
        &self,
        device: vk::Device,
        template: vk::DescriptorUpdateTemplate,
    );
    fn update_descriptor_set_with_template(
        &self,
        device: vk::Device,
        set: vk::DescriptorSet,
        template: vk::DescriptorUpdateTemplate,
        data: &[u8],
    );

    fn create_graphics_pipelines(
        &self,
        device: vk::Device,
        infos: &[GraphicsPipelineCreateInfo],
    ) -> (vk::Result, Vec<vk::Pipeline>);
    fn create_ray_tracing_pipelines(
        &self,
        device: vk::Device,
        deferred_op: vk::DeferredOperationKHR,
        infos: &[RayTracingPipelineCreateInfo],
    ) -> (vk::Result, Vec<vk::Pipeline>);
    fn destroy_pipeline(&self, device: vk::Device, pipeline: vk::Pipeline);

    fn create_deferred_operation(
        &self,
        device: vk::Device,
    ) -> DriverResult<vk::DeferredOperationKHR>;
    fn destroy_deferred_operation(&self, device: vk::Device, op: vk::DeferredOperationKHR);
    fn deferred_operation_join(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) -> vk::Result;
    fn get_deferred_operation_result(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) -> vk::Result;
}
