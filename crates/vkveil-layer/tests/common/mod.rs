//! Shared test fixtures: a mock down-chain driver that records every
//! forwarded call, a recording validator, and boot helpers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use parking_lot::Mutex;

use vkveil_core::{LayerSettings, ValidatorTag};
use vkveil_layer::chain::{Validator, ValidatorFactory};
use vkveil_layer::driver::{Driver, DriverResult};
use vkveil_layer::types::*;
use vkveil_layer::Chassis;

pub const MOCK_PHYSICAL_DEVICES: [u64; 2] = [0x11, 0x12];

/// Driver stand-in. Native values come from a counter seeded well away
/// from the registry's wrapped-value range so a test can always tell
/// which side of the boundary a handle belongs to.
pub struct MockDriver {
    next_native: AtomicU64,
    /// (operation, primary forwarded handle value) per call.
    calls: Mutex<Vec<(String, u64)>>,
    events: Option<Arc<Mutex<Vec<String>>>>,
    /// Answer OPERATION_DEFERRED_KHR for ray tracing pipeline creation
    /// when a live deferred operation is supplied.
    pub defer_rt_pipelines: AtomicBool,
    pub last_image_view_info: Mutex<Option<ImageViewCreateInfo>>,
    pub last_swapchain_info: Mutex<Option<SwapchainCreateInfo>>,
    pub last_allocate_info: Mutex<Option<DescriptorSetAllocateInfo>>,
    pub last_graphics_infos: Mutex<Vec<GraphicsPipelineCreateInfo>>,
    pub last_template_payload: Mutex<Vec<u8>>,
}

impl MockDriver {
    pub fn new() -> Arc<Self> {
        Self::build(None)
    }

    /// Variant that also pushes `driver:<op>` markers into a shared
    /// event log, so forwarding order relative to validator hooks can be
    /// asserted.
    pub fn with_events(events: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
        Self::build(Some(events))
    }

    fn build(events: Option<Arc<Mutex<Vec<String>>>>) -> Arc<Self> {
        Arc::new(Self {
            next_native: AtomicU64::new(0x9000_0000),
            calls: Mutex::new(Vec::new()),
            events,
            defer_rt_pipelines: AtomicBool::new(false),
            last_image_view_info: Mutex::new(None),
            last_swapchain_info: Mutex::new(None),
            last_allocate_info: Mutex::new(None),
            last_graphics_infos: Mutex::new(Vec::new()),
            last_template_payload: Mutex::new(Vec::new()),
        })
    }

    fn next(&self) -> u64 {
        self.next_native.fetch_add(1, Ordering::Relaxed)
    }

    fn record(&self, op: &str, handle: u64) {
        self.calls.lock().push((op.to_string(), handle));
        if let Some(events) = &self.events {
            events.lock().push(format!("driver:{op}"));
        }
    }

    /// Forwarded handle values recorded for one operation, in call order.
    pub fn forwarded(&self, op: &str) -> Vec<u64> {
        self.calls
            .lock()
            .iter()
            .filter(|(name, _)| name == op)
            .map(|(_, handle)| *handle)
            .collect()
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.forwarded(op).len()
    }
}

impl Driver for MockDriver {
    fn create_instance(&self, _info: &InstanceCreateInfo) -> DriverResult<vk::Instance> {
        let native = self.next();
        self.record("create_instance", native);
        Ok(vk::Instance::from_raw(native))
    }

    fn destroy_instance(&self, instance: vk::Instance) {
        self.record("destroy_instance", instance.as_raw());
    }

    fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
        count: &mut u32,
        out: Option<&mut [vk::PhysicalDevice]>,
    ) -> vk::Result {
        self.record("enumerate_physical_devices", instance.as_raw());
        if let Some(out) = out {
            let filled = (*count as usize).min(out.len()).min(MOCK_PHYSICAL_DEVICES.len());
            for (slot, &raw) in out.iter_mut().zip(&MOCK_PHYSICAL_DEVICES[..filled]) {
                *slot = vk::PhysicalDevice::from_raw(raw);
            }
            *count = filled as u32;
        } else {
            *count = MOCK_PHYSICAL_DEVICES.len() as u32;
        }
        vk::Result::SUCCESS
    }

    fn get_physical_device_properties(
        &self,
        physical_device: vk::PhysicalDevice,
    ) -> PhysicalDeviceProperties {
        self.record("get_physical_device_properties", physical_device.as_raw());
        PhysicalDeviceProperties {
            device_name: "vkveil mock adapter".to_string(),
            api_version: vk::API_VERSION_1_3,
            extensions: vec![
                "VK_KHR_swapchain".to_string(),
                "VK_KHR_ray_tracing_pipeline".to_string(),
            ],
        }
    }

    fn get_physical_device_features(&self, physical_device: vk::PhysicalDevice) -> Vec<String> {
        self.record("get_physical_device_features", physical_device.as_raw());
        vec!["geometryShader".to_string(), "samplerAnisotropy".to_string()]
    }

    fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        _info: &DeviceCreateInfo,
    ) -> DriverResult<vk::Device> {
        self.record("create_device", physical_device.as_raw());
        Ok(vk::Device::from_raw(self.next()))
    }

    fn destroy_device(&self, device: vk::Device) {
        self.record("destroy_device", device.as_raw());
    }

    fn get_device_queue(&self, device: vk::Device, family: u32, index: u32) -> vk::Queue {
        self.record("get_device_queue", device.as_raw());
        vk::Queue::from_raw(device.as_raw() + 0x100 + (family as u64) * 8 + index as u64)
    }

    fn create_render_pass(
        &self,
        device: vk::Device,
        _info: &RenderPassCreateInfo,
    ) -> DriverResult<vk::RenderPass> {
        self.record("create_render_pass", device.as_raw());
        Ok(vk::RenderPass::from_raw(self.next()))
    }

    fn destroy_render_pass(&self, _device: vk::Device, render_pass: vk::RenderPass) {
        self.record("destroy_render_pass", render_pass.as_raw());
    }

    fn create_swapchain(
        &self,
        _device: vk::Device,
        info: &SwapchainCreateInfo,
    ) -> DriverResult<vk::SwapchainKHR> {
        self.record("create_swapchain", info.old_swapchain.as_raw());
        *self.last_swapchain_info.lock() = Some(info.clone());
        Ok(vk::SwapchainKHR::from_raw(self.next()))
    }

    fn destroy_swapchain(&self, _device: vk::Device, swapchain: vk::SwapchainKHR) {
        self.record("destroy_swapchain", swapchain.as_raw());
    }

    fn get_swapchain_images(
        &self,
        _device: vk::Device,
        swapchain: vk::SwapchainKHR,
        count: &mut u32,
        out: Option<&mut [vk::Image]>,
    ) -> vk::Result {
        self.record("get_swapchain_images", swapchain.as_raw());
        // Image handles derived from the swapchain: identical natives on
        // every enumeration of the same swapchain.
        let natives: Vec<u64> = (1..=3).map(|i| swapchain.as_raw() + 0x1000 + i).collect();
        if let Some(out) = out {
            let filled = (*count as usize).min(out.len()).min(natives.len());
            for (slot, &raw) in out.iter_mut().zip(&natives[..filled]) {
                *slot = vk::Image::from_raw(raw);
            }
            *count = filled as u32;
        } else {
            *count = natives.len() as u32;
        }
        vk::Result::SUCCESS
    }

    fn create_sampler_ycbcr_conversion(
        &self,
        device: vk::Device,
        _info: &SamplerYcbcrConversionCreateInfo,
    ) -> DriverResult<vk::SamplerYcbcrConversion> {
        self.record("create_sampler_ycbcr_conversion", device.as_raw());
        Ok(vk::SamplerYcbcrConversion::from_raw(self.next()))
    }

    fn destroy_sampler_ycbcr_conversion(
        &self,
        _device: vk::Device,
        conversion: vk::SamplerYcbcrConversion,
    ) {
        self.record("destroy_sampler_ycbcr_conversion", conversion.as_raw());
    }

    fn create_image_view(
        &self,
        _device: vk::Device,
        info: &ImageViewCreateInfo,
    ) -> DriverResult<vk::ImageView> {
        self.record("create_image_view", info.image.as_raw());
        *self.last_image_view_info.lock() = Some(info.clone());
        Ok(vk::ImageView::from_raw(self.next()))
    }

    fn destroy_image_view(&self, _device: vk::Device, view: vk::ImageView) {
        self.record("destroy_image_view", view.as_raw());
    }

    fn create_descriptor_set_layout(
        &self,
        device: vk::Device,
        _info: &DescriptorSetLayoutCreateInfo,
    ) -> DriverResult<vk::DescriptorSetLayout> {
        self.record("create_descriptor_set_layout", device.as_raw());
        Ok(vk::DescriptorSetLayout::from_raw(self.next()))
    }

    fn destroy_descriptor_set_layout(&self, _device: vk::Device, layout: vk::DescriptorSetLayout) {
        self.record("destroy_descriptor_set_layout", layout.as_raw());
    }

    fn create_pipeline_layout(
        &self,
        device: vk::Device,
        _info: &PipelineLayoutCreateInfo,
    ) -> DriverResult<vk::PipelineLayout> {
        self.record("create_pipeline_layout", device.as_raw());
        Ok(vk::PipelineLayout::from_raw(self.next()))
    }

    fn destroy_pipeline_layout(&self, _device: vk::Device, layout: vk::PipelineLayout) {
        self.record("destroy_pipeline_layout", layout.as_raw());
    }

    fn create_descriptor_pool(
        &self,
        device: vk::Device,
        _info: &DescriptorPoolCreateInfo,
    ) -> DriverResult<vk::DescriptorPool> {
        self.record("create_descriptor_pool", device.as_raw());
        Ok(vk::DescriptorPool::from_raw(self.next()))
    }

    fn destroy_descriptor_pool(&self, _device: vk::Device, pool: vk::DescriptorPool) {
        self.record("destroy_descriptor_pool", pool.as_raw());
    }

    fn reset_descriptor_pool(&self, _device: vk::Device, pool: vk::DescriptorPool) -> vk::Result {
        self.record("reset_descriptor_pool", pool.as_raw());
        vk::Result::SUCCESS
    }

    fn allocate_descriptor_sets(
        &self,
        _device: vk::Device,
        info: &DescriptorSetAllocateInfo,
    ) -> DriverResult<Vec<vk::DescriptorSet>> {
        self.record("allocate_descriptor_sets", info.descriptor_pool.as_raw());
        *self.last_allocate_info.lock() = Some(info.clone());
        Ok(info
            .set_layouts
            .iter()
            .map(|_| vk::DescriptorSet::from_raw(self.next()))
            .collect())
    }

    fn free_descriptor_sets(
        &self,
        _device: vk::Device,
        pool: vk::DescriptorPool,
        _sets: &[vk::DescriptorSet],
    ) -> vk::Result {
        self.record("free_descriptor_sets", pool.as_raw());
        vk::Result::SUCCESS
    }

    fn create_descriptor_update_template(
        &self,
        device: vk::Device,
        _info: &DescriptorUpdateTemplateCreateInfo,
    ) -> DriverResult<vk::DescriptorUpdateTemplate> {
        self.record("create_descriptor_update_template", device.as_raw());
        Ok(vk::DescriptorUpdateTemplate::from_raw(self.next()))
    }

    fn destroy_descriptor_update_template(
        &self,
        _device: vk::Device,
        template: vk::DescriptorUpdateTemplate,
    ) {
        self.record("destroy_descriptor_update_template", template.as_raw());
    }

    fn update_descriptor_set_with_template(
        &self,
        _device: vk::Device,
        set: vk::DescriptorSet,
        _template: vk::DescriptorUpdateTemplate,
        data: &[u8],
    ) {
        self.record("update_descriptor_set_with_template", set.as_raw());
        *self.last_template_payload.lock() = data.to_vec();
    }

    fn create_graphics_pipelines(
        &self,
        device: vk::Device,
        infos: &[GraphicsPipelineCreateInfo],
    ) -> (vk::Result, Vec<vk::Pipeline>) {
        self.record("create_graphics_pipelines", device.as_raw());
        *self.last_graphics_infos.lock() = infos.to_vec();
        let pipelines = infos
            .iter()
            .map(|_| vk::Pipeline::from_raw(self.next()))
            .collect();
        (vk::Result::SUCCESS, pipelines)
    }

    fn create_ray_tracing_pipelines(
        &self,
        _device: vk::Device,
        deferred_op: vk::DeferredOperationKHR,
        infos: &[RayTracingPipelineCreateInfo],
    ) -> (vk::Result, Vec<vk::Pipeline>) {
        self.record("create_ray_tracing_pipelines", deferred_op.as_raw());
        let pipelines = infos
            .iter()
            .map(|_| vk::Pipeline::from_raw(self.next()))
            .collect();
        let status = if deferred_op != vk::DeferredOperationKHR::null()
            && self.defer_rt_pipelines.load(Ordering::Relaxed)
        {
            vk::Result::OPERATION_DEFERRED_KHR
        } else {
            vk::Result::SUCCESS
        };
        (status, pipelines)
    }

    fn destroy_pipeline(&self, _device: vk::Device, pipeline: vk::Pipeline) {
        self.record("destroy_pipeline", pipeline.as_raw());
    }

    fn create_deferred_operation(&self, device: vk::Device) -> DriverResult<vk::DeferredOperationKHR> {
        self.record("create_deferred_operation", device.as_raw());
        Ok(vk::DeferredOperationKHR::from_raw(self.next()))
    }

    fn destroy_deferred_operation(&self, _device: vk::Device, op: vk::DeferredOperationKHR) {
        self.record("destroy_deferred_operation", op.as_raw());
    }

    fn deferred_operation_join(
        &self,
        _device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) -> vk::Result {
        self.record("deferred_operation_join", op.as_raw());
        vk::Result::SUCCESS
    }

    fn get_deferred_operation_result(
        &self,
        _device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) -> vk::Result {
        self.record("get_deferred_operation_result", op.as_raw());
        vk::Result::SUCCESS
    }
}

// ── Recording validator ─────────────────────────────────────

/// Validator that appends `<tag>:<phase>:<op>` markers to a shared log.
/// Failure switches make it report on selected operations.
pub struct RecordingValidator {
    tag: ValidatorTag,
    events: Arc<Mutex<Vec<String>>>,
    pub fail_create_render_pass: bool,
}

impl RecordingValidator {
    fn push(&self, phase: &str, op: &str) {
        self.events
            .lock()
            .push(format!("{:?}:{phase}:{op}", self.tag));
    }
}

impl Validator for RecordingValidator {
    fn tag(&self) -> ValidatorTag {
        self.tag
    }

    fn pre_call_validate_create_render_pass(
        &self,
        _device: vk::Device,
        _info: &RenderPassCreateInfo,
    ) -> bool {
        self.push("validate", "create_render_pass");
        self.fail_create_render_pass
    }

    fn pre_call_record_create_render_pass(&self, _device: vk::Device, _info: &RenderPassCreateInfo) {
        self.push("record_pre", "create_render_pass");
    }

    fn post_call_record_create_render_pass(
        &self,
        _device: vk::Device,
        _info: &RenderPassCreateInfo,
        _render_pass: vk::RenderPass,
    ) {
        self.push("record_post", "create_render_pass");
    }

    fn pre_call_record_destroy_render_pass(&self, _device: vk::Device, _render_pass: vk::RenderPass) {
        self.push("record_pre", "destroy_render_pass");
    }

    fn post_call_record_destroy_render_pass(
        &self,
        _device: vk::Device,
        _render_pass: vk::RenderPass,
    ) {
        self.push("record_post", "destroy_render_pass");
    }

    fn post_call_record_create_device(
        &self,
        _physical_device: vk::PhysicalDevice,
        _info: &DeviceCreateInfo,
        _device: vk::Device,
    ) {
        self.push("record_post", "create_device");
    }

    fn pre_call_record_destroy_device(&self, _device: vk::Device) {
        self.push("record_pre", "destroy_device");
    }
}

/// Factory producing one [`RecordingValidator`] per enabled tag, all
/// sharing one event log.
pub struct RecordingFactory {
    pub events: Arc<Mutex<Vec<String>>>,
    pub fail_tags: Vec<ValidatorTag>,
}

impl RecordingFactory {
    pub fn new() -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let factory = Arc::new(Self {
            events: events.clone(),
            fail_tags: Vec::new(),
        });
        (factory, events)
    }

    pub fn failing(tags: Vec<ValidatorTag>) -> (Arc<Self>, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let factory = Arc::new(Self {
            events: events.clone(),
            fail_tags: tags,
        });
        (factory, events)
    }

    fn make(&self, tag: ValidatorTag) -> Arc<dyn Validator> {
        Arc::new(RecordingValidator {
            tag,
            events: self.events.clone(),
            fail_create_render_pass: self.fail_tags.contains(&tag),
        })
    }
}

impl ValidatorFactory for RecordingFactory {
    fn create_instance_validator(&self, tag: ValidatorTag) -> Option<Arc<dyn Validator>> {
        Some(self.make(tag))
    }

    fn create_device_validator(
        &self,
        tag: ValidatorTag,
        _instance_validator: Option<Arc<dyn Validator>>,
    ) -> Option<Arc<dyn Validator>> {
        Some(self.make(tag))
    }
}

// ── Boot helpers ────────────────────────────────────────────

pub fn two_validator_settings() -> LayerSettings {
    LayerSettings {
        validators: vec![ValidatorTag::Threading, ValidatorTag::CoreValidation],
        ..LayerSettings::default()
    }
}

/// Instance + one device on the first enumerated physical device.
pub fn boot(
    chassis: &Chassis,
    driver: Arc<MockDriver>,
) -> (vk::Instance, vk::PhysicalDevice, vk::Device) {
    let instance = chassis
        .create_instance(&InstanceCreateInfo::default(), driver)
        .unwrap();
    let mut count = 0;
    assert_eq!(
        chassis.enumerate_physical_devices(instance, &mut count, None),
        vk::Result::SUCCESS
    );
    let mut devices = vec![vk::PhysicalDevice::null(); count as usize];
    assert_eq!(
        chassis.enumerate_physical_devices(instance, &mut count, Some(&mut devices)),
        vk::Result::SUCCESS
    );
    let physical_device = devices[0];
    let device = chassis
        .create_device(physical_device, &DeviceCreateInfo::default())
        .unwrap();
    (instance, physical_device, device)
}
