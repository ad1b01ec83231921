//! Device lifecycle entry points.

use std::collections::HashSet;
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use tracing::debug;

use crate::chain::report_validation_failure;
use crate::context::DeviceContext;
use crate::types::DeviceCreateInfo;
use crate::{Chassis, LayerResult};

impl Chassis {
    /// Create a logical device under an existing instance context. The
    /// device's enabled extension and feature sets are the intersection
    /// of what the application requested and what the physical device
    /// reports; capability data is cached on the context for the
    /// device's lifetime.
    pub fn create_device(
        &self,
        physical_device: vk::PhysicalDevice,
        info: &DeviceCreateInfo,
    ) -> LayerResult<vk::Device> {
        let instance_ctx = self.instance_ctx(physical_device)?;
        let validators = instance_ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_device(physical_device, info) {
                report_validation_failure(v.tag(), "create_device", physical_device.as_raw());
                failed = true;
                if instance_ctx.settings.stop_on_first_error {
                    break;
                }
            }
        }
        if failed && instance_ctx.settings.stop_on_first_error {
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }
        for v in &validators {
            v.pre_call_record_create_device(physical_device, info);
        }

        let driver = instance_ctx.driver().clone();
        let properties = driver.get_physical_device_properties(physical_device);
        let supported_features: HashSet<String> = driver
            .get_physical_device_features(physical_device)
            .into_iter()
            .collect();
        let supported_extensions: HashSet<&str> =
            properties.extensions.iter().map(String::as_str).collect();

        let enabled_extensions: HashSet<String> = info
            .enabled_extensions
            .iter()
            .filter(|e| supported_extensions.contains(e.as_str()))
            .cloned()
            .collect();
        let enabled_features: HashSet<String> = info
            .enabled_features
            .iter()
            .filter(|f| supported_features.contains(*f))
            .cloned()
            .collect();

        let device = driver.create_device(physical_device, info)?;

        let ctx = Arc::new(DeviceContext::new(
            device,
            instance_ctx.clone(),
            physical_device,
            properties,
            enabled_extensions,
            enabled_features,
        ));
        for &tag in &instance_ctx.settings.validators {
            let under = instance_ctx.validators.find(tag);
            if let Some(v) = self.factory.create_device_validator(tag, under) {
                ctx.validators.attach(v);
            }
        }
        self.device_table.insert(device.as_raw(), ctx);

        for v in &validators {
            v.post_call_record_create_device(physical_device, info, device);
        }
        Ok(device)
    }

    pub fn destroy_device(&self, device: vk::Device) {
        let Some(ctx) = self.device_table.get(device.as_raw()) else {
            return;
        };
        for v in ctx.validators.snapshot() {
            v.pre_call_record_destroy_device(device);
        }
        // Cache invalidation happens inside remove(), before each table
        // entry is erased.
        for key in ctx.take_dispatch_keys() {
            self.device_table.remove(key);
        }
        ctx.driver().destroy_device(device);
        let validators = ctx.validators.snapshot();
        for v in &validators {
            v.post_call_record_destroy_device(device);
        }
        ctx.validators.clear();
        debug!(
            device = format_args!("{:#x}", device.as_raw()),
            "destroyed device context"
        );
    }

    /// Queues are dispatchable children of the device; each one is
    /// registered as a device-family dispatch key resolving to the same
    /// context.
    pub fn get_device_queue(
        &self,
        device: vk::Device,
        family: u32,
        index: u32,
    ) -> LayerResult<vk::Queue> {
        let ctx = self.device_ctx(device)?;
        let queue = ctx.driver().get_device_queue(device, family, index);
        if queue.as_raw() != 0 {
            ctx.add_dispatch_key(queue.as_raw());
            self.device_table.insert(queue.as_raw(), ctx.clone());
        }
        for v in ctx.validators.snapshot() {
            v.post_call_record_get_device_queue(device, family, index, queue);
        }
        Ok(queue)
    }
}
