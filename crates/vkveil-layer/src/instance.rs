//! Instance lifecycle and physical-device enumeration entry points.

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use tracing::debug;

use crate::chain::report_validation_failure;
use crate::context::{negotiate_api_version, InstanceContext};
use crate::driver::Driver;
use crate::types::InstanceCreateInfo;
use crate::{Chassis, LayerResult};

impl Chassis {
    /// Create an API instance. The driver reference supplied here is the
    /// down-chain dispatch for this instance and everything created
    /// under it; instance-level validators are instantiated afterwards
    /// so they can observe the finished context.
    pub fn create_instance(
        &self,
        info: &InstanceCreateInfo,
        driver: Arc<dyn Driver>,
    ) -> LayerResult<vk::Instance> {
        let api_version = negotiate_api_version(info.api_version);
        let instance = driver.create_instance(info)?;

        let ctx = Arc::new(InstanceContext::new(
            instance,
            api_version,
            info.enabled_extensions.iter().cloned().collect(),
            self.settings.clone(),
            driver,
        ));
        for &tag in &self.settings.validators {
            if let Some(v) = self.factory.create_instance_validator(tag) {
                ctx.validators.attach(v);
            }
        }
        self.instance_table.insert(instance.as_raw(), ctx.clone());

        for v in ctx.validators.snapshot() {
            v.post_call_record_create_instance(instance, info);
        }
        Ok(instance)
    }

    pub fn destroy_instance(&self, instance: vk::Instance) {
        let Some(ctx) = self.instance_table.get(instance.as_raw()) else {
            return;
        };
        for v in ctx.validators.snapshot() {
            v.pre_call_record_destroy_instance(instance);
        }
        for key in ctx.take_dispatch_keys() {
            self.instance_table.remove(key);
        }
        ctx.driver().destroy_instance(instance);
        ctx.validators.clear();
        debug!(
            instance = format_args!("{:#x}", instance.as_raw()),
            "destroyed instance context"
        );
    }

    /// Two-phase enumeration: with `out` absent only the count is
    /// produced and no array contents are touched. Enumerated physical
    /// devices are registered as instance-family dispatch keys.
    pub fn enumerate_physical_devices(
        &self,
        instance: vk::Instance,
        count: &mut u32,
        out: Option<&mut [vk::PhysicalDevice]>,
    ) -> vk::Result {
        let ctx = match self.instance_ctx(instance) {
            Ok(ctx) => ctx,
            Err(status) => return status,
        };
        let validators = ctx.validators.snapshot();
        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_enumerate_physical_devices(instance) {
                report_validation_failure(
                    v.tag(),
                    "enumerate_physical_devices",
                    instance.as_raw(),
                );
                failed = true;
                if ctx.settings.stop_on_first_error {
                    break;
                }
            }
        }
        if failed && ctx.settings.stop_on_first_error {
            return vk::Result::ERROR_VALIDATION_FAILED_EXT;
        }

        match out {
            None => ctx
                .driver()
                .enumerate_physical_devices(instance, count, None),
            Some(devices) => {
                let status = ctx.driver().enumerate_physical_devices(
                    instance,
                    count,
                    Some(&mut *devices),
                );
                if status == vk::Result::SUCCESS || status == vk::Result::INCOMPLETE {
                    let filled = (*count as usize).min(devices.len());
                    for pd in &devices[..filled] {
                        ctx.add_dispatch_key(pd.as_raw());
                        self.instance_table.insert(pd.as_raw(), ctx.clone());
                    }
                    for v in &validators {
                        v.post_call_record_enumerate_physical_devices(
                            instance,
                            &devices[..filled],
                        );
                    }
                }
                status
            }
        }
    }
}
