//! Deferred-operation entry points.
//!
//! Completion is observed on two paths, the join call and the result
//! query, and only when the driver reports the operation finished. The
//! tracker's take-under-mutex semantics make the observation idempotent,
//! so both paths simply report in.

use ash::vk;
use ash::vk::Handle;

use crate::{Chassis, LayerResult};

impl Chassis {
    pub fn create_deferred_operation(
        &self,
        device: vk::Device,
    ) -> LayerResult<vk::DeferredOperationKHR> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let native = ctx.driver().create_deferred_operation(device)?;
        // Tracker entries are keyed by the native handle; continuations
        // registered later (pipeline creation) resolve through the same
        // unwrap path.
        ctx.deferred.register_op(native.as_raw());
        let op = self.wrap_h(wrap, native);
        for v in &validators {
            v.post_call_record_create_deferred_operation(device, op);
        }
        Ok(op)
    }

    pub fn destroy_deferred_operation(&self, device: vk::Device, op: vk::DeferredOperationKHR) {
        if op == vk::DeferredOperationKHR::null() {
            return;
        }
        let Ok(ctx) = self.device_ctx(device) else {
            return;
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        for v in &validators {
            v.pre_call_record_destroy_deferred_operation(device, op);
        }
        let native = self.erase_h(wrap, op);
        ctx.deferred.remove(native.as_raw());
        ctx.driver().destroy_deferred_operation(device, native);
        for v in &validators {
            v.post_call_record_destroy_deferred_operation(device, op);
        }
    }

    pub fn deferred_operation_join(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) -> vk::Result {
        let ctx = match self.device_ctx(device) {
            Ok(ctx) => ctx,
            Err(status) => return status,
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        for v in &validators {
            v.pre_call_record_deferred_operation_join(device, op);
        }
        let native = self.unwrap_h(wrap, op);
        // The device-state lock is not held across the join; a validator
        // that joins from its own record hook uses a blocking region
        // instead.
        let status = ctx.driver().deferred_operation_join(device, native);
        if status == vk::Result::SUCCESS {
            ctx.deferred.observe_completion(native.as_raw());
        }
        for v in &validators {
            v.post_call_record_deferred_operation_join(device, op, status);
        }
        status
    }

    pub fn get_deferred_operation_result(
        &self,
        device: vk::Device,
        op: vk::DeferredOperationKHR,
    ) -> vk::Result {
        let ctx = match self.device_ctx(device) {
            Ok(ctx) => ctx,
            Err(status) => return status,
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        let native = self.unwrap_h(wrap, op);
        let status = ctx.driver().get_deferred_operation_result(device, native);
        if status == vk::Result::SUCCESS {
            ctx.deferred.observe_completion(native.as_raw());
        }
        for v in &validators {
            v.post_call_record_get_deferred_operation_result(device, op, status);
        }
        status
    }
}
