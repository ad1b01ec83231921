//! Descriptor pool, set, and update-template entry points.
//!
//! The pool membership table exists so destroying or resetting a pool
//! can cascade-erase the registry mappings of every set implicitly freed
//! with it. The template shadow copies exist because the later
//! update-with-template call passes an untyped byte buffer whose layout
//! only the creation-time description knows.

use ash::vk;
use ash::vk::Handle;

use crate::chain::report_validation_failure;
use crate::types::{
    descriptor_type_is_image, DescriptorPoolCreateInfo, DescriptorSetAllocateInfo,
    DescriptorSetLayoutCreateInfo, DescriptorUpdateTemplateCreateInfo, DESCRIPTOR_PAYLOAD_SIZE,
};
use crate::{Chassis, LayerResult};

impl Chassis {
    // ── Descriptor set layout ───────────────────────────────

    pub fn create_descriptor_set_layout(
        &self,
        device: vk::Device,
        info: &DescriptorSetLayoutCreateInfo,
    ) -> LayerResult<vk::DescriptorSetLayout> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_descriptor_set_layout(device, info) {
                report_validation_failure(
                    v.tag(),
                    "create_descriptor_set_layout",
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
        for v in &validators {
            v.pre_call_record_create_descriptor_set_layout(device, info);
        }

        let native = ctx.driver().create_descriptor_set_layout(device, info)?;
        let layout = self.wrap_h(wrap, native);
        for v in &validators {
            v.post_call_record_create_descriptor_set_layout(device, info, layout);
        }
        Ok(layout)
    }

    pub fn destroy_descriptor_set_layout(
        &self,
        device: vk::Device,
        layout: vk::DescriptorSetLayout,
    ) {
        if layout == vk::DescriptorSetLayout::null() {
            return;
        }
        let Ok(ctx) = self.device_ctx(device) else {
            return;
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        for v in &validators {
            v.pre_call_record_destroy_descriptor_set_layout(device, layout);
        }
        let native = self.erase_h(wrap, layout);
        ctx.driver().destroy_descriptor_set_layout(device, native);
        for v in &validators {
            v.post_call_record_destroy_descriptor_set_layout(device, layout);
        }
    }

    // ── Descriptor pool ─────────────────────────────────────

    pub fn create_descriptor_pool(
        &self,
        device: vk::Device,
        info: &DescriptorPoolCreateInfo,
    ) -> LayerResult<vk::DescriptorPool> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_descriptor_pool(device, info) {
                report_validation_failure(v.tag(), "create_descriptor_pool", device.as_raw());
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
                v.pre_call_record_create_descriptor_pool(device, info);
            }
        }

        let native = ctx.driver().create_descriptor_pool(device, info)?;
        let pool = self.wrap_h(wrap, native);
        {
            let mut state = ctx.state.write();
            state.pool_sets.insert(pool.as_raw(), Default::default());
            for v in &validators {
                v.post_call_record_create_descriptor_pool(device, info, pool);
            }
        }
        Ok(pool)
    }

    pub fn destroy_descriptor_pool(&self, device: vk::Device, pool: vk::DescriptorPool) {
        if pool == vk::DescriptorPool::null() {
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
                v.pre_call_record_destroy_descriptor_pool(device, pool);
            }
            // Sets allocated from the pool are implicitly freed with it,
            // whether or not free_descriptor_sets was ever called.
            if let Some(sets) = state.pool_sets.remove(&pool.as_raw()) {
                for set in sets {
                    self.registry.erase(set);
                }
            }
        }
        let native = self.erase_h(wrap, pool);
        ctx.driver().destroy_descriptor_pool(device, native);
        for v in &validators {
            v.post_call_record_destroy_descriptor_pool(device, pool);
        }
    }

    pub fn reset_descriptor_pool(&self, device: vk::Device, pool: vk::DescriptorPool) -> vk::Result {
        let ctx = match self.device_ctx(device) {
            Ok(ctx) => ctx,
            Err(status) => return status,
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_reset_descriptor_pool(device, pool) {
                report_validation_failure(v.tag(), "reset_descriptor_pool", pool.as_raw());
                failed = true;
                if ctx.settings().stop_on_first_error {
                    break;
                }
            }
        }
        if failed && ctx.settings().stop_on_first_error {
            return vk::Result::ERROR_VALIDATION_FAILED_EXT;
        }
        {
            let mut state = ctx.state.write();
            for v in &validators {
                v.pre_call_record_reset_descriptor_pool(device, pool);
            }
            // Reset frees every set without destroying the pool.
            if let Some(sets) = state.pool_sets.get_mut(&pool.as_raw()) {
                for set in sets.drain() {
                    self.registry.erase(set);
                }
            }
        }
        let native = self.unwrap_h(wrap, pool);
        let status = ctx.driver().reset_descriptor_pool(device, native);
        for v in &validators {
            v.post_call_record_reset_descriptor_pool(device, pool);
        }
        status
    }

    // ── Descriptor sets ─────────────────────────────────────

    pub fn allocate_descriptor_sets(
        &self,
        device: vk::Device,
        info: &DescriptorSetAllocateInfo,
    ) -> LayerResult<Vec<vk::DescriptorSet>> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_allocate_descriptor_sets(device, info) {
                report_validation_failure(
                    v.tag(),
                    "allocate_descriptor_sets",
                    info.descriptor_pool.as_raw(),
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
                v.pre_call_record_allocate_descriptor_sets(device, info);
            }
        }

        let mut forwarded = info.clone();
        forwarded.descriptor_pool = self.unwrap_h(wrap, info.descriptor_pool);
        for layout in &mut forwarded.set_layouts {
            *layout = self.unwrap_h(wrap, *layout);
        }

        let natives = ctx.driver().allocate_descriptor_sets(device, &forwarded)?;
        let sets: Vec<vk::DescriptorSet> =
            natives.into_iter().map(|s| self.wrap_h(wrap, s)).collect();
        {
            let mut state = ctx.state.write();
            let members = state
                .pool_sets
                .entry(info.descriptor_pool.as_raw())
                .or_default();
            for set in &sets {
                members.insert(set.as_raw());
            }
            for v in &validators {
                v.post_call_record_allocate_descriptor_sets(device, info, &sets);
            }
        }
        Ok(sets)
    }

    pub fn free_descriptor_sets(
        &self,
        device: vk::Device,
        pool: vk::DescriptorPool,
        sets: &[vk::DescriptorSet],
    ) -> vk::Result {
        let ctx = match self.device_ctx(device) {
            Ok(ctx) => ctx,
            Err(status) => return status,
        };
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();
        {
            let mut state = ctx.state.write();
            for v in &validators {
                v.pre_call_record_free_descriptor_sets(device, pool, sets);
            }
            if let Some(members) = state.pool_sets.get_mut(&pool.as_raw()) {
                for set in sets {
                    members.remove(&set.as_raw());
                }
            }
        }
        let native_pool = self.unwrap_h(wrap, pool);
        let natives: Vec<vk::DescriptorSet> =
            sets.iter().map(|&s| self.erase_h(wrap, s)).collect();
        let status = ctx
            .driver()
            .free_descriptor_sets(device, native_pool, &natives);
        for v in &validators {
            v.post_call_record_free_descriptor_sets(device, pool, sets);
        }
        status
    }

    // ── Descriptor update templates ─────────────────────────

    pub fn create_descriptor_update_template(
        &self,
        device: vk::Device,
        info: &DescriptorUpdateTemplateCreateInfo,
    ) -> LayerResult<vk::DescriptorUpdateTemplate> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_create_descriptor_update_template(device, info) {
                report_validation_failure(
                    v.tag(),
                    "create_descriptor_update_template",
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
                v.pre_call_record_create_descriptor_update_template(device, info);
            }
        }

        let native = ctx
            .driver()
            .create_descriptor_update_template(device, info)?;
        let template = self.wrap_h(wrap, native);
        {
            let mut state = ctx.state.write();
            // Deep copy; update calls only carry a raw byte buffer laid
            // out per these entries.
            state
                .update_templates
                .insert(template.as_raw(), info.entries.clone());
            for v in &validators {
                v.post_call_record_create_descriptor_update_template(device, info, template);
            }
        }
        Ok(template)
    }

    pub fn destroy_descriptor_update_template(
        &self,
        device: vk::Device,
        template: vk::DescriptorUpdateTemplate,
    ) {
        if template == vk::DescriptorUpdateTemplate::null() {
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
                v.pre_call_record_destroy_descriptor_update_template(device, template);
            }
            state.update_templates.remove(&template.as_raw());
        }
        let native = self.erase_h(wrap, template);
        ctx.driver().destroy_descriptor_update_template(device, native);
        for v in &validators {
            v.post_call_record_destroy_descriptor_update_template(device, template);
        }
    }

    /// Rewrite the raw update payload: every handle at an offset the
    /// template's shadow copy describes is located and unwrapped before
    /// the buffer is forwarded. Image descriptors carry an image view at
    /// byte 8 of each element; buffer descriptors carry a buffer handle
    /// at byte 0 (not layer-wrapped, so it passes through via the same
    /// lookup-or-keep rule).
    pub fn update_descriptor_set_with_template(
        &self,
        device: vk::Device,
        set: vk::DescriptorSet,
        template: vk::DescriptorUpdateTemplate,
        data: &[u8],
    ) -> LayerResult<()> {
        let ctx = self.device_ctx(device)?;
        let wrap = self.registry.wrapping_enabled();
        let validators = ctx.validators.snapshot();

        let mut failed = false;
        for v in &validators {
            if v.pre_call_validate_update_descriptor_set_with_template(device, set, template) {
                report_validation_failure(
                    v.tag(),
                    "update_descriptor_set_with_template",
                    set.as_raw(),
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
        for v in &validators {
            v.pre_call_record_update_descriptor_set_with_template(device, set, template);
        }

        let native_set = self.unwrap_h(wrap, set);
        let native_template = self.unwrap_h(wrap, template);

        let entries = {
            let state = ctx.state.read();
            state.update_templates.get(&template.as_raw()).cloned()
        };

        let forwarded: Vec<u8> = match (&entries, wrap) {
            (Some(entries), true) => {
                let mut buf = data.to_vec();
                for entry in entries {
                    for i in 0..entry.descriptor_count as usize {
                        let base = entry.offset + i * entry.stride;
                        let handle_at = if descriptor_type_is_image(entry.descriptor_type) {
                            base + 8
                        } else {
                            base
                        };
                        if handle_at + 8 > buf.len() || base + DESCRIPTOR_PAYLOAD_SIZE > buf.len()
                        {
                            continue;
                        }
                        let wrapped: u64 =
                            bytemuck::pod_read_unaligned(&buf[handle_at..handle_at + 8]);
                        if let Some(native) = self.registry.find(wrapped) {
                            buf[handle_at..handle_at + 8]
                                .copy_from_slice(bytemuck::bytes_of(&native));
                        }
                    }
                }
                buf
            }
            // No shadow copy (template never recorded) or wrapping off:
            // the payload is forwarded untouched.
            _ => data.to_vec(),
        };

        ctx.driver().update_descriptor_set_with_template(
            device,
            native_set,
            native_template,
            &forwarded,
        );
        for v in &validators {
            v.post_call_record_update_descriptor_set_with_template(device, set, template);
        }
        Ok(())
    }
}
