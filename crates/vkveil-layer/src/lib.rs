//! vkveil layer chassis.
//!
//! The interception core that sits between an application and the real
//! driver: it substitutes layer-issued opaque identifiers for the
//! driver's non-dispatchable handles, resolves the owning context for
//! every intercepted call, walks the context's validator chain around
//! the forwarded call, and keeps the auxiliary bookkeeping (render-pass
//! usage, swapchain images, descriptor-pool membership, update-template
//! shadows) that later calls need to wrap and unwrap correctly.

use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use tracing::info;

use vkveil_core::{HandleRegistry, LayerSettings};

pub mod chain;
pub mod context;
pub mod deferred;
pub mod dispatch;
pub mod driver;
pub mod locks;
pub mod state;
pub mod types;

mod deferred_ops;
mod descriptor;
mod device;
mod image_view;
mod instance;
mod pipeline;
mod renderpass;
mod swapchain;

pub use chain::{NoopValidatorFactory, Validator, ValidatorChain, ValidatorFactory};
pub use context::{DeviceContext, InstanceContext};
pub use deferred::{DeferredOperationTracker, DeferredResult};
pub use driver::{Driver, DriverResult};
pub use locks::{begin_blocking_region, end_blocking_region, BlockingRegion};
pub use vkveil_core::{CoreError, ValidatorTag};

/// Result alias for entry points that mirror the wrapped API's
/// status-code convention. The only status the layer itself introduces
/// is `ERROR_VALIDATION_FAILED_EXT` for an aborted call.
pub type LayerResult<T> = Result<T, vk::Result>;

/// The dispatch & handle-virtualization core. One per loaded layer;
/// constructed explicitly and shared by `Arc` rather than living in
/// file-scope statics.
pub struct Chassis {
    settings: LayerSettings,
    registry: Arc<HandleRegistry>,
    instance_table: dispatch::InstanceTable,
    device_table: dispatch::DeviceTable,
    factory: Arc<dyn ValidatorFactory>,
}

impl Chassis {
    pub fn new(settings: LayerSettings, factory: Arc<dyn ValidatorFactory>) -> Arc<Self> {
        info!(
            wrap_handles = settings.wrap_handles,
            stop_on_first_error = settings.stop_on_first_error,
            validators = settings.validators.len(),
            "initializing vkveil chassis"
        );
        let registry = Arc::new(HandleRegistry::new(settings.wrap_handles));
        Arc::new(Self {
            registry,
            settings,
            instance_table: dispatch::InstanceTable::new(),
            device_table: dispatch::DeviceTable::new(),
            factory,
        })
    }

    /// Library-load entry path: initialize logging and construct from
    /// on-disk settings (`vkveil.toml`, overridable via VKVEIL_CONFIG).
    pub fn load(factory: Arc<dyn ValidatorFactory>) -> Arc<Self> {
        vkveil_common::logging::init_logging();
        Self::new(LayerSettings::load_or_default(), factory)
    }

    pub fn registry(&self) -> &HandleRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &LayerSettings {
        &self.settings
    }

    /// The instance context owning a dispatchable handle, or `None`.
    pub fn instance_context(&self, key: impl Handle) -> Option<Arc<InstanceContext>> {
        self.instance_table.get(key.as_raw())
    }

    /// The device context owning a dispatchable handle, or `None`.
    pub fn device_context(&self, key: impl Handle) -> Option<Arc<DeviceContext>> {
        self.device_table.get(key.as_raw())
    }

    pub(crate) fn instance_ctx(&self, key: impl Handle) -> LayerResult<Arc<InstanceContext>> {
        self.instance_table
            .get(key.as_raw())
            .ok_or(vk::Result::ERROR_INITIALIZATION_FAILED)
    }

    pub(crate) fn device_ctx(&self, device: vk::Device) -> LayerResult<Arc<DeviceContext>> {
        self.device_table
            .get(device.as_raw())
            .ok_or(vk::Result::ERROR_DEVICE_LOST)
    }

    /// Tear down every remaining instance and device context (library
    /// unload). Clears the last-used device cache before the tables and
    /// is safe to call after contexts were already destroyed normally.
    pub fn free_all_contexts(&self) {
        for ctx in self.device_table.drain() {
            ctx.validators.clear();
        }
        for ctx in self.instance_table.drain() {
            ctx.validators.clear();
        }
        info!("freed all layer contexts");
    }

    // ── Wrapping helpers ────────────────────────────────────
    //
    // The `wrap` flag is the wrapping mode sampled once near the top of
    // the intercepted call, so one call never mixes modes.

    pub(crate) fn wrap_h<T: Handle + Copy>(&self, wrap: bool, native: T) -> T {
        if !wrap || native.as_raw() == 0 {
            return native;
        }
        T::from_raw(self.registry.wrap_new(native.as_raw()))
    }

    /// Unwrap an input handle. An unknown handle passes through
    /// unchanged: the object may have been created while wrapping was
    /// disabled, which is tolerated rather than treated as corruption.
    pub(crate) fn unwrap_h<T: Handle + Copy>(&self, wrap: bool, wrapped: T) -> T {
        if !wrap {
            return wrapped;
        }
        let raw = wrapped.as_raw();
        if raw == 0 {
            return wrapped;
        }
        T::from_raw(self.registry.find(raw).unwrap_or(raw))
    }

    /// Remove the mapping at destroy time, passing unknown handles
    /// through unchanged.
    pub(crate) fn erase_h<T: Handle + Copy>(&self, wrap: bool, wrapped: T) -> T {
        if !wrap {
            return wrapped;
        }
        let raw = wrapped.as_raw();
        if raw == 0 {
            return wrapped;
        }
        T::from_raw(self.registry.erase(raw).unwrap_or(raw))
    }
}
