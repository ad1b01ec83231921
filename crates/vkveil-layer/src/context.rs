//! Per-instance and per-device context records.
//!
//! Every other subsystem hangs off these: cached capability data,
//! settings, the validator chains, the auxiliary caches, and the
//! deferred-operation tracker. An instance context must outlive every
//! device context it produced; the wrapped API's own destruction-order
//! contract guarantees that, the `Arc` back-reference merely keeps the
//! lifetime safe if an application violates it.

use std::collections::HashSet;
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use parking_lot::Mutex;
use tracing::debug;

use vkveil_core::LayerSettings;

use crate::chain::ValidatorChain;
use crate::deferred::DeferredOperationTracker;
use crate::driver::Driver;
use crate::locks::DeviceStateLock;
use crate::types::PhysicalDeviceProperties;

/// The layer's supported API version; requested versions are clamped to
/// this at instance creation.
pub const SUPPORTED_API_VERSION: u32 = vk::API_VERSION_1_3;

/// Normalize the application's requested API version: zero means 1.0,
/// anything newer than the layer supports is clamped down.
pub fn negotiate_api_version(requested: u32) -> u32 {
    let requested = if requested == 0 {
        vk::API_VERSION_1_0
    } else {
        requested
    };
    requested.min(SUPPORTED_API_VERSION)
}

pub struct InstanceContext {
    instance: vk::Instance,
    pub api_version: u32,
    pub enabled_extensions: HashSet<String>,
    pub settings: LayerSettings,
    pub validators: ValidatorChain,
    driver: Arc<dyn Driver>,
    /// Dispatch keys registered under this context (the instance itself
    /// plus enumerated physical devices), removed together at destroy.
    dispatch_keys: Mutex<Vec<u64>>,
}

impl InstanceContext {
    pub fn new(
        instance: vk::Instance,
        api_version: u32,
        enabled_extensions: HashSet<String>,
        settings: LayerSettings,
        driver: Arc<dyn Driver>,
    ) -> Self {
        debug!(
            instance = format_args!("{:#x}", instance.as_raw()),
            api_version, "creating instance context"
        );
        Self {
            instance,
            api_version,
            enabled_extensions,
            settings,
            validators: ValidatorChain::new(),
            driver,
            dispatch_keys: Mutex::new(vec![instance.as_raw()]),
        }
    }

    pub fn instance(&self) -> vk::Instance {
        self.instance
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn add_dispatch_key(&self, key: u64) {
        let mut keys = self.dispatch_keys.lock();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    pub fn take_dispatch_keys(&self) -> Vec<u64> {
        std::mem::take(&mut self.dispatch_keys.lock())
    }
}

pub struct DeviceContext {
    device: vk::Device,
    /// Non-owning relation in spirit: the API contract requires the
    /// instance to outlive its devices.
    pub instance: Arc<InstanceContext>,
    pub physical_device: vk::PhysicalDevice,
    pub properties: PhysicalDeviceProperties,
    /// Extensions actually on: requested intersected with what the
    /// physical device reports.
    pub enabled_extensions: HashSet<String>,
    pub enabled_features: HashSet<String>,
    pub validators: ValidatorChain,
    pub state: DeviceStateLock,
    pub deferred: DeferredOperationTracker,
    /// The device key plus every queue key registered under it.
    dispatch_keys: Mutex<Vec<u64>>,
}

impl DeviceContext {
    pub fn new(
        device: vk::Device,
        instance: Arc<InstanceContext>,
        physical_device: vk::PhysicalDevice,
        properties: PhysicalDeviceProperties,
        enabled_extensions: HashSet<String>,
        enabled_features: HashSet<String>,
    ) -> Self {
        debug!(
            device = format_args!("{:#x}", device.as_raw()),
            name = %properties.device_name,
            "creating device context"
        );
        Self {
            device,
            instance,
            physical_device,
            properties,
            enabled_extensions,
            enabled_features,
            validators: ValidatorChain::new(),
            state: DeviceStateLock::new(),
            deferred: DeferredOperationTracker::new(),
            dispatch_keys: Mutex::new(vec![device.as_raw()]),
        }
    }

    pub fn device(&self) -> vk::Device {
        self.device
    }

    pub fn device_key(&self) -> u64 {
        self.device.as_raw()
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        self.instance.driver()
    }

    pub fn settings(&self) -> &LayerSettings {
        &self.instance.settings
    }

    pub fn add_dispatch_key(&self, key: u64) {
        let mut keys = self.dispatch_keys.lock();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    pub fn take_dispatch_keys(&self) -> Vec<u64> {
        std::mem::take(&mut self.dispatch_keys.lock())
    }
}
