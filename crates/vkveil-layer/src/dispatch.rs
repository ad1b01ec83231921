//! Dispatch key tables: native dispatchable handle -> owning context.
//!
//! Two independent tables, one for the instance family (instance,
//! physical device) and one for the device family (device, queue).
//! Device lookups sit on the hottest path in the layer, so they consult
//! a one-entry last-used cache before touching the table's lock: an
//! atomic key probe rejects misses cheaply, and the cached slot carries
//! its own key so a concurrent replacement can never hand back the
//! wrong context. Any device-context removal clears the cache *before*
//! erasing the table entry, closing the window where another thread
//! could pick up a context that is about to go away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::context::{DeviceContext, InstanceContext};

/// Context table keyed by raw dispatchable-handle value. Lookups take
/// the shared lock; creation and destruction take the exclusive lock.
pub struct DispatchTable<C> {
    map: RwLock<HashMap<u64, Arc<C>>>,
}

impl<C> DispatchTable<C> {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, key: u64, ctx: Arc<C>) {
        self.map.write().insert(key, ctx);
    }

    pub fn get(&self, key: u64) -> Option<Arc<C>> {
        self.map.read().get(&key).cloned()
    }

    pub fn remove(&self, key: u64) -> Option<Arc<C>> {
        self.map.write().remove(&key)
    }

    pub fn drain(&self) -> Vec<Arc<C>> {
        self.map.write().drain().map(|(_, ctx)| ctx).collect()
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }
}

impl<C> Default for DispatchTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

pub type InstanceTable = DispatchTable<InstanceContext>;

/// One-entry cache of the most recently resolved device context. The
/// atomic key is a fast filter; the slot stores the key it was cached
/// under, which is what correctness rests on.
struct LastUsedCache {
    key: AtomicU64,
    slot: RwLock<Option<(u64, Arc<DeviceContext>)>>,
}

impl LastUsedCache {
    fn new() -> Self {
        Self {
            key: AtomicU64::new(0),
            slot: RwLock::new(None),
        }
    }

    fn get(&self, key: u64) -> Option<Arc<DeviceContext>> {
        if self.key.load(Ordering::Acquire) != key {
            return None;
        }
        let slot = self.slot.read();
        match slot.as_ref() {
            Some((cached_key, ctx)) if *cached_key == key => Some(ctx.clone()),
            _ => None,
        }
    }

    fn store(&self, key: u64, ctx: Arc<DeviceContext>) {
        *self.slot.write() = Some((key, ctx));
        self.key.store(key, Ordering::Release);
    }

    fn invalidate(&self) {
        self.key.store(0, Ordering::Release);
        *self.slot.write() = None;
    }
}

/// Device-family table with the last-used fast path in front.
pub struct DeviceTable {
    table: DispatchTable<DeviceContext>,
    last_used: LastUsedCache,
}

impl DeviceTable {
    pub fn new() -> Self {
        Self {
            table: DispatchTable::new(),
            last_used: LastUsedCache::new(),
        }
    }

    pub fn insert(&self, key: u64, ctx: Arc<DeviceContext>) {
        self.table.insert(key, ctx);
    }

    pub fn get(&self, key: u64) -> Option<Arc<DeviceContext>> {
        if let Some(ctx) = self.last_used.get(key) {
            return Some(ctx);
        }
        let ctx = self.table.get(key)?;
        self.last_used.store(key, ctx.clone());
        Some(ctx)
    }

    /// Remove one dispatch key. Clears the last-used cache first so no
    /// thread can resolve a context that is about to be freed.
    pub fn remove(&self, key: u64) -> Option<Arc<DeviceContext>> {
        self.last_used.invalidate();
        let removed = self.table.remove(key);
        if removed.is_some() {
            debug!(key = format_args!("{key:#x}"), "removed device dispatch key");
        }
        removed
    }

    /// Tear down the whole table (library unload). Cache first, then the
    /// entries; safe to call repeatedly or after normal destroys.
    pub fn drain(&self) -> Vec<Arc<DeviceContext>> {
        self.last_used.invalidate();
        self.table.drain()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl Default for DeviceTable {
    fn default() -> Self {
        Self::new()
    }
}
