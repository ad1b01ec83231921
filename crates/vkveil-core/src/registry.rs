//! Process-wide bidirectional handle registry.
//!
//! The layer never hands the driver's raw object handles to the
//! application. Every non-dispatchable handle the layer creates gets a
//! layer-issued wrapped value instead, and this registry keeps the
//! wrapped -> native mapping (and its inverse) for the lifetime of the
//! object.
//!
//! Wrapped value bit layout: the low 48 bits are a monotonically
//! increasing counter seeded at 1 and never reused; the high 16 bits are
//! a tag folded out of the counter's hash. 0 is reserved to mean
//! "no handle" and is never issued.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

/// The reserved "no handle" value. A zero handle from the application is
/// always treated as absent, regardless of wrapping mode.
pub const ABSENT: u64 = 0;

const COUNTER_BITS: u32 = 48;
const COUNTER_MASK: u64 = (1 << COUNTER_BITS) - 1;

/// Fold a counter value into a 16-bit tag for the high bits of the
/// wrapped handle. Any collision-resistant mix works; the tag only has
/// to make wrapped values visually distinct from small native values.
fn tag_bits(counter: u64) -> u64 {
    let mut x = counter.wrapping_mul(0x9e37_79b9_7f4a_7c15);
    x ^= x >> 31;
    (x & !COUNTER_MASK) | counter
}

/// Bidirectional mapping between layer-issued wrapped handles and native
/// handle values. Both directions are sharded concurrent maps; readers
/// and writers on disjoint keys never contend on a global lock.
pub struct HandleRegistry {
    wrapped_to_native: DashMap<u64, u64>,
    native_to_wrapped: DashMap<u64, u64>,
    /// Counter for the low bits of new wrapped values. Starts at 1 so the
    /// reserved 0 value can never be produced.
    next_id: AtomicU64,
    wrap_handles: bool,
}

impl HandleRegistry {
    pub fn new(wrap_handles: bool) -> Self {
        Self {
            wrapped_to_native: DashMap::new(),
            native_to_wrapped: DashMap::new(),
            next_id: AtomicU64::new(1),
            wrap_handles,
        }
    }

    /// Whether handle wrapping is enabled at all. Entry points sample
    /// this once near the top of each intercepted call so a call never
    /// sees a mid-flight mode change.
    pub fn wrapping_enabled(&self) -> bool {
        self.wrap_handles
    }

    fn next_wrapped(&self) -> u64 {
        let counter = self.next_id.fetch_add(1, Ordering::Relaxed);
        // Counter exhaustion means 2^48 objects were wrapped in one
        // process lifetime; treat as a fatal invariant violation.
        assert!(counter <= COUNTER_MASK, "handle counter exhausted");
        let wrapped = tag_bits(counter);
        debug_assert_ne!(wrapped, ABSENT);
        wrapped
    }

    /// Wrap a newly created native handle and record the mapping.
    /// Identity on the reserved absent value.
    pub fn wrap_new(&self, native: u64) -> u64 {
        if native == ABSENT {
            return ABSENT;
        }
        let wrapped = self.next_wrapped();
        self.wrapped_to_native.insert(wrapped, native);
        self.native_to_wrapped.insert(native, wrapped);
        wrapped
    }

    /// Issue a wrapped value with no mapping yet. Used when the layer
    /// must return a handle to the application before the underlying
    /// object exists (deferred creation); pair with [`fulfill`].
    ///
    /// [`fulfill`]: HandleRegistry::fulfill
    pub fn reserve(&self) -> u64 {
        self.next_wrapped()
    }

    /// Record the mapping for a previously reserved wrapped value.
    pub fn fulfill(&self, wrapped: u64, native: u64) {
        if wrapped == ABSENT || native == ABSENT {
            return;
        }
        self.wrapped_to_native.insert(wrapped, native);
        self.native_to_wrapped.insert(native, wrapped);
    }

    /// Look up the native value for a wrapped handle. Identity on the
    /// reserved absent value; `None` for an unknown handle (the caller
    /// decides whether that is an error).
    pub fn unwrap(&self, wrapped: u64) -> Option<u64> {
        if wrapped == ABSENT {
            return Some(ABSENT);
        }
        self.wrapped_to_native.get(&wrapped).map(|v| *v)
    }

    /// Read-only lookup that tolerates the handle not being known.
    pub fn find(&self, wrapped: u64) -> Option<u64> {
        self.unwrap(wrapped)
    }

    /// Reverse lookup: the wrapped value previously issued for a native
    /// handle, if any.
    pub fn find_wrapped(&self, native: u64) -> Option<u64> {
        if native == ABSENT {
            return Some(ABSENT);
        }
        self.native_to_wrapped.get(&native).map(|v| *v)
    }

    /// Atomically remove and return the mapping for a wrapped handle.
    /// Destroy calls on unknown handles must be tolerated, so an absent
    /// mapping is `None`, never a panic.
    pub fn erase(&self, wrapped: u64) -> Option<u64> {
        if wrapped == ABSENT {
            return Some(ABSENT);
        }
        let (_, native) = self.wrapped_to_native.remove(&wrapped)?;
        self.native_to_wrapped.remove(&native);
        Some(native)
    }

    /// Number of live mappings.
    pub fn len(&self) -> usize {
        self.wrapped_to_native.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wrapped_to_native.is_empty()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}
