//! The per-device state lock and the cooperative blocking-region escape
//! hatch.
//!
//! Most hooks read auxiliary state under the shared guard; record phases
//! that mutate it hold the exclusive guard. A validator that must wait
//! an unbounded time while the exclusive guard is held (joining a
//! deferred operation, waiting on a host sync primitive) calls
//! [`begin_blocking_region`] / [`end_blocking_region`], which find the
//! guard through a thread-local slot and temporarily release the lock
//! without every call site having to pass the guard down explicitly.
//! Recursive use on one thread would corrupt the single slot and panics.

use std::cell::Cell;
use std::cell::UnsafeCell;
use std::ops::{Deref, DerefMut};

use parking_lot::lock_api::RawRwLock as RawRwLockApi;
use parking_lot::RawRwLock;

use crate::state::DeviceState;

#[derive(Clone, Copy, PartialEq, Eq)]
enum ActiveSlot {
    Empty,
    /// The exclusive guard on this lock is held by the current thread.
    Held(*const DeviceStateLock),
    /// The lock was released for a blocking region and must be retaken.
    Blocking(*const DeviceStateLock),
}

thread_local! {
    static ACTIVE_EXCLUSIVE: Cell<ActiveSlot> = const { Cell::new(ActiveSlot::Empty) };
}

/// Reader-writer lock over [`DeviceState`] with blocking-region support.
pub struct DeviceStateLock {
    raw: RawRwLock,
    state: UnsafeCell<DeviceState>,
}

// The raw lock serializes all access to the UnsafeCell contents.
unsafe impl Send for DeviceStateLock {}
unsafe impl Sync for DeviceStateLock {}

impl DeviceStateLock {
    pub fn new() -> Self {
        Self {
            raw: RawRwLock::INIT,
            state: UnsafeCell::new(DeviceState::default()),
        }
    }

    /// Shared access for lookups.
    pub fn read(&self) -> StateReadGuard<'_> {
        self.raw.lock_shared();
        StateReadGuard { lock: self }
    }

    /// Exclusive access for cache population and cascade erase. The
    /// outermost exclusive guard on a thread registers itself in the
    /// thread-local slot so blocking regions can find it.
    pub fn write(&self) -> StateWriteGuard<'_> {
        self.raw.lock_exclusive();
        let registered = ACTIVE_EXCLUSIVE.with(|slot| {
            if slot.get() == ActiveSlot::Empty {
                slot.set(ActiveSlot::Held(self as *const _));
                true
            } else {
                false
            }
        });
        StateWriteGuard {
            lock: self,
            registered,
        }
    }
}

impl Default for DeviceStateLock {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StateReadGuard<'a> {
    lock: &'a DeviceStateLock,
}

impl Deref for StateReadGuard<'_> {
    type Target = DeviceState;

    fn deref(&self) -> &DeviceState {
        // Shared lock held for the guard's lifetime.
        unsafe { &*self.lock.state.get() }
    }
}

impl Drop for StateReadGuard<'_> {
    fn drop(&mut self) {
        unsafe { self.lock.raw.unlock_shared() }
    }
}

pub struct StateWriteGuard<'a> {
    lock: &'a DeviceStateLock,
    registered: bool,
}

impl Deref for StateWriteGuard<'_> {
    type Target = DeviceState;

    fn deref(&self) -> &DeviceState {
        unsafe { &*self.lock.state.get() }
    }
}

impl DerefMut for StateWriteGuard<'_> {
    fn deref_mut(&mut self) -> &mut DeviceState {
        // Exclusive lock held for the guard's lifetime.
        unsafe { &mut *self.lock.state.get() }
    }
}

impl Drop for StateWriteGuard<'_> {
    fn drop(&mut self) {
        if self.registered {
            ACTIVE_EXCLUSIVE.with(|slot| {
                debug_assert!(
                    matches!(slot.get(), ActiveSlot::Held(p) if std::ptr::eq(p, self.lock)),
                    "exclusive guard dropped while its blocking region is still open"
                );
                slot.set(ActiveSlot::Empty);
            });
        }
        unsafe { self.lock.raw.unlock_exclusive() }
    }
}

/// Release the exclusive device-state lock held by this thread ahead of
/// an unbounded wait. Must be paired with [`end_blocking_region`] before
/// the guard goes out of scope.
pub fn begin_blocking_region() {
    ACTIVE_EXCLUSIVE.with(|slot| match slot.get() {
        ActiveSlot::Held(lock) => {
            // The guard is alive on this thread's stack, so the pointer
            // stays valid until end_blocking_region retakes the lock.
            unsafe { (*lock).raw.unlock_exclusive() };
            slot.set(ActiveSlot::Blocking(lock));
        }
        ActiveSlot::Blocking(_) => {
            panic!("recursive blocking region on one thread")
        }
        ActiveSlot::Empty => {
            panic!("begin_blocking_region without an exclusive device-state lock")
        }
    });
}

/// Retake the lock released by [`begin_blocking_region`].
pub fn end_blocking_region() {
    ACTIVE_EXCLUSIVE.with(|slot| match slot.get() {
        ActiveSlot::Blocking(lock) => {
            unsafe { &*lock }.raw.lock_exclusive();
            slot.set(ActiveSlot::Held(lock));
        }
        _ => panic!("end_blocking_region without a matching begin"),
    });
}

/// RAII wrapper around the blocking-region pair.
pub struct BlockingRegion(());

impl BlockingRegion {
    pub fn enter() -> Self {
        begin_blocking_region();
        BlockingRegion(())
    }
}

impl Drop for BlockingRegion {
    fn drop(&mut self) {
        end_blocking_region();
    }
}
