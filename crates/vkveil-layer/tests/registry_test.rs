//! Handle registry: round-trips, the reserved zero value, erase
//! semantics, concurrent uniqueness, and deferred reserve/fulfill.

use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use vkveil_core::HandleRegistry;

#[test]
fn wrap_round_trip() {
    let registry = HandleRegistry::new(true);
    let native = 0x9000_1234;
    let wrapped = registry.wrap_new(native);

    assert_ne!(wrapped, native);
    assert_ne!(wrapped, 0);
    assert_eq!(registry.unwrap(wrapped), Some(native));
    assert_eq!(registry.find_wrapped(native), Some(wrapped));
    assert_eq!(registry.len(), 1);
}

#[test]
fn zero_is_identity_everywhere() {
    let registry = HandleRegistry::new(true);
    assert_eq!(registry.wrap_new(0), 0);
    assert_eq!(registry.unwrap(0), Some(0));
    assert_eq!(registry.find_wrapped(0), Some(0));
    assert_eq!(registry.erase(0), Some(0));
    assert!(registry.is_empty());
}

#[test]
fn unknown_handle_is_none_not_panic() {
    let registry = HandleRegistry::new(true);
    assert_eq!(registry.find(0xdead_beef), None);
    assert_eq!(registry.erase(0xdead_beef), None);
}

#[test]
fn erase_then_double_erase() {
    let registry = HandleRegistry::new(true);
    let native = 0x9000_0001;
    let wrapped = registry.wrap_new(native);

    assert_eq!(registry.erase(wrapped), Some(native));
    assert_eq!(registry.find(wrapped), None);
    assert_eq!(registry.find_wrapped(native), None);
    // Destroy of an already-erased handle is tolerated.
    assert_eq!(registry.erase(wrapped), None);
    assert!(registry.is_empty());
}

#[test]
fn erased_values_are_never_reissued() {
    let registry = HandleRegistry::new(true);
    let first = registry.wrap_new(0x9000_0010);
    registry.erase(first);
    let second = registry.wrap_new(0x9000_0011);
    assert_ne!(first, second);
}

#[test]
fn concurrent_wrapping_yields_unique_values() {
    let registry = Arc::new(HandleRegistry::new(true));
    let threads = 8;
    let per_thread = 1000u64;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let registry = registry.clone();
            thread::spawn(move || {
                (0..per_thread)
                    .map(|i| registry.wrap_new(0x8000_0000 + t * per_thread + i))
                    .collect::<Vec<u64>>()
            })
        })
        .collect();

    let mut seen = HashSet::new();
    for handle in handles {
        for wrapped in handle.join().unwrap() {
            assert_ne!(wrapped, 0);
            assert!(seen.insert(wrapped), "duplicate wrapped value {wrapped:#x}");
        }
    }
    assert_eq!(seen.len(), (threads * per_thread) as usize);
    assert_eq!(registry.len(), seen.len());
}

#[test]
fn reserve_then_fulfill() {
    let registry = HandleRegistry::new(true);
    let reserved = registry.reserve();

    // No mapping until fulfilled.
    assert_ne!(reserved, 0);
    assert_eq!(registry.find(reserved), None);

    let native = 0x9000_0042;
    registry.fulfill(reserved, native);
    assert_eq!(registry.unwrap(reserved), Some(native));
    assert_eq!(registry.find_wrapped(native), Some(reserved));
    assert_eq!(registry.erase(reserved), Some(native));
}

#[test]
fn wrapping_mode_flag() {
    assert!(HandleRegistry::new(true).wrapping_enabled());
    assert!(!HandleRegistry::new(false).wrapping_enabled());
}
