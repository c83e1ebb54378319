//! Epoch-based guard implementation using crossbeam-epoch.
//!
//! # Design
//!
//! `EpochGuard` is a zero-sized type that schedules destruction using the
//! global epoch collector. A deque parameterized with `EpochGuard` pins the
//! calling thread for the duration of every operation, so any node or anchor
//! snapshot it loads stays allocated until the operation returns:
//!
//! ```text
//! LockFreeDeque<T, EpochGuard>
//!     │
//!     ├── pin()           crossbeam_epoch::pin() per operation
//!     └── defer_destroy   retired nodes and snapshots, freed two epochs later
//! ```
//!
//! Destruction runs on whichever thread advances the collector, possibly after
//! the deque has been dropped. The deque only hands over anchor snapshots,
//! payload-free node shells and coalesced nodes, whose payloads the
//! `Coalescing` policy requires to be `Send + 'static`.

use crossbeam_epoch::{self as epoch, Guard as CrossbeamGuard};
use lfdeque_core::guard::Guard;

/// Epoch-based memory reclamation guard.
///
/// Unlike `DeferredGuard`, which holds every retired pointer until it is
/// dropped, `EpochGuard` frees retired nodes as soon as all threads have
/// advanced past the epoch they were retired in. Memory therefore stays
/// bounded under sustained load.
///
/// - **Pin overhead**: Very low (thread-local check)
/// - **Reclamation**: Batched, amortized O(1) per node
///
#[derive(Debug, Clone, Copy, Default)]
pub struct EpochGuard {
    // Zero-sized - all state is in the global epoch collector
}

impl EpochGuard {
    pub fn new() -> Self {
        EpochGuard {}
    }

    /// Push this thread's pending destructions towards the global collector.
    ///
    /// Only needed where a test or benchmark wants reclamation to make
    /// progress without further deque traffic.
    pub fn flush() {
        epoch::pin().flush();
    }
}

impl Guard for EpochGuard {
    type ReadGuard = CrossbeamGuard;

    fn pin() -> Self::ReadGuard {
        epoch::pin()
    }

    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N)) {
        // Re-entrant pin: the calling operation already holds one, so this
        // only schedules the destruction in the current epoch.
        let guard = epoch::pin();
        unsafe {
            guard.defer_unchecked(move || {
                dealloc(node);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static FREED: AtomicUsize = AtomicUsize::new(0);

    unsafe fn counting_dealloc(p: *mut u64) {
        FREED.fetch_add(1, Ordering::SeqCst);
        unsafe { drop(Box::from_raw(p)) };
    }

    #[test]
    fn test_epoch_guard_is_zero_sized() {
        assert_eq!(std::mem::size_of::<EpochGuard>(), 0);
    }

    #[test]
    fn test_deferred_destruction_eventually_runs() {
        let guard = EpochGuard::default();
        for i in 0..64u64 {
            let ptr = Box::into_raw(Box::new(i));
            unsafe { guard.defer_destroy(ptr, counting_dealloc) };
        }

        // Advance the global epoch until the garbage is collected.
        for _ in 0..10_000 {
            if FREED.load(Ordering::SeqCst) == 64 {
                break;
            }
            EpochGuard::flush();
        }
        assert_eq!(FREED.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn test_pin_is_reentrant() {
        let outer = EpochGuard::pin();
        let inner = EpochGuard::pin();
        drop(inner);
        drop(outer);
    }
}
