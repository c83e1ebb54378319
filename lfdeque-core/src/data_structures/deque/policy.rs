//! Removal policies: how a pop treats the node it finds at an end.
//!
//! ```text
//! LockFreeDeque<T, G, Plain>        one element per node, every pop unlinks
//! LockFreeDeque<T, G, Coalescing>   n equal elements per node, pops decrement
//!                                   until the last one, which unlinks
//! ```
//!
//! The engine asks the policy first. `Removal::Decremented` finishes the pop
//! without touching the anchor; `Removal::PhysicallyRemove` sends it down the
//! anchor CAS path, where exactly one thread wins the unlink.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Outcome of asking a policy to remove one element from a node.
#[derive(Debug, PartialEq, Eq)]
pub enum Removal<T> {
    /// The node holds its last element; the caller must unlink it.
    PhysicallyRemove,
    /// One of several elements was consumed in place; here is its copy.
    Decremented(T),
}

/// Per-node removal behaviour for [`LockFreeDeque`](super::LockFreeDeque).
pub trait RemovalPolicy<T>: Send + Sync + 'static {
    /// Policy state stored in every node.
    type Count: Send + Sync;

    /// Other threads may still read a node's payload after it is unlinked,
    /// so the payload is dropped by the guard together with the node.
    const SHARED_PAYLOAD: bool;

    /// State for a node that carries `elements` logical elements.
    fn seed(elements: usize) -> Self::Count;

    /// Remove one element from a node that was just validated as the current
    /// end.
    fn on_remove(count: &Self::Count, payload: &T) -> Removal<T>;

    /// Value handed to the thread whose anchor CAS unlinked the node.
    ///
    /// `None` means the payload is moved out of the node and the node freed
    /// without dropping it. `Some` means the payload stays in the node (other
    /// threads may still be copying it) and is dropped when the node is
    /// reclaimed.
    fn copy_on_unlink(payload: &T) -> Option<T>;

    /// Logical elements still held by the node.
    fn remaining(count: &Self::Count) -> usize;

    /// Record that the node has been unlinked.
    fn mark_removed(count: &Self::Count);
}

/// One element per node.
#[derive(Debug, Default, Clone, Copy)]
pub struct Plain;

impl<T> RemovalPolicy<T> for Plain {
    type Count = ();

    const SHARED_PAYLOAD: bool = false;

    fn seed(_elements: usize) -> Self::Count {}

    #[inline]
    fn on_remove(_count: &Self::Count, _payload: &T) -> Removal<T> {
        Removal::PhysicallyRemove
    }

    #[inline]
    fn copy_on_unlink(_payload: &T) -> Option<T> {
        None
    }

    fn remaining(_count: &Self::Count) -> usize {
        1
    }

    fn mark_removed(_count: &Self::Count) {}
}

/// Several logically equal, contiguously inserted elements per node.
#[derive(Debug, Default, Clone, Copy)]
pub struct Coalescing;

/// Node state for [`Coalescing`].
///
/// `remaining` never increases. A decrement is only attempted while it is
/// above one, so once it reads one the only transition left is the anchor
/// CAS that unlinks the node.
#[derive(Debug)]
pub struct CoalescedCount {
    remaining: AtomicUsize,
    removed: AtomicBool,
}

impl CoalescedCount {
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

// Payload destructors run wherever the guard reclaims the node, possibly on
// another thread after the deque is gone.
impl<T: Clone + Send + 'static> RemovalPolicy<T> for Coalescing {
    type Count = CoalescedCount;

    const SHARED_PAYLOAD: bool = true;

    fn seed(elements: usize) -> Self::Count {
        debug_assert!(elements >= 1);
        CoalescedCount {
            remaining: AtomicUsize::new(elements),
            removed: AtomicBool::new(false),
        }
    }

    fn on_remove(count: &Self::Count, payload: &T) -> Removal<T> {
        let mut current = count.remaining.load(Ordering::Acquire);
        loop {
            if current <= 1 {
                return Removal::PhysicallyRemove;
            }
            match count.remaining.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                // The payload is only dropped when the node is reclaimed, so
                // copying after the decrement is safe even if another thread
                // unlinks the node in the meantime.
                Ok(_) => return Removal::Decremented(payload.clone()),
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    fn copy_on_unlink(payload: &T) -> Option<T> {
        Some(payload.clone())
    }

    fn remaining(count: &Self::Count) -> usize {
        count.remaining.load(Ordering::Acquire)
    }

    fn mark_removed(count: &Self::Count) {
        debug_assert_eq!(count.remaining.load(Ordering::Acquire), 1);
        count.removed.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_plain_always_unlinks() {
        let count = <Plain as RemovalPolicy<i32>>::seed(5);
        assert_eq!(
            <Plain as RemovalPolicy<i32>>::on_remove(&count, &1),
            Removal::PhysicallyRemove
        );
        assert_eq!(<Plain as RemovalPolicy<i32>>::remaining(&count), 1);
        assert_eq!(<Plain as RemovalPolicy<i32>>::copy_on_unlink(&1), None);
    }

    #[test]
    fn test_coalescing_decrements_down_to_one() {
        let count = <Coalescing as RemovalPolicy<i32>>::seed(3);
        assert_eq!(Coalescing::on_remove(&count, &9i32), Removal::Decremented(9));
        assert_eq!(Coalescing::on_remove(&count, &9i32), Removal::Decremented(9));
        assert_eq!(<Coalescing as RemovalPolicy<i32>>::remaining(&count), 1);
        assert_eq!(Coalescing::on_remove(&count, &9i32), Removal::PhysicallyRemove);
        assert_eq!(Coalescing::on_remove(&count, &9i32), Removal::PhysicallyRemove);

        assert!(!count.is_removed());
        <Coalescing as RemovalPolicy<i32>>::mark_removed(&count);
        assert!(count.is_removed());
    }

    #[test]
    fn test_coalescing_concurrent_decrements_leave_exactly_one() {
        let elements = 10_000;
        let count = Arc::new(<Coalescing as RemovalPolicy<u64>>::seed(elements));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let count = Arc::clone(&count);
                thread::spawn(move || {
                    let mut decremented = 0;
                    while let Removal::Decremented(_) = Coalescing::on_remove(&*count, &7u64) {
                        decremented += 1;
                    }
                    decremented
                })
            })
            .collect();

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(total, elements - 1);
        assert_eq!(<Coalescing as RemovalPolicy<u64>>::remaining(&count), 1);
    }
}
