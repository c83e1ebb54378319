use std::alloc::{self, Layout};
use std::mem::{self, ManuallyDrop};
use std::ptr;

use crate::data_structures::internal::VersionedPtr;
use crate::error::{DequeError, Result};

/// A deque node: one payload plus versioned links to its neighbours.
///
/// `count` is the removal policy's per-node state (`()` for plain deques, the
/// remaining-element counter for coalescing ones).
///
/// The 64-byte alignment leaves the low six bits of every node address free
/// for the link version and the anchor's in-progress mark.
///
#[repr(align(64))]
pub(crate) struct DequeNode<T, C> {
    payload: ManuallyDrop<T>,
    next: VersionedPtr<DequeNode<T, C>>,
    prev: VersionedPtr<DequeNode<T, C>>,
    count: C,
}

/// Frees a raw allocation if the payload initializer unwinds.
struct DeallocOnUnwind {
    ptr: *mut u8,
    layout: Layout,
}

impl Drop for DeallocOnUnwind {
    fn drop(&mut self) {
        unsafe { alloc::dealloc(self.ptr, self.layout) };
    }
}

impl<T, C> DequeNode<T, C> {
    /// Allocate a node and construct its payload with `init`.
    ///
    /// The allocation happens first; `init` runs exactly once afterwards and
    /// its result is written straight into the node.
    pub(crate) fn allocate(init: impl FnOnce() -> T, count: C) -> Result<*mut Self> {
        let layout = Layout::new::<Self>();
        let raw = unsafe { alloc::alloc(layout) };
        if raw.is_null() {
            return Err(DequeError::AllocationFailed {
                size: layout.size(),
                align: layout.align(),
            });
        }

        let unwind = DeallocOnUnwind { ptr: raw, layout };
        let payload = init();
        mem::forget(unwind);

        let node = raw as *mut Self;
        unsafe {
            node.write(DequeNode {
                payload: ManuallyDrop::new(payload),
                next: VersionedPtr::null(),
                prev: VersionedPtr::null(),
                count,
            });
        }
        Ok(node)
    }

    /// Like [`DequeNode::allocate`], but aborts through the global allocation
    /// error handler instead of returning an error.
    pub(crate) fn allocate_or_abort(init: impl FnOnce() -> T, count: C) -> *mut Self {
        match Self::allocate(init, count) {
            Ok(node) => node,
            Err(_) => alloc::handle_alloc_error(Layout::new::<Self>()),
        }
    }

    #[inline]
    pub(crate) fn payload(&self) -> &T {
        &self.payload
    }

    #[inline]
    pub(crate) fn next(&self) -> &VersionedPtr<Self> {
        &self.next
    }

    #[inline]
    pub(crate) fn prev(&self) -> &VersionedPtr<Self> {
        &self.prev
    }

    #[inline]
    pub(crate) fn count(&self) -> &C {
        &self.count
    }

    /// Move the payload out of the node.
    ///
    /// # Safety
    /// - `node` must be valid and its payload not yet taken or dropped
    /// - Only the thread that unlinked the node may call this, once
    /// - The node must afterwards be freed with [`DequeNode::release_shell`]
    pub(crate) unsafe fn take_payload(node: *mut Self) -> T {
        unsafe { ptr::read(&*(*node).payload) }
    }

    /// Free a node whose payload has already been moved out.
    ///
    /// # Safety
    /// - `node` must come from [`DequeNode::allocate`] and be freed only once
    /// - No thread may access `node` afterwards
    pub(crate) unsafe fn release_shell(node: *mut Self) {
        unsafe {
            // ManuallyDrop keeps drop_in_place away from the payload.
            ptr::drop_in_place(node);
            alloc::dealloc(node as *mut u8, Layout::new::<Self>());
        }
    }

    /// Drop the payload and free the node.
    ///
    /// # Safety
    /// Same as [`DequeNode::release_shell`], and the payload must still be
    /// present.
    pub(crate) unsafe fn destroy(node: *mut Self) {
        unsafe {
            ManuallyDrop::drop(&mut (*node).payload);
            Self::release_shell(node);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountsDrops(Arc<AtomicUsize>);

    impl Drop for CountsDrops {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_node_alignment_leaves_tag_bits() {
        assert!(std::mem::align_of::<DequeNode<u8, ()>>() >= 64);
        let node = DequeNode::allocate(|| 1u8, ()).unwrap();
        assert_eq!(node as usize & 0x3f, 0);
        unsafe { DequeNode::destroy(node) };
    }

    #[test]
    fn test_destroy_drops_payload_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let node = DequeNode::allocate(|| CountsDrops(Arc::clone(&drops)), ()).unwrap();
        unsafe { DequeNode::destroy(node) };
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_take_payload_then_release_shell() {
        let drops = Arc::new(AtomicUsize::new(0));
        let node = DequeNode::allocate(|| CountsDrops(Arc::clone(&drops)), ()).unwrap();

        let payload = unsafe { DequeNode::take_payload(node) };
        unsafe { DequeNode::release_shell(node) };
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(payload);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_initializer_runs_once() {
        let calls = AtomicUsize::new(0);
        let node = DequeNode::allocate(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                String::from("built in place")
            },
            (),
        )
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(unsafe { (*node).payload() }, "built in place");
        assert!(unsafe { (*node).next().load().ptr().is_null() });
        unsafe { DequeNode::destroy(node) };
    }
}
