// Stabilizer: completes the reverse link an insert left behind.
//
// An insert publishes its node with a single anchor CAS and leaves the node it
// displaced pointing at the old neighbour:
//
// push_front(X) on  H <──► B:
//
//   anchor.head = X*            (* = in-progress mark)
//   X.next ──► H                (written before publication)
//   H.prev ──► ?                (still stale)
//
// Stabilizing the front:
//   1. read X.next = H
//   2. read H.prev together with its version v
//   3. if H.prev != X: versioned CAS H.prev from (?, v) to (X, v + 1)
//   4. CAS anchor (X*, tail) -> (X, tail)
//
// Step 3 is conditioned on the version so a stabilizer that stalled between
// steps 2 and 3 cannot overwrite a link rewritten since. Losing either CAS
// is fine: it means another thread finished the repair. The back end is
// symmetric with tail / tail.prev / prev.next.
//
// Every load is revalidated against the anchor word before the next
// dependent step; a changed anchor abandons the attempt and `stabilize`
// starts over from a fresh snapshot.

use super::End;
use super::lock_free_deque::{AnchorPtr, LockFreeDeque, NodeAnchor};
use super::policy::RemovalPolicy;
use crate::guard::Guard;

impl<T, G, P> LockFreeDeque<T, G, P>
where
    G: Guard,
    P: RemovalPolicy<T>,
{
    /// Load the anchor, repairing in-progress marks until neither end carries one.
    ///
    /// Returns the stable snapshot pointer and a copy of it.
    ///
    /// # Safety
    /// The caller must hold a read guard (`G::pin()`) for as long as it uses the
    /// returned snapshot or any node reachable from it.
    pub(super) unsafe fn stabilize(&self) -> (AnchorPtr<T, P>, NodeAnchor<T, P>) {
        loop {
            let (current, anchor) = unsafe { self.anchor.snapshot() };
            if anchor.head().is_marked() {
                unsafe { self.stabilize_front(current, anchor) };
            } else if anchor.tail().is_marked() {
                unsafe { self.stabilize_back(current, anchor) };
            } else {
                return (current, anchor);
            }
        }
    }

    unsafe fn stabilize_front(&self, current: AnchorPtr<T, P>, anchor: NodeAnchor<T, P>) {
        let head = anchor.head().as_ptr();

        // Written before the head was published; fixed while the mark is set.
        let next = unsafe { (*head).next().load().ptr() };
        if self.anchor.load() != current {
            return;
        }

        let back_link = unsafe { (*next).prev().load() };
        if back_link.ptr() != head {
            if self.anchor.load() != current {
                return;
            }
            unsafe {
                (*next)
                    .prev()
                    .versioned_exchange(head, back_link.version(), back_link.ptr())
            };
        }

        let repaired = NodeAnchor::<T, P>::new(anchor.head().with_mark(false), anchor.tail());
        unsafe { self.clear_mark(current, repaired, End::Front) };
    }

    unsafe fn stabilize_back(&self, current: AnchorPtr<T, P>, anchor: NodeAnchor<T, P>) {
        let tail = anchor.tail().as_ptr();

        let prev = unsafe { (*tail).prev().load().ptr() };
        if self.anchor.load() != current {
            return;
        }

        let forward_link = unsafe { (*prev).next().load() };
        if forward_link.ptr() != tail {
            if self.anchor.load() != current {
                return;
            }
            unsafe {
                (*prev)
                    .next()
                    .versioned_exchange(tail, forward_link.version(), forward_link.ptr())
            };
        }

        let repaired = NodeAnchor::<T, P>::new(anchor.head(), anchor.tail().with_mark(false));
        unsafe { self.clear_mark(current, repaired, End::Back) };
    }

    unsafe fn clear_mark(&self, current: AnchorPtr<T, P>, repaired: NodeAnchor<T, P>, end: End) {
        if self.anchor.compare_exchange(current, repaired) {
            tracing::trace!(?end, "stabilized in-progress insert");
            unsafe { self.retire_anchor(current) };
        }
    }

    /// Exclusive-access stabilization: fix the reverse link in place.
    pub(super) fn stabilize_mut(&mut self) {
        let anchor = self.anchor.get_mut();
        let head = anchor.head();
        let tail = anchor.tail();

        if head.is_marked() {
            let head_ptr = head.as_ptr();
            unsafe {
                let next = (*head_ptr).next().load().ptr();
                (*next).prev().store(head_ptr);
            }
            anchor.set_head(head.with_mark(false));
        }

        if tail.is_marked() {
            let tail_ptr = tail.as_ptr();
            unsafe {
                let prev = (*tail_ptr).prev().load().ptr();
                (*prev).next().store(tail_ptr);
            }
            anchor.set_tail(tail.with_mark(false));
        }

        debug_assert!(anchor.is_stable());
    }
}
