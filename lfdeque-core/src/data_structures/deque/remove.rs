// Remove engine.
//
// A pop works on a stable snapshot only. Removing the last element swings the
// anchor to empty; otherwise the removed end moves to its neighbour, which the
// stable snapshot guarantees is correctly linked:
//
//   pop_front on (H, T):   N = H.next
//                          CAS anchor (H, T) -> (N, T)
//
// The policy is consulted before the CAS: a coalesced node holding more than
// one element is decremented in place and never unlinked by that pop.

use super::End;
use super::concurrent_deque::Popped;
use super::lock_free_deque::{LockFreeDeque, NodeAnchor};
use super::policy::{Removal, RemovalPolicy};
use crate::data_structures::internal::MarkedPtr;
use crate::guard::Guard;

impl<T, G, P> LockFreeDeque<T, G, P>
where
    G: Guard,
    P: RemovalPolicy<T>,
{
    pub(super) fn remove(&self, end: End) -> Option<Popped<T>> {
        let _pin = G::pin();
        loop {
            let (current, anchor) = unsafe { self.stabilize() };
            if anchor.is_empty() {
                return None;
            }

            let head = anchor.head().as_ptr();
            let tail = anchor.tail().as_ptr();
            let node = match end {
                End::Front => head,
                End::Back => tail,
            };
            let node_ref = unsafe { &*node };

            if let Removal::Decremented(value) = P::on_remove(node_ref.count(), node_ref.payload())
            {
                return Some(Popped::new(value, false));
            }

            let last = head == tail;
            let desired = if last {
                NodeAnchor::<T, P>::empty()
            } else {
                match end {
                    End::Front => {
                        let next = node_ref.next().load().ptr();
                        NodeAnchor::<T, P>::new(MarkedPtr::new(next), anchor.tail())
                    }
                    End::Back => {
                        let prev = node_ref.prev().load().ptr();
                        NodeAnchor::<T, P>::new(anchor.head(), MarkedPtr::new(prev))
                    }
                }
            };

            if self.anchor.compare_exchange(current, desired) {
                P::mark_removed(node_ref.count());
                let value = unsafe {
                    self.retire_anchor(current);
                    self.reclaim_unlinked(node)
                };
                return Some(Popped::new(value, last));
            }
        }
    }

    /// Copy the element at `end` without removing it.
    ///
    /// # Safety
    /// No other thread may remove the element at `end` while the copy is
    /// taken: a plain pop moves the payload out of the node being read.
    pub(super) unsafe fn peek(&self, end: End) -> Option<T>
    where
        T: Clone,
    {
        let _pin = G::pin();
        let (_, anchor) = unsafe { self.stabilize() };
        let node = match end {
            End::Front => anchor.head(),
            End::Back => anchor.tail(),
        };
        if node.is_null() {
            return None;
        }
        Some(unsafe { (*node.as_ptr()).payload().clone() })
    }
}
