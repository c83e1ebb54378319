// Insert engine.
//
// An insert prepares its node's outward link while the node is still private,
// then publishes it with one anchor CAS that also sets the in-progress mark on
// the end it grew:
//
//   push_back(N) on (H, T):   N.prev = T      (private write)
//                             CAS anchor (H, T) -> (H, N*)
//                             stabilize        (T.next = N, clear mark)
//
// The CAS only succeeds against a stable snapshot, so at most one end is ever
// marked. The inserter stabilizes right after its own CAS; a thread that
// observes the mark first finishes the job for it.

use super::End;
use super::lock_free_deque::{LockFreeDeque, NodeAnchor, NodePtr};
use super::policy::RemovalPolicy;
use crate::data_structures::internal::MarkedPtr;
use crate::guard::Guard;

/// Condition an insert is subject to, evaluated against the stable snapshot
/// the insert CAS is attempted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertMode {
    Always,
    OnlyIfEmpty,
    OnlyIfNotEmpty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InsertOutcome {
    /// Published into a deque that was empty.
    IntoEmpty,
    /// Published next to an existing element.
    IntoNonEmpty,
    /// The condition did not hold; the node was not published.
    Rejected,
}

impl InsertMode {
    pub(super) fn admits(self, empty: bool) -> bool {
        match self {
            InsertMode::Always => true,
            InsertMode::OnlyIfEmpty => empty,
            InsertMode::OnlyIfNotEmpty => !empty,
        }
    }
}

impl<T, G, P> LockFreeDeque<T, G, P>
where
    G: Guard,
    P: RemovalPolicy<T>,
{
    /// Publish `node` at `end` if `mode` admits the observed state.
    ///
    /// On [`InsertOutcome::Rejected`] ownership of `node` stays with the
    /// caller.
    ///
    /// # Safety
    /// `node` must be freshly allocated and not yet reachable by any thread.
    pub(super) unsafe fn insert(
        &self,
        end: End,
        mode: InsertMode,
        node: NodePtr<T, P>,
    ) -> InsertOutcome {
        let _pin = G::pin();
        loop {
            let (current, anchor) = unsafe { self.stabilize() };
            if !mode.admits(anchor.is_empty()) {
                return InsertOutcome::Rejected;
            }

            let (desired, outcome) = if anchor.is_empty() {
                // A previous failed attempt may have left an outward link.
                unsafe {
                    (*node).next().store(std::ptr::null_mut());
                    (*node).prev().store(std::ptr::null_mut());
                }
                let single = MarkedPtr::new(node);
                (NodeAnchor::<T, P>::new(single, single), InsertOutcome::IntoEmpty)
            } else {
                let published = MarkedPtr::new(node).with_mark(true);
                let desired = match end {
                    End::Back => {
                        unsafe { (*node).prev().store(anchor.tail().as_ptr()) };
                        NodeAnchor::<T, P>::new(anchor.head(), published)
                    }
                    End::Front => {
                        unsafe { (*node).next().store(anchor.head().as_ptr()) };
                        NodeAnchor::<T, P>::new(published, anchor.tail())
                    }
                };
                (desired, InsertOutcome::IntoNonEmpty)
            };

            if self.anchor.compare_exchange(current, desired) {
                unsafe {
                    self.retire_anchor(current);
                    if outcome == InsertOutcome::IntoNonEmpty {
                        self.stabilize();
                    }
                }
                return outcome;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::deque::node::DequeNode;
    use crate::data_structures::deque::policy::Plain;
    use crate::guard::DeferredGuard;

    type TestDeque = LockFreeDeque<&'static str, DeferredGuard, Plain>;

    fn node(value: &'static str) -> NodePtr<&'static str, Plain> {
        DequeNode::allocate(|| value, ()).unwrap()
    }

    #[test]
    fn test_insert_modes() {
        assert!(InsertMode::Always.admits(true));
        assert!(InsertMode::Always.admits(false));
        assert!(InsertMode::OnlyIfEmpty.admits(true));
        assert!(!InsertMode::OnlyIfEmpty.admits(false));
        assert!(!InsertMode::OnlyIfNotEmpty.admits(true));
        assert!(InsertMode::OnlyIfNotEmpty.admits(false));
    }

    #[test]
    fn test_insert_outcomes() {
        let deque = TestDeque::new();
        unsafe {
            assert_eq!(
                deque.insert(End::Back, InsertMode::Always, node("b")),
                InsertOutcome::IntoEmpty
            );
            assert_eq!(
                deque.insert(End::Front, InsertMode::Always, node("a")),
                InsertOutcome::IntoNonEmpty
            );
            assert_eq!(
                deque.insert(End::Back, InsertMode::OnlyIfNotEmpty, node("c")),
                InsertOutcome::IntoNonEmpty
            );

            let rejected = node("never");
            assert_eq!(
                deque.insert(End::Back, InsertMode::OnlyIfEmpty, rejected),
                InsertOutcome::Rejected
            );
            DequeNode::destroy(rejected);
        }

        assert!(deque.is_stable());
        assert_eq!(deque.pop_front().map(|p| p.value), Some("a"));
        assert_eq!(deque.pop_front().map(|p| p.value), Some("b"));
        assert_eq!(deque.pop_front().map(|p| p.value), Some("c"));
        assert_eq!(deque.pop_front(), None);
    }

    #[test]
    fn test_insert_links_both_directions() {
        let deque = TestDeque::new();
        let first = node("first");
        let second = node("second");
        unsafe {
            deque.insert(End::Back, InsertMode::Always, first);
            deque.insert(End::Back, InsertMode::Always, second);
            assert_eq!((*first).next().load().ptr(), second);
            assert_eq!((*second).prev().load().ptr(), first);
        }
    }

    #[test]
    fn test_insert_into_empty_rejected_when_not_empty_required() {
        let deque = TestDeque::new();
        let lonely = node("lonely");
        unsafe {
            assert_eq!(
                deque.insert(End::Front, InsertMode::OnlyIfNotEmpty, lonely),
                InsertOutcome::Rejected
            );
            DequeNode::destroy(lonely);
        }
        assert!(deque.is_empty());
    }
}
