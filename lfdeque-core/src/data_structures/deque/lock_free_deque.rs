use std::fmt;
use std::marker::PhantomData;

use super::concurrent_deque::{ConcurrentDeque, Popped};
use super::insert::{InsertMode, InsertOutcome};
use super::node::DequeNode;
use super::policy::{Coalescing, Plain, Removal, RemovalPolicy};
use super::End;
use crate::data_structures::internal::{Anchor, AtomicAnchor, MarkedPtr};
use crate::error::Result;
use crate::guard::Guard;

pub(super) type Node<T, P> = DequeNode<T, <P as RemovalPolicy<T>>::Count>;
pub(super) type NodePtr<T, P> = *mut Node<T, P>;
pub(super) type NodeAnchor<T, P> = Anchor<Node<T, P>>;
pub(super) type AnchorPtr<T, P> = *mut NodeAnchor<T, P>;

/// Concurrent double-ended queue based on Michael's paper 'CAS-Based Lock-Free
/// Algorithm for Shared Deques'.
///
/// The only shared mutable state is the anchor, the `(head, tail)` pair, which
/// every structural change replaces with one CAS. An insert publishes its node
/// with the in-progress mark set on the end it grew; the reverse link of the
/// displaced node is fixed afterwards by the stabilizer, which any thread runs
/// before it attempts its own structural change.
///
/// ```text
///   anchor ──► (head, tail*)
///               │      │
///   NULL ◄── [ A ] ◄──► [ B ] ◄── [ C ]     * = C.prev points at B, but B.next
///                                               is not yet C
/// ```
///
/// Memory reclamation is delegated to `G`; removal behaviour (one element per
/// node, or coalesced runs of equal elements) to `P`.
///
/// Two flavours of every operation are provided: `&self` methods are
/// lock-free and safe to call from any number of threads, `*_mut` methods
/// take `&mut self` and skip all atomics.
///
/// The guard has no default: `DeferredGuard` holds every retired pointer
/// until the deque drops, so long-running code reaches for `EpochGuard`.
///
/// ```compile_fail
/// let deque = lfdeque_core::LockFreeDeque::<u64>::new();
/// ```
///
pub struct LockFreeDeque<T, G: Guard, P: RemovalPolicy<T> = Plain> {
    pub(super) anchor: AtomicAnchor<Node<T, P>>,
    /// Shared guard instance for deferred destruction of unlinked nodes and
    /// superseded anchor snapshots.
    guard: G,
    _marker: PhantomData<(T, fn() -> P)>,
}

/// A deque that stores runs of equal elements in one node.
pub type CoalescingDeque<T, G> = LockFreeDeque<T, G, Coalescing>;

// Pops move values across threads; peeks and coalesced pops clone through &T.
unsafe impl<T: Send, G: Guard, P: RemovalPolicy<T>> Send for LockFreeDeque<T, G, P> {}
unsafe impl<T: Send + Sync, G: Guard, P: RemovalPolicy<T>> Sync for LockFreeDeque<T, G, P> {}

impl<T, G, P> LockFreeDeque<T, G, P>
where
    G: Guard,
    P: RemovalPolicy<T>,
{
    pub fn new() -> Self {
        LockFreeDeque {
            anchor: AtomicAnchor::new(),
            guard: G::default(),
            _marker: PhantomData,
        }
    }

    /// Get the shared guard instance for this collection.
    pub fn guard(&self) -> &G {
        &self.guard
    }

    // =========================================================================
    // Concurrent inserts
    // =========================================================================

    /// Append `value`. Returns true if the deque was empty before the insert.
    pub fn push_back(&self, value: T) -> bool {
        self.push_back_with(|| value)
    }

    /// Prepend `value`. Returns true if the deque was empty before the insert.
    pub fn push_front(&self, value: T) -> bool {
        self.push_front_with(|| value)
    }

    /// Append the value produced by `init`, which runs exactly once after the
    /// node has been allocated.
    pub fn push_back_with(&self, init: impl FnOnce() -> T) -> bool {
        let node = Node::<T, P>::allocate_or_abort(init, P::seed(1));
        unsafe { self.publish(End::Back, node) }
    }

    pub fn push_front_with(&self, init: impl FnOnce() -> T) -> bool {
        let node = Node::<T, P>::allocate_or_abort(init, P::seed(1));
        unsafe { self.publish(End::Front, node) }
    }

    /// Fallible [`push_back`](Self::push_back): reports allocation failure
    /// instead of aborting.
    pub fn try_push_back(&self, value: T) -> Result<bool> {
        let node = Node::<T, P>::allocate(|| value, P::seed(1))?;
        Ok(unsafe { self.publish(End::Back, node) })
    }

    pub fn try_push_front(&self, value: T) -> Result<bool> {
        let node = Node::<T, P>::allocate(|| value, P::seed(1))?;
        Ok(unsafe { self.publish(End::Front, node) })
    }

    /// Append only if the deque is observed empty. Returns whether the value
    /// was inserted; a rejected value is dropped.
    pub fn push_back_if_empty(&self, value: T) -> bool {
        self.push_conditionally(End::Back, InsertMode::OnlyIfEmpty, value)
    }

    pub fn push_front_if_empty(&self, value: T) -> bool {
        self.push_conditionally(End::Front, InsertMode::OnlyIfEmpty, value)
    }

    /// Append only if the deque is observed non-empty. Returns whether the
    /// value was inserted; a rejected value is dropped.
    pub fn push_back_if_not_empty(&self, value: T) -> bool {
        self.push_conditionally(End::Back, InsertMode::OnlyIfNotEmpty, value)
    }

    pub fn push_front_if_not_empty(&self, value: T) -> bool {
        self.push_conditionally(End::Front, InsertMode::OnlyIfNotEmpty, value)
    }

    fn push_conditionally(&self, end: End, mode: InsertMode, value: T) -> bool {
        let node = Node::<T, P>::allocate_or_abort(|| value, P::seed(1));
        match unsafe { self.insert(end, mode, node) } {
            InsertOutcome::Rejected => {
                // Never published, so no other thread can hold it.
                unsafe { DequeNode::destroy(node) };
                false
            }
            InsertOutcome::IntoEmpty | InsertOutcome::IntoNonEmpty => true,
        }
    }

    /// Run an unconditional insert and report whether the deque was empty.
    ///
    /// # Safety
    /// `node` must be freshly allocated and unpublished.
    unsafe fn publish(&self, end: End, node: NodePtr<T, P>) -> bool {
        unsafe { self.insert(end, InsertMode::Always, node) == InsertOutcome::IntoEmpty }
    }

    // =========================================================================
    // Concurrent removal and inspection
    // =========================================================================

    pub fn pop_front(&self) -> Option<Popped<T>> {
        self.remove(End::Front)
    }

    pub fn pop_back(&self) -> Option<Popped<T>> {
        self.remove(End::Back)
    }

    /// Copy the front element.
    ///
    /// Safe against concurrent inserts, but not against a concurrent removal
    /// of the front element.
    ///
    /// # Safety
    /// No other thread may pop the front element while this call runs. A pop
    /// may move the payload out of the node the copy is being taken from.
    pub unsafe fn peek_front(&self) -> Option<T>
    where
        T: Clone,
    {
        unsafe { self.peek(End::Front) }
    }

    /// Copy the back element.
    ///
    /// # Safety
    /// No other thread may pop the back element while this call runs.
    pub unsafe fn peek_back(&self) -> Option<T>
    where
        T: Clone,
    {
        unsafe { self.peek(End::Back) }
    }

    pub fn is_empty(&self) -> bool {
        let _pin = G::pin();
        let (_, anchor) = unsafe { self.anchor.snapshot() };
        anchor.is_empty()
    }

    /// Exactly one logical element is present.
    ///
    /// For a coalescing deque a single node holding a run of several elements
    /// does not count.
    pub fn contains_one(&self) -> bool {
        let _pin = G::pin();
        let (_, anchor) = unsafe { self.anchor.snapshot() };
        if anchor.is_empty() || anchor.head().as_ptr() != anchor.tail().as_ptr() {
            return false;
        }
        let node = anchor.head().as_ptr();
        P::remaining(unsafe { (*node).count() }) == 1
    }

    /// Neither end carries an in-progress insert mark.
    ///
    /// Every insert stabilizes the end it grew before returning, so this holds
    /// whenever no operation is in flight.
    pub fn is_stable(&self) -> bool {
        let _pin = G::pin();
        let (_, anchor) = unsafe { self.anchor.snapshot() };
        anchor.is_stable()
    }

    /// Detach every element with one anchor CAS, then release the detached
    /// chain.
    ///
    /// Plain payloads are dropped before `clear` returns and only the node
    /// shells go through the guard. A coalesced payload may still be copied by
    /// a pop that decremented its run, so coalesced nodes are retired whole.
    pub fn clear(&self) {
        let _pin = G::pin();
        let detached = loop {
            let (current, anchor) = unsafe { self.stabilize() };
            if anchor.is_empty() {
                return;
            }
            if self.anchor.compare_exchange(current, Anchor::empty()) {
                unsafe { self.retire_anchor(current) };
                break anchor;
            }
        };

        // Readers pinned before the swap may still hold these nodes.
        let release = |node: NodePtr<T, P>| unsafe { self.release_detached(node) };
        let nodes =
            unsafe { walk_chain(detached.head().as_ptr(), detached.tail().as_ptr(), release) };
        tracing::debug!(nodes, "cleared deque");
    }

    // =========================================================================
    // Exclusive-access variants
    // =========================================================================

    pub fn push_back_mut(&mut self, value: T) -> bool {
        self.push_back_with_mut(|| value)
    }

    pub fn push_front_mut(&mut self, value: T) -> bool {
        self.push_front_with_mut(|| value)
    }

    pub fn push_back_with_mut(&mut self, init: impl FnOnce() -> T) -> bool {
        let node = Node::<T, P>::allocate_or_abort(init, P::seed(1));
        self.insert_mut(End::Back, node)
    }

    pub fn push_front_with_mut(&mut self, init: impl FnOnce() -> T) -> bool {
        let node = Node::<T, P>::allocate_or_abort(init, P::seed(1));
        self.insert_mut(End::Front, node)
    }

    pub fn push_back_if_empty_mut(&mut self, value: T) -> bool {
        self.push_conditionally_mut(End::Back, InsertMode::OnlyIfEmpty, value)
    }

    pub fn push_front_if_empty_mut(&mut self, value: T) -> bool {
        self.push_conditionally_mut(End::Front, InsertMode::OnlyIfEmpty, value)
    }

    pub fn push_back_if_not_empty_mut(&mut self, value: T) -> bool {
        self.push_conditionally_mut(End::Back, InsertMode::OnlyIfNotEmpty, value)
    }

    pub fn push_front_if_not_empty_mut(&mut self, value: T) -> bool {
        self.push_conditionally_mut(End::Front, InsertMode::OnlyIfNotEmpty, value)
    }

    /// The condition is checked before allocating; a rejected value is
    /// dropped.
    fn push_conditionally_mut(&mut self, end: End, mode: InsertMode, value: T) -> bool {
        if !mode.admits(self.anchor.get_mut().is_empty()) {
            return false;
        }
        let node = Node::<T, P>::allocate_or_abort(|| value, P::seed(1));
        self.insert_mut(end, node);
        true
    }

    pub fn pop_front_mut(&mut self) -> Option<T> {
        self.remove_mut(End::Front)
    }

    pub fn pop_back_mut(&mut self) -> Option<T> {
        self.remove_mut(End::Back)
    }

    pub fn peek_front_mut(&mut self) -> Option<&T> {
        self.stabilize_mut();
        let head = self.anchor.get_mut().head();
        if head.is_null() {
            return None;
        }
        Some(unsafe { (*head.as_ptr()).payload() })
    }

    pub fn peek_back_mut(&mut self) -> Option<&T> {
        self.stabilize_mut();
        let tail = self.anchor.get_mut().tail();
        if tail.is_null() {
            return None;
        }
        Some(unsafe { (*tail.as_ptr()).payload() })
    }

    /// Drop every element immediately.
    pub fn clear_mut(&mut self) {
        self.stabilize_mut();
        let anchor = self.anchor.get_mut();
        let detached = *anchor;
        *anchor = Anchor::empty();

        // Exclusive access: nobody else can be reading the chain.
        let destroy = |node: NodePtr<T, P>| unsafe { DequeNode::destroy(node) };
        unsafe { walk_chain(detached.head().as_ptr(), detached.tail().as_ptr(), destroy) };
    }

    /// Number of physical nodes. A coalesced run counts once.
    pub fn node_count(&mut self) -> usize {
        self.stabilize_mut();
        let anchor = *self.anchor.get_mut();
        unsafe { walk_chain(anchor.head().as_ptr(), anchor.tail().as_ptr(), |_| {}) }
    }

    /// Swap contents with `other`.
    ///
    /// Ordinary move semantics, not a lock-free operation: `&mut` on both
    /// sides guarantees neither deque is being mutated by another thread.
    pub fn swap(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }

    /// Replace the contents with `other`, returning the previous contents.
    pub fn exchange(&mut self, other: Self) -> Self {
        std::mem::replace(self, other)
    }

    fn insert_mut(&mut self, end: End, node: NodePtr<T, P>) -> bool {
        self.stabilize_mut();
        let anchor = self.anchor.get_mut();
        if anchor.is_empty() {
            anchor.set_head(MarkedPtr::new(node));
            anchor.set_tail(MarkedPtr::new(node));
            return true;
        }

        unsafe {
            match end {
                End::Back => {
                    let tail = anchor.tail().as_ptr();
                    (*node).prev().store(tail);
                    (*tail).next().store(node);
                    anchor.set_tail(MarkedPtr::new(node));
                }
                End::Front => {
                    let head = anchor.head().as_ptr();
                    (*node).next().store(head);
                    (*head).prev().store(node);
                    anchor.set_head(MarkedPtr::new(node));
                }
            }
        }
        false
    }

    fn remove_mut(&mut self, end: End) -> Option<T> {
        self.stabilize_mut();
        let anchor = self.anchor.get_mut();
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

        if let Removal::Decremented(value) = P::on_remove(node_ref.count(), node_ref.payload()) {
            return Some(value);
        }

        if head == tail {
            *anchor = Anchor::empty();
        } else {
            match end {
                End::Front => anchor.set_head(MarkedPtr::new(node_ref.next().load().ptr())),
                End::Back => anchor.set_tail(MarkedPtr::new(node_ref.prev().load().ptr())),
            }
        }
        P::mark_removed(node_ref.count());

        // Exclusive access: the node can be freed right away.
        let value = match P::copy_on_unlink(node_ref.payload()) {
            Some(value) => {
                unsafe { DequeNode::destroy(node) };
                value
            }
            None => unsafe {
                let value = DequeNode::take_payload(node);
                DequeNode::release_shell(node);
                value
            },
        };
        Some(value)
    }

    // =========================================================================
    // Reclamation
    // =========================================================================

    /// Hand a superseded anchor snapshot to the guard.
    ///
    /// # Safety
    /// `snapshot` must have just been replaced by this thread's successful CAS.
    pub(super) unsafe fn retire_anchor(&self, snapshot: AnchorPtr<T, P>) {
        unsafe { self.guard.defer_destroy(snapshot, Anchor::dealloc_ptr) };
    }

    /// Take the value out of a node this thread unlinked and retire the node.
    ///
    /// # Safety
    /// `node` must have just been unlinked by this thread's anchor CAS.
    pub(super) unsafe fn reclaim_unlinked(&self, node: NodePtr<T, P>) -> T {
        match P::copy_on_unlink(unsafe { (*node).payload() }) {
            Some(value) => {
                unsafe { self.guard.defer_destroy(node, DequeNode::destroy) };
                value
            }
            None => unsafe {
                let value = DequeNode::take_payload(node);
                self.guard.defer_destroy(node, DequeNode::release_shell);
                value
            },
        }
    }

    /// Release a node detached by [`clear`](Self::clear).
    ///
    /// # Safety
    /// `node` must belong to a chain this thread detached with its anchor CAS.
    unsafe fn release_detached(&self, node: NodePtr<T, P>) {
        if P::SHARED_PAYLOAD {
            unsafe { self.guard.defer_destroy(node, DequeNode::destroy) };
        } else {
            unsafe {
                drop(DequeNode::take_payload(node));
                self.guard.defer_destroy(node, DequeNode::release_shell);
            }
        }
    }
}

/// Visit every node of a stable chain from `head` to `tail`, loading each
/// `next` link before the visit so `visit` may free the node.
///
/// # Safety
/// The chain must be stable (all forward links installed) and `visit` must not
/// free a node that is still linked from the rest of the chain.
unsafe fn walk_chain<T, C>(
    head: *mut DequeNode<T, C>,
    tail: *mut DequeNode<T, C>,
    mut visit: impl FnMut(*mut DequeNode<T, C>),
) -> usize {
    if head.is_null() {
        return 0;
    }

    let mut visited = 0;
    let mut node = head;
    loop {
        let is_last = node == tail;
        let next = unsafe { (*node).next().load().ptr() };
        visit(node);
        visited += 1;
        if is_last {
            return visited;
        }
        node = next;
    }
}

impl<T, G> LockFreeDeque<T, G, Coalescing>
where
    T: Clone + Send + 'static,
    G: Guard,
{
    /// Append `elements` copies of `value` as one node. Returns true if the
    /// deque was empty before the insert; `elements == 0` is a no-op.
    pub fn push_back_n(&self, elements: usize, value: T) -> bool {
        self.push_run(End::Back, elements, value)
    }

    pub fn push_front_n(&self, elements: usize, value: T) -> bool {
        self.push_run(End::Front, elements, value)
    }

    pub fn push_back_n_mut(&mut self, elements: usize, value: T) -> bool {
        self.push_run_mut(End::Back, elements, value)
    }

    pub fn push_front_n_mut(&mut self, elements: usize, value: T) -> bool {
        self.push_run_mut(End::Front, elements, value)
    }

    fn push_run(&self, end: End, elements: usize, value: T) -> bool {
        match Self::allocate_run(elements, value) {
            Some(node) => unsafe { self.publish(end, node) },
            None => false,
        }
    }

    fn push_run_mut(&mut self, end: End, elements: usize, value: T) -> bool {
        match Self::allocate_run(elements, value) {
            Some(node) => self.insert_mut(end, node),
            None => false,
        }
    }

    fn allocate_run(elements: usize, value: T) -> Option<NodePtr<T, Coalescing>> {
        if elements == 0 {
            return None;
        }
        Some(Node::<T, Coalescing>::allocate_or_abort(
            || value,
            <Coalescing as RemovalPolicy<T>>::seed(elements),
        ))
    }
}

impl<T, G, P> Default for LockFreeDeque<T, G, P>
where
    G: Guard,
    P: RemovalPolicy<T>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, G, P> Drop for LockFreeDeque<T, G, P>
where
    G: Guard,
    P: RemovalPolicy<T>,
{
    fn drop(&mut self) {
        self.clear_mut();
    }
}

impl<T, G, P> fmt::Debug for LockFreeDeque<T, G, P>
where
    G: Guard,
    P: RemovalPolicy<T>,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockFreeDeque")
            .field("is_empty", &self.is_empty())
            .field("is_stable", &self.is_stable())
            .finish_non_exhaustive()
    }
}

impl<T, G, P> Extend<T> for LockFreeDeque<T, G, P>
where
    G: Guard,
    P: RemovalPolicy<T>,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push_back_mut(value);
        }
    }
}

impl<T, G, P> FromIterator<T> for LockFreeDeque<T, G, P>
where
    G: Guard,
    P: RemovalPolicy<T>,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut deque = Self::new();
        deque.extend(iter);
        deque
    }
}

impl<T, G, P> ConcurrentDeque<T> for LockFreeDeque<T, G, P>
where
    T: Send + Sync,
    G: Guard,
    P: RemovalPolicy<T>,
{
    fn push_front(&self, value: T) -> bool {
        LockFreeDeque::push_front(self, value)
    }

    fn push_back(&self, value: T) -> bool {
        LockFreeDeque::push_back(self, value)
    }

    fn push_front_if_empty(&self, value: T) -> bool {
        LockFreeDeque::push_front_if_empty(self, value)
    }

    fn push_back_if_empty(&self, value: T) -> bool {
        LockFreeDeque::push_back_if_empty(self, value)
    }

    fn push_front_if_not_empty(&self, value: T) -> bool {
        LockFreeDeque::push_front_if_not_empty(self, value)
    }

    fn push_back_if_not_empty(&self, value: T) -> bool {
        LockFreeDeque::push_back_if_not_empty(self, value)
    }

    fn pop_front(&self) -> Option<Popped<T>> {
        LockFreeDeque::pop_front(self)
    }

    fn pop_back(&self) -> Option<Popped<T>> {
        LockFreeDeque::pop_back(self)
    }

    fn is_empty(&self) -> bool {
        LockFreeDeque::is_empty(self)
    }

    fn contains_one(&self) -> bool {
        LockFreeDeque::contains_one(self)
    }

    fn is_stable(&self) -> bool {
        LockFreeDeque::is_stable(self)
    }

    fn clear(&self) {
        LockFreeDeque::clear(self)
    }
}
