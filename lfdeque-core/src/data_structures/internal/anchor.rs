//! The deque anchor: `(head, tail)` changed together by a single-word CAS.
//!
//! ```text
//!   AtomicAnchor ──► Anchor { head: MarkedPtr, tail: MarkedPtr }   (immutable snapshot)
//!        │
//!        └─ CAS ──► Anchor { head', tail' }                         (fresh snapshot)
//! ```
//!
//! Snapshots are never mutated while shared. A structural change allocates a
//! new snapshot and swings the anchor word to it; the superseded snapshot is
//! retired through the collection's guard, the same way unlinked nodes are.
//! Because a snapshot cannot be freed while a pinned reader may still hold
//! it, comparing anchor words by identity is enough to detect any change.

use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use super::MarkedPtr;

pub(crate) struct Anchor<N> {
    head: MarkedPtr<N>,
    tail: MarkedPtr<N>,
}

impl<N> Copy for Anchor<N> {}

impl<N> Clone for Anchor<N> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N> std::fmt::Debug for Anchor<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Anchor")
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}

impl<N> Anchor<N> {
    pub(crate) fn empty() -> Self {
        Anchor {
            head: MarkedPtr::null(),
            tail: MarkedPtr::null(),
        }
    }

    pub(crate) fn new(head: MarkedPtr<N>, tail: MarkedPtr<N>) -> Self {
        debug_assert_eq!(head.is_null(), tail.is_null());
        debug_assert!(!(head.is_marked() && tail.is_marked()));
        Anchor { head, tail }
    }

    #[inline]
    pub(crate) fn head(&self) -> MarkedPtr<N> {
        self.head
    }

    #[inline]
    pub(crate) fn tail(&self) -> MarkedPtr<N> {
        self.tail
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_null()
    }

    /// Neither end carries the in-progress mark.
    #[inline]
    pub(crate) fn is_stable(&self) -> bool {
        !self.head.is_marked() && !self.tail.is_marked()
    }

    pub(crate) fn set_head(&mut self, head: MarkedPtr<N>) {
        self.head = head;
    }

    pub(crate) fn set_tail(&mut self, tail: MarkedPtr<N>) {
        self.tail = tail;
    }

    /// Deallocate a snapshot.
    ///
    /// # Safety
    /// - `ptr` must come from `AtomicAnchor` (allocated with `Box::new`)
    /// - Must only be called once, after no reader can still hold it
    pub(crate) unsafe fn dealloc_ptr(ptr: *mut Self) {
        unsafe { drop(Box::from_raw(ptr)) };
    }
}

/// The shared anchor word.
pub(crate) struct AtomicAnchor<N> {
    current: AtomicPtr<Anchor<N>>,
}

impl<N> AtomicAnchor<N> {
    pub(crate) fn new() -> Self {
        AtomicAnchor {
            current: AtomicPtr::new(Box::into_raw(Box::new(Anchor::empty()))),
        }
    }

    /// Load the current snapshot pointer (Acquire ordering).
    #[inline]
    pub(crate) fn load(&self) -> *mut Anchor<N> {
        self.current.load(Ordering::Acquire)
    }

    /// Load the current snapshot pointer together with a copy of it.
    ///
    /// # Safety
    /// The caller must hold a read guard of the collection's `Guard` so the
    /// snapshot cannot be reclaimed during the copy.
    #[inline]
    pub(crate) unsafe fn snapshot(&self) -> (*mut Anchor<N>, Anchor<N>) {
        let current = self.load();
        (current, unsafe { *current })
    }

    /// Swing the anchor from `expected` to a fresh snapshot of `desired`.
    ///
    /// On success the caller owns `expected` and must retire it. On failure the
    /// fresh snapshot was never published and is freed here.
    pub(crate) fn compare_exchange(&self, expected: *mut Anchor<N>, desired: Anchor<N>) -> bool {
        let fresh = Box::into_raw(Box::new(desired));
        match self
            .current
            .compare_exchange(expected, fresh, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => true,
            Err(_) => {
                unsafe { Anchor::dealloc_ptr(fresh) };
                false
            }
        }
    }

    /// Exclusive access to the current snapshot.
    ///
    /// With `&mut self` no other thread can observe the snapshot, so it can be
    /// edited in place.
    pub(crate) fn get_mut(&mut self) -> &mut Anchor<N> {
        unsafe { &mut **self.current.get_mut() }
    }
}

impl<N> Drop for AtomicAnchor<N> {
    fn drop(&mut self) {
        let current = std::mem::replace(self.current.get_mut(), ptr::null_mut());
        if !current.is_null() {
            unsafe { Anchor::dealloc_ptr(current) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[repr(align(64))]
    struct Slot(#[allow(dead_code)] u8);

    #[test]
    fn test_new_anchor_is_empty_and_stable() {
        let anchor: AtomicAnchor<Slot> = AtomicAnchor::new();
        let (_, snapshot) = unsafe { anchor.snapshot() };
        assert!(snapshot.is_empty());
        assert!(snapshot.is_stable());
    }

    #[test]
    fn test_compare_exchange_requires_identity() {
        let node = Box::into_raw(Box::new(Slot(1)));
        let anchor: AtomicAnchor<Slot> = AtomicAnchor::new();
        let (current, _) = unsafe { anchor.snapshot() };

        let published = Anchor::new(MarkedPtr::new(node), MarkedPtr::new(node).with_mark(true));
        assert!(anchor.compare_exchange(current, published));

        // A second CAS from the superseded snapshot must fail.
        assert!(!anchor.compare_exchange(current, Anchor::empty()));

        let (_, snapshot) = unsafe { anchor.snapshot() };
        assert_eq!(snapshot.head().as_ptr(), node);
        assert!(snapshot.tail().is_marked());
        assert!(!snapshot.is_stable());

        unsafe {
            Anchor::dealloc_ptr(current);
            drop(Box::from_raw(node));
        }
    }

    #[test]
    fn test_get_mut_edits_in_place() {
        let node = Box::into_raw(Box::new(Slot(1)));
        let mut anchor: AtomicAnchor<Slot> = AtomicAnchor::new();
        let before = anchor.load();

        let snapshot = anchor.get_mut();
        snapshot.set_head(MarkedPtr::new(node));
        snapshot.set_tail(MarkedPtr::new(node));

        assert_eq!(anchor.load(), before);
        let (_, snapshot) = unsafe { anchor.snapshot() };
        assert!(!snapshot.is_empty());

        unsafe { drop(Box::from_raw(node)) };
    }
}
