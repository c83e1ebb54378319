//! Versioned pointer for node links.
//!
//! Bit layout of the atomic word:
//!   Bits 0..VERSION_BITS: wrapping version, bumped on every write
//!   Remaining bits:       node address
//!
//! The pointee must be aligned to at least `1 << VERSION_BITS` bytes so the
//! version bits of every address are zero. Deque nodes are 64-byte aligned.
//!
//! The version lets a writer condition its store on nothing having changed
//! since it read the link, even if the same address was written back in
//! between (ABA).

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};

pub(crate) const VERSION_BITS: u32 = 6;
const VERSION_MASK: usize = (1 << VERSION_BITS) - 1;

/// A loaded `(pointer, version)` pair.
pub(crate) struct Versioned<T> {
    ptr: *mut T,
    version: usize,
}

impl<T> Copy for Versioned<T> {}

impl<T> Clone for Versioned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Versioned<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr && self.version == other.version
    }
}

impl<T> std::fmt::Debug for Versioned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:p}@v{}", self.ptr, self.version)
    }
}

impl<T> Versioned<T> {
    #[inline]
    pub(crate) fn new(ptr: *mut T, version: usize) -> Self {
        debug_assert_eq!(ptr as usize & VERSION_MASK, 0, "pointer not aligned for versioning");
        Versioned {
            ptr,
            version: version & VERSION_MASK,
        }
    }

    #[inline]
    pub(crate) fn ptr(&self) -> *mut T {
        self.ptr
    }

    #[inline]
    pub(crate) fn version(&self) -> usize {
        self.version
    }

    #[inline]
    fn pack(&self) -> usize {
        self.ptr as usize | self.version
    }

    #[inline]
    fn unpack(word: usize) -> Self {
        Versioned {
            ptr: (word & !VERSION_MASK) as *mut T,
            version: word & VERSION_MASK,
        }
    }
}

/// An atomic node link carrying a wrapping version tag.
pub(crate) struct VersionedPtr<T> {
    word: AtomicUsize,
    _marker: PhantomData<*mut T>,
}

impl<T> VersionedPtr<T> {
    pub(crate) fn null() -> Self {
        VersionedPtr {
            word: AtomicUsize::new(0),
            _marker: PhantomData,
        }
    }

    /// Load pointer and version (Acquire ordering)
    #[inline]
    pub(crate) fn load(&self) -> Versioned<T> {
        Versioned::unpack(self.word.load(Ordering::Acquire))
    }

    /// Store `ptr` at the next version (Release ordering).
    ///
    /// Not a read-modify-write: only valid while the caller is the sole writer
    /// of this link (a node not yet published, or exclusive `&mut` access).
    #[inline]
    pub(crate) fn store(&self, ptr: *mut T) {
        let current = self.load();
        let next = Versioned::new(ptr, current.version + 1);
        self.word.store(next.pack(), Ordering::Release);
    }

    /// Whole-word CAS: succeeds only if both pointer and version match.
    #[inline]
    pub(crate) fn compare_exchange(&self, expected: Versioned<T>, desired: Versioned<T>) -> bool {
        self.word
            .compare_exchange(
                expected.pack(),
                desired.pack(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// Install `desired` only if the link still holds `expected_ptr` at
    /// `expected_version`. The stored version becomes `expected_version + 1`.
    #[inline]
    pub(crate) fn versioned_exchange(
        &self,
        desired: *mut T,
        expected_version: usize,
        expected_ptr: *mut T,
    ) -> bool {
        self.compare_exchange(
            Versioned::new(expected_ptr, expected_version),
            Versioned::new(desired, expected_version + 1),
        )
    }
}
