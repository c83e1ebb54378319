// Marked pointer operations using the LSB as the in-progress flag.
//
// Bit layout:
//   Bit 0: IN_PROGRESS_MARK - an insert published this node as the head (or tail)
//          but the node it displaced does not point back to it yet
//
// Only the anchor's head and tail carry the mark. Node links never do.
//
const IN_PROGRESS_MARK: usize = 0b1;

/// A pointer that uses the least significant bit as the in-progress flag.
pub(crate) struct MarkedPtr<T> {
    ptr: *mut T,
}

// Manual impls to avoid requiring T: Clone/Copy
impl<T> Copy for MarkedPtr<T> {}

impl<T> Clone for MarkedPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for MarkedPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T> Eq for MarkedPtr<T> {}

impl<T> std::fmt::Debug for MarkedPtr<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:p}{}", self.as_ptr(), if self.is_marked() { "*" } else { "" })
    }
}

impl<T> MarkedPtr<T> {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Create an unmarked MarkedPtr from a clean pointer.
    #[inline]
    pub(crate) fn new(ptr: *mut T) -> Self {
        debug_assert_eq!(ptr as usize & IN_PROGRESS_MARK, 0);
        MarkedPtr { ptr }
    }

    #[inline]
    pub(crate) fn null() -> Self {
        MarkedPtr {
            ptr: std::ptr::null_mut(),
        }
    }

    // =========================================================================
    // Extraction
    // =========================================================================

    /// Get the clean pointer without the mark bit (the one you dereference).
    #[inline]
    pub(crate) fn as_ptr(&self) -> *mut T {
        (self.ptr as usize & !IN_PROGRESS_MARK) as *mut T
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    #[inline]
    pub(crate) fn is_marked(&self) -> bool {
        (self.ptr as usize & IN_PROGRESS_MARK) != 0
    }

    #[inline]
    pub(crate) fn is_null(&self) -> bool {
        self.as_ptr().is_null()
    }

    // =========================================================================
    // Transformers
    // =========================================================================

    /// Same address with the in-progress mark set or cleared.
    #[inline]
    pub(crate) fn with_mark(&self, mark: bool) -> Self {
        let ptr_bits = self.as_ptr() as usize;
        let marked_bits = if mark {
            ptr_bits | IN_PROGRESS_MARK
        } else {
            ptr_bits
        };
        MarkedPtr {
            ptr: marked_bits as *mut T,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mark_round_trip() {
        let raw = Box::into_raw(Box::new(7u64));
        let ptr = MarkedPtr::new(raw);

        assert!(!ptr.is_marked());
        let marked = ptr.with_mark(true);
        assert!(marked.is_marked());
        assert_eq!(marked.as_ptr(), raw);
        assert_ne!(marked, ptr);
        assert_eq!(marked.with_mark(false), ptr);

        unsafe { drop(Box::from_raw(raw)) };
    }

    #[test]
    fn test_null_is_unmarked() {
        let ptr: MarkedPtr<u64> = MarkedPtr::null();
        assert!(ptr.is_null());
        assert!(!ptr.is_marked());
        assert!(ptr.with_mark(true).is_null());
    }
}
