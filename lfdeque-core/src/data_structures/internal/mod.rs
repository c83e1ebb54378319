//! Internal implementation details.
//!
//! These are pub(crate) and not intended for external use.

pub mod anchor;
pub mod marked_ptr;
pub mod versioned_ptr;

pub(crate) use anchor::{Anchor, AtomicAnchor};
pub(crate) use marked_ptr::MarkedPtr;
pub(crate) use versioned_ptr::VersionedPtr;
