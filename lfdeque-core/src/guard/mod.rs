//! Guard trait for memory reclamation strategies.
//!
//! The deque never frees a node (or a superseded anchor snapshot) directly
//! from a concurrent operation. It hands the pointer to its `Guard`, which
//! frees it once no thread can still be reading it.
//!
//! # Design
//!
//! ```text
//! LockFreeDeque<T, G: Guard, P>
//!     │
//!     ├── LockFreeDeque<T, EpochGuard>      (production, lfdeque-crossbeam)
//!     └── LockFreeDeque<T, DeferredGuard>   (testing)
//! ```
//!
//! Every operation pins a read guard before it loads the anchor and keeps it
//! until its last dereference. A pinned read guard is what makes a loaded
//! node or snapshot pointer safe to dereference; re-loading the anchor and
//! comparing it with the pinned snapshot is how an operation validates that
//! what it read is still current.
//!
//! # Example
//!
//! ```rust,ignore
//! use lfdeque_core::LockFreeDeque;
//! use lfdeque_crossbeam::EpochGuard;
//!
//! let deque: LockFreeDeque<i32, EpochGuard> = LockFreeDeque::new();
//! deque.push_back(42);
//! ```

mod deferred_guard;

pub use deferred_guard::DeferredGuard;

/// A memory reclamation guard that protects concurrent access to nodes.
///
/// Different implementations provide different trade-offs:
///
/// - **EpochGuard**: Low overhead, batched reclamation (crossbeam-epoch)
/// - **DeferredGuard**: Simple, defers all destruction until guard drops (testing)
///
/// # Safety Contract
///
/// Implementations must ensure:
/// 1. Pointers passed to `defer_destroy` are not freed while any read guard
///    pinned before the call is still alive
/// 2. Each retired pointer is freed exactly once
///
/// # Design Note
///
/// Guards are stored in collections and must be `Send + Sync`. The stored
/// guard schedules destruction; thread pinning happens per operation through
/// [`Guard::pin`], not when the guard is created.
///
pub trait Guard: Sized + Default + Send + Sync {
    /// An active guard that protects reads for its lifetime.
    ///
    /// For epoch-based guards, this holds an actual pinned `crossbeam_epoch::Guard`.
    /// For deferred guards, this can be a unit type `()` since protection
    /// is provided by the collection's stored guard.
    ///
    type ReadGuard: Sized;

    /// Pin an active read guard for the duration of one operation.
    fn pin() -> Self::ReadGuard;

    /// Schedule a node for deferred destruction.
    ///
    /// The node will be deallocated when it's safe (no readers).
    ///
    /// # Safety
    ///
    /// - `node` must be a valid pointer previously allocated by the collection
    /// - `node` must be unreachable from the collection's anchor
    /// - `dealloc` must be the correct deallocation function for `node`
    /// - `node` must not be retired twice
    /// - `dealloc(node)` may run on any thread, after the collection itself is
    ///   gone; it must not reach data that is borrowed or not `Send`
    ///
    unsafe fn defer_destroy<N>(&self, node: *mut N, dealloc: unsafe fn(*mut N));
}
