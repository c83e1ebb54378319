pub mod common_tests;
pub mod data_structures;
pub mod error;
pub mod guard;

// Re-export the main types for convenience
pub use data_structures::{
    CoalescingDeque, ConcurrentDeque, LockFreeDeque, Popped,
    deque::{CoalescedCount, Coalescing, Plain, Removal, RemovalPolicy},
};
pub use error::{DequeError, Result};
pub use guard::{DeferredGuard, Guard};
