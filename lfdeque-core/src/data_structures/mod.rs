//! Data structures for concurrent collections.
//!
//! # Organization
//!
//! - [`deque`] - Lock-free double-ended queue (LockFreeDeque, CoalescingDeque)
//! - [`internal`] - Internal implementation details (pub(crate))

pub mod deque;
pub(crate) mod internal;

pub use deque::{
    CoalescingDeque, ConcurrentDeque, LockFreeDeque, Popped, policy::Coalescing, policy::Plain,
    policy::RemovalPolicy,
};
