//! Lock-free double-ended queue.
//!
//! # Organization
//!
//! - [`LockFreeDeque`] - the deque itself, generic over guard and removal policy
//! - [`ConcurrentDeque`] - the `&self` surface shared by every configuration
//! - [`policy`] - one element per node ([`Plain`]) or coalesced runs ([`Coalescing`])
//!
//! The engines (insert, remove, stabilizer) are `impl` blocks on
//! `LockFreeDeque` split by concern.

mod concurrent_deque;
mod insert;
mod lock_free_deque;
mod node;
pub mod policy;
mod remove;
mod stabilizer;

pub use concurrent_deque::{ConcurrentDeque, Popped};
pub use lock_free_deque::{CoalescingDeque, LockFreeDeque};
pub use policy::{CoalescedCount, Coalescing, Plain, Removal, RemovalPolicy};

/// Which end of the deque an operation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum End {
    Front,
    Back,
}
