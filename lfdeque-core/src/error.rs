//! Errors surfaced by deque operations.
//!
//! Contention is never an error: every lock-free path retries internally and
//! reports only semantic outcomes. The single failure that escapes is the
//! allocator refusing a node.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DequeError {
    #[error("failed to allocate a deque node ({size} bytes, align {align})")]
    AllocationFailed { size: usize, align: usize },
}

pub type Result<T> = std::result::Result<T, DequeError>;
