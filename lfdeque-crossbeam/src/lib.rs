//! Crossbeam-based reclamation for lfdeque collections.
//!
//! This crate provides `EpochGuard`, an implementation of the `Guard` trait
//! using crossbeam-epoch for memory reclamation.
//!
//! # Usage
//!
//! ```ignore
//! use lfdeque_core::LockFreeDeque;
//! use lfdeque_crossbeam::EpochGuard;
//!
//! let deque: LockFreeDeque<i32, EpochGuard> = LockFreeDeque::new();
//! deque.push_back(42);
//! ```

pub mod epoch_guard;

pub use epoch_guard::EpochGuard;

/// A plain deque reclaimed through the global epoch collector.
pub type EpochDeque<T> = lfdeque_core::LockFreeDeque<T, EpochGuard>;

/// A coalescing deque reclaimed through the global epoch collector.
pub type EpochCoalescingDeque<T> = lfdeque_core::CoalescingDeque<T, EpochGuard>;
