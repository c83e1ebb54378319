//! Test suites shared by every deque configuration.
//!
//! Each suite is a set of generic `pub fn test_*` functions; the integration
//! tests of this crate and of the guard crates instantiate them per
//! configuration.
