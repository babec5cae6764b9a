//! Shared helpers for the cross-crate integration tests.

pub mod test_util;
