//! Ordered transactional key-value store contract and the in-memory backend.

mod kv;
pub mod memory;

pub use kv::*;
