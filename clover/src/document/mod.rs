//! Documents and their binary encoding.

pub mod codec;
mod document;

pub use document::*;
