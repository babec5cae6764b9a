//! # Clover - document model and indexing core
//!
//! Clover is the storage-facing core of an embedded document database. It
//! turns arbitrary Rust values into a canonical document model, keeps
//! documents in a compact binary encoding, and maintains secondary indexes
//! inside an ordered transactional key-value store.
//!
//! ## Key Features
//!
//! - **Normalization**: any [`common::Normalize`] value, including
//!   `#[derive(Normalize)]` records, becomes a canonical [`common::Value`]
//! - **Documents**: dotted-path access over a lazily decoded binary payload
//! - **Indexes**: order-preserving single-field and Z-order geospatial indexes
//! - **Storage**: an ordered key-value contract with an in-memory backend
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use clover::doc;
//! use clover::document::Document;
//!
//! let mut doc = doc! {
//!     title: "buy milk",
//!     details: { priority: 2, tags: ["home", "shopping"] },
//! };
//! doc.set("details.done", false)?;
//! assert_eq!(doc.get("details.priority")?, Some(&Value::I64(2)));
//!
//! let bytes = clover::document::encode(&doc);
//! let copy = clover::document::decode(bytes);
//! assert_eq!(doc, copy);
//! ```
//!
//! ## Module Organization
//!
//! - [`common`] - Canonical values, normalization and shared utilities
//! - [`config`] - Process wide settings
//! - [`document`] - Documents and their binary encoding
//! - [`errors`] - Error types and result definitions
//! - [`index`] - Single-field and geospatial indexes
//! - [`store`] - Ordered key-value store contract and in-memory backend

extern crate self as clover;

use crate::common::*;
use std::sync::LazyLock;

pub mod common;
pub mod config;
pub mod document;
pub mod errors;
pub mod index;
pub mod store;

pub(crate) static FIELD_SEPARATOR: LazyLock<Atomic<String>> = LazyLock::new(|| atomic(".".to_string()));

#[cfg(test)]
#[ctor::ctor]
fn init() {
    colog::init();
}
