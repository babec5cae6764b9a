//! Secondary indexes stored inside the key-value store.
//!
//! An index projects one document field onto document ids. Every entry is a
//! single key whose bytes sort in the order of the indexed values, so value
//! order walks and range queries are plain key scans.
//!
//! # Index Types
//!
//! - **Single-field**: ordered projection of a scalar field, see [RangeIndex]
//! - **Geospatial**: Z-order projection of `[x, y]` points, see [GeoIndex]
//!
//! # Usage
//!
//! ```rust,ignore
//! use clover::index::{create_index, IndexInfo, IndexType};
//! use clover::store::memory::InMemoryStore;
//!
//! let store = InMemoryStore::new();
//! let index = create_index(IndexInfo::new("todos", "priority", IndexType::SingleField), None)?;
//! store.update(|txn| index.add(txn, "doc-1", &Value::from(3i64), TimeDelta::milliseconds(-1)))?;
//! ```

mod descriptor;
mod geo_index;
pub(crate) mod key_codec;
mod provider;
mod range_index;

pub use descriptor::*;
pub use geo_index::*;
pub use provider::*;
pub use range_index::*;
