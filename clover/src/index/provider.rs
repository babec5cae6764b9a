use crate::common::Value;
use crate::errors::{CloverError, CloverResult, ErrorKind};
use crate::index::{BoundingBox, GeoIndex, GeoSpatialIndexInfo, IndexInfo, IndexType, RangeIndex};
use crate::store::KvTransaction;
use chrono::TimeDelta;
use std::fmt::{Debug, Formatter};
use std::ops::{Bound, Deref};
use std::sync::Arc;

/// Callback receiving the document ids produced by an index walk.
///
/// Returning an error stops the walk; the error is propagated to the caller.
pub type OnValue<'a> = dyn FnMut(&str) -> CloverResult<()> + 'a;

/// Provider trait for concrete index implementations.
///
/// An index maintains an ordered projection of one document field onto
/// document ids inside a key-value store. It owns no data and holds no
/// transaction: every operation receives the transaction to work in, so one
/// index object can serve any number of transactions.
///
/// # Responsibilities
/// - Encode field values into ordered keys and store them per document id
/// - Remove projections when documents change or disappear
/// - Walk the projection in value order, forward or backward
/// - Delete every entry of the index on drop
pub trait IndexProvider: Send + Sync {
    /// Returns the descriptor of the index.
    fn info(&self) -> &IndexInfo;

    /// Records that document `doc_id` has `value` in the indexed field.
    ///
    /// A non-negative `ttl` makes the entry expire together with the
    /// document; a negative one means the entry never expires.
    ///
    /// # Errors
    /// - `UnsupportedIndexValueType` if the index cannot encode the kind of `value`
    /// - `EncodingFailure` if the value has no ordered representation
    /// - `InvalidOperation` if `doc_id` contains a NUL byte
    fn add(
        &self,
        txn: &mut dyn KvTransaction,
        doc_id: &str,
        value: &Value,
        ttl: TimeDelta,
    ) -> CloverResult<()>;

    /// Removes the entry for (`value`, `doc_id`). Removing a missing entry
    /// succeeds.
    fn remove(&self, txn: &mut dyn KvTransaction, doc_id: &str, value: &Value) -> CloverResult<()>;

    /// Calls `on_value` with every indexed document id in value order, or in
    /// reverse value order. Ids sharing a value come in id order.
    fn iterate(&self, txn: &dyn KvTransaction, reverse: bool, on_value: &mut OnValue) -> CloverResult<()>;

    /// Deletes every entry of the index.
    fn drop_index(&self, txn: &mut dyn KvTransaction) -> CloverResult<()>;

    /// Walks the entries whose value lies between `lower` and `upper`.
    ///
    /// Only ordered scalar indexes support it.
    fn iterate_range(
        &self,
        _txn: &dyn KvTransaction,
        _lower: Bound<&Value>,
        _upper: Bound<&Value>,
        _reverse: bool,
        _on_value: &mut OnValue,
    ) -> CloverResult<()> {
        Err(unsupported_query(self.info(), "range"))
    }

    /// Walks the entries whose point may lie inside `region`; the walk can
    /// report points slightly outside it.
    ///
    /// Only geospatial indexes support it.
    fn iterate_region(
        &self,
        _txn: &dyn KvTransaction,
        _region: &BoundingBox,
        _on_value: &mut OnValue,
    ) -> CloverResult<()> {
        Err(unsupported_query(self.info(), "region"))
    }

    fn index_type(&self) -> IndexType {
        self.info().index_type()
    }

    fn collection(&self) -> &str {
        self.info().collection()
    }

    fn field(&self) -> &str {
        self.info().field()
    }
}

fn unsupported_query(info: &IndexInfo, query: &str) -> CloverError {
    log::error!("{} does not support {} queries", info, query);
    CloverError::new(
        &format!("{} does not support {} queries", info, query),
        ErrorKind::InvalidOperation,
    )
}

/// Wrapper for concrete index implementations with thread-safe reference
/// counting.
///
/// `Index` lets the range and geospatial variants be used interchangeably
/// through [IndexProvider]. Cloning is cheap and clones share the same
/// implementation. Provider methods are reachable through `Deref`.
#[derive(Clone)]
pub struct Index {
    inner: Arc<dyn IndexProvider>,
}

impl Index {
    pub fn new<T: IndexProvider + 'static>(inner: T) -> Self {
        Index { inner: Arc::new(inner) }
    }
}

impl Deref for Index {
    type Target = Arc<dyn IndexProvider>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Debug for Index {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Index({})", self.inner.info())
    }
}

/// Creates the index variant matching `info`.
///
/// Geospatial indexes need the coordinate domain in `geo`; other variants
/// ignore it.
///
/// # Errors
/// `InvalidOperation` when a geospatial index has no domain or an invalid one.
pub fn create_index(info: IndexInfo, geo: Option<GeoSpatialIndexInfo>) -> CloverResult<Index> {
    log::debug!("Creating {}", info);
    match info.index_type() {
        IndexType::SingleField => Ok(Index::new(RangeIndex::new(info))),
        IndexType::GeoSpatial => match geo {
            Some(geo) => {
                geo.validate()?;
                Ok(Index::new(GeoIndex::new(info, geo)))
            }
            None => {
                log::error!("{} requires a coordinate domain", info);
                Err(CloverError::new(
                    &format!("{} requires a coordinate domain", info),
                    ErrorKind::InvalidOperation,
                ))
            }
        },
    }
}
