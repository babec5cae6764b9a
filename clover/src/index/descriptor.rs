use crate::errors::{CloverError, CloverResult, ErrorKind};
use std::fmt::{Display, Formatter};

/// Kind of projection an index maintains.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndexType {
    /// Ordered projection of a scalar field.
    SingleField,
    /// Z-order projection of a two-dimensional point field.
    GeoSpatial,
}

impl IndexType {
    /// Byte identifying the index kind inside index keys.
    pub(crate) fn marker(&self) -> u8 {
        match self {
            IndexType::SingleField => 0x01,
            IndexType::GeoSpatial => 0x02,
        }
    }
}

impl Display for IndexType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexType::SingleField => write!(f, "single-field"),
            IndexType::GeoSpatial => write!(f, "geo-spatial"),
        }
    }
}

/// Describes an index: the collection and field it projects and its type.
///
/// Descriptors are immutable metadata. They carry no data; the projected
/// entries live in the key-value store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexInfo {
    collection: String,
    field: String,
    index_type: IndexType,
}

impl IndexInfo {
    pub fn new(collection: &str, field: &str, index_type: IndexType) -> Self {
        IndexInfo {
            collection: collection.to_string(),
            field: field.to_string(),
            index_type,
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn index_type(&self) -> IndexType {
        self.index_type
    }
}

impl Display for IndexInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} index on {}.{}", self.index_type, self.collection, self.field)
    }
}

/// Coordinate domain of a geospatial index, applied to both axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GeoSpatialIndexInfo {
    min_range: f64,
    max_range: f64,
}

impl GeoSpatialIndexInfo {
    pub fn new(min_range: f64, max_range: f64) -> Self {
        GeoSpatialIndexInfo { min_range, max_range }
    }

    pub fn min_range(&self) -> f64 {
        self.min_range
    }

    pub fn max_range(&self) -> f64 {
        self.max_range
    }

    /// Checks that the domain is finite and not empty.
    pub fn validate(&self) -> CloverResult<()> {
        if !self.min_range.is_finite() || !self.max_range.is_finite() || self.min_range >= self.max_range {
            log::error!("Invalid geospatial domain [{}, {}]", self.min_range, self.max_range);
            return Err(CloverError::new(
                &format!("invalid geospatial domain [{}, {}]", self.min_range, self.max_range),
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}
