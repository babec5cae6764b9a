use crate::errors::CloverResult;
use std::time::Duration;

/// A key-value pair returned by a scan.
pub type KvEntry = (Vec<u8>, Vec<u8>);

/// Iterator over the entries of a scan, in key order or reverse key order.
pub type KvIterator<'a> = Box<dyn Iterator<Item = CloverResult<KvEntry>> + 'a>;

/// Range of keys visited by [KvTransaction::scan].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyRange {
    /// Every key starting with the prefix.
    Prefix(Vec<u8>),
    /// Every key `k` with `start <= k < end`.
    Range { start: Vec<u8>, end: Vec<u8> },
}

impl KeyRange {
    pub fn prefix(prefix: impl Into<Vec<u8>>) -> Self {
        KeyRange::Prefix(prefix.into())
    }

    pub fn range(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        KeyRange::Range {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Inclusive lower bound of the range.
    pub fn start(&self) -> &[u8] {
        match self {
            KeyRange::Prefix(prefix) => prefix,
            KeyRange::Range { start, .. } => start,
        }
    }

    /// Exclusive upper bound of the range, `None` when unbounded.
    ///
    /// A prefix made only of `0xFF` bytes has no successor and is unbounded.
    pub fn end(&self) -> Option<Vec<u8>> {
        match self {
            KeyRange::Prefix(prefix) => prefix_successor(prefix),
            KeyRange::Range { end, .. } => Some(end.clone()),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        match self {
            KeyRange::Prefix(prefix) => key.starts_with(prefix),
            KeyRange::Range { start, end } => key >= start.as_slice() && key < end.as_slice(),
        }
    }
}

/// Returns the smallest key greater than every key starting with `prefix`.
pub fn prefix_successor(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut successor = prefix.to_vec();
    while let Some(last) = successor.pop() {
        if last < 0xFF {
            successor.push(last + 1);
            return Some(successor);
        }
    }
    None
}

/// An ordered, transactional key-value transaction.
///
/// Keys and values are opaque byte strings ordered lexicographically. Writes
/// are visible to later reads of the same transaction; whether and when they
/// become visible to others is up to the backend's commit protocol.
///
/// The trait is object safe so that indexes can work with any backend
/// through `&mut dyn KvTransaction`.
pub trait KvTransaction {
    /// Returns the value stored under `key`, or `None` if absent or expired.
    fn get(&self, key: &[u8]) -> CloverResult<Option<Vec<u8>>>;

    /// Stores `value` under `key`; with a `ttl` the entry expires after it.
    fn set(&mut self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> CloverResult<()>;

    /// Deletes `key`. Deleting an absent key is not an error.
    fn delete(&mut self, key: &[u8]) -> CloverResult<()>;

    /// Visits the live entries of `range` in key order, or in reverse order.
    fn scan(&self, range: KeyRange, reverse: bool) -> CloverResult<KvIterator<'_>>;

    /// Returns `true` if the transaction rejects writes.
    fn is_read_only(&self) -> bool;
}
