use crate::common::Value;
use crate::errors::{CloverError, CloverResult, ErrorKind};
use crate::index::key_codec::{doc_id_of, encode_scalar, entry_key, index_prefix, lower_key, upper_key};
use crate::index::{IndexInfo, IndexProvider, OnValue};
use crate::store::{KeyRange, KvTransaction};
use chrono::TimeDelta;
use std::ops::Bound;
use std::time::Duration;

/// Ordered index over a scalar field.
///
/// Each entry maps `encode(value) ++ 0x00 ++ doc_id` to an empty marker, so a
/// scan of the index prefix returns document ids in value order.
pub struct RangeIndex {
    info: IndexInfo,
    prefix: Vec<u8>,
}

impl RangeIndex {
    pub fn new(info: IndexInfo) -> Self {
        let prefix = index_prefix(&info);
        RangeIndex { info, prefix }
    }

    fn key_of(&self, doc_id: &str, value: &Value) -> CloverResult<Vec<u8>> {
        let encoded = encode_scalar(&self.info, value)?;
        entry_key(&self.prefix, &encoded, doc_id)
    }

    fn encode_bound(&self, bound: Bound<&Value>) -> CloverResult<Bound<Vec<u8>>> {
        Ok(match bound {
            Bound::Included(value) => Bound::Included(encode_scalar(&self.info, value)?),
            Bound::Excluded(value) => Bound::Excluded(encode_scalar(&self.info, value)?),
            Bound::Unbounded => Bound::Unbounded,
        })
    }
}

pub(crate) fn ttl_to_duration(ttl: TimeDelta) -> CloverResult<Option<Duration>> {
    if ttl < TimeDelta::zero() {
        return Ok(None);
    }
    ttl.to_std().map(Some).map_err(|err| {
        log::error!("Invalid time to live {}: {}", ttl, err);
        CloverError::new(
            &format!("invalid time to live {}: {}", ttl, err),
            ErrorKind::InvalidOperation,
        )
    })
}

pub(crate) fn walk(
    txn: &dyn KvTransaction,
    range: KeyRange,
    reverse: bool,
    on_value: &mut OnValue,
) -> CloverResult<()> {
    for entry in txn.scan(range, reverse)? {
        let (key, _) = entry?;
        on_value(doc_id_of(&key)?)?;
    }
    Ok(())
}

pub(crate) fn delete_prefix(txn: &mut dyn KvTransaction, prefix: &[u8]) -> CloverResult<usize> {
    let keys = txn
        .scan(KeyRange::prefix(prefix.to_vec()), false)?
        .map(|entry| entry.map(|(key, _)| key))
        .collect::<CloverResult<Vec<_>>>()?;
    for key in &keys {
        txn.delete(key)?;
    }
    Ok(keys.len())
}

impl IndexProvider for RangeIndex {
    fn info(&self) -> &IndexInfo {
        &self.info
    }

    fn add(
        &self,
        txn: &mut dyn KvTransaction,
        doc_id: &str,
        value: &Value,
        ttl: TimeDelta,
    ) -> CloverResult<()> {
        let key = self.key_of(doc_id, value)?;
        log::trace!("Indexing {} = {} for document {}", self.info.field(), value, doc_id);
        txn.set(&key, &[], ttl_to_duration(ttl)?)
    }

    fn remove(&self, txn: &mut dyn KvTransaction, doc_id: &str, value: &Value) -> CloverResult<()> {
        let key = self.key_of(doc_id, value)?;
        txn.delete(&key)
    }

    fn iterate(&self, txn: &dyn KvTransaction, reverse: bool, on_value: &mut OnValue) -> CloverResult<()> {
        walk(txn, KeyRange::prefix(self.prefix.clone()), reverse, on_value)
    }

    fn drop_index(&self, txn: &mut dyn KvTransaction) -> CloverResult<()> {
        let removed = delete_prefix(txn, &self.prefix)?;
        log::debug!("Dropped {} with {} entries", self.info, removed);
        Ok(())
    }

    fn iterate_range(
        &self,
        txn: &dyn KvTransaction,
        lower: Bound<&Value>,
        upper: Bound<&Value>,
        reverse: bool,
        on_value: &mut OnValue,
    ) -> CloverResult<()> {
        let start = lower_key(&self.prefix, self.encode_bound(lower)?);
        let end = upper_key(&self.prefix, self.encode_bound(upper)?).ok_or_else(|| {
            CloverError::new("index prefix has no upper bound", ErrorKind::InternalError)
        })?;
        if start >= end {
            return Ok(());
        }
        walk(txn, KeyRange::range(start, end), reverse, on_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexType;
    use crate::store::memory::{InMemoryStore, InMemoryTransaction};

    fn index(field: &str) -> RangeIndex {
        RangeIndex::new(IndexInfo::new("todos", field, IndexType::SingleField))
    }

    fn collect(index: &RangeIndex, txn: &InMemoryTransaction, reverse: bool) -> Vec<String> {
        let mut ids = Vec::new();
        index
            .iterate(txn, reverse, &mut |id| {
                ids.push(id.to_string());
                Ok(())
            })
            .unwrap();
        ids
    }

    fn collect_range(
        index: &RangeIndex,
        txn: &InMemoryTransaction,
        lower: Bound<&Value>,
        upper: Bound<&Value>,
    ) -> Vec<String> {
        let mut ids = Vec::new();
        index
            .iterate_range(txn, lower, upper, false, &mut |id| {
                ids.push(id.to_string());
                Ok(())
            })
            .unwrap();
        ids
    }

    #[test]
    fn iterates_in_value_order() {
        let store = InMemoryStore::new();
        let idx = index("priority");
        let mut txn = store.begin(false);
        idx.add(&mut txn, "d3", &Value::I64(3), TimeDelta::milliseconds(-1)).unwrap();
        idx.add(&mut txn, "d1", &Value::I64(-1), TimeDelta::milliseconds(-1)).unwrap();
        idx.add(&mut txn, "d2", &Value::U64(2), TimeDelta::milliseconds(-1)).unwrap();
        idx.add(&mut txn, "d0", &Value::I64(2), TimeDelta::milliseconds(-1)).unwrap();

        assert_eq!(collect(&idx, &txn, false), vec!["d1", "d0", "d2", "d3"]);
        assert_eq!(collect(&idx, &txn, true), vec!["d3", "d2", "d0", "d1"]);
    }

    #[test]
    fn mixed_numbers_iterate_by_numeric_value() {
        let store = InMemoryStore::new();
        let idx = index("age");
        let mut txn = store.begin(false);
        for (id, value) in [
            ("max", Value::U64(u64::MAX)),
            ("two", Value::I64(2)),
            ("half", Value::F64(-0.5)),
            ("one", Value::I64(1)),
            ("one_half", Value::F64(1.5)),
        ] {
            idx.add(&mut txn, id, &value, TimeDelta::milliseconds(-1)).unwrap();
        }

        assert_eq!(collect(&idx, &txn, false), vec!["half", "one", "one_half", "two", "max"]);
        assert_eq!(collect(&idx, &txn, true), vec!["max", "two", "one_half", "one", "half"]);

        let one = Value::I64(1);
        let two = Value::U64(2);
        assert_eq!(
            collect_range(&idx, &txn, Bound::Included(&one), Bound::Included(&two)),
            vec!["one", "one_half", "two"]
        );
        let limit = Value::F64(1.0e19);
        assert_eq!(
            collect_range(&idx, &txn, Bound::Excluded(&limit), Bound::Unbounded),
            vec!["max"]
        );
    }

    #[test]
    fn indexes_are_isolated_by_field() {
        let store = InMemoryStore::new();
        let a = index("a");
        let ab = index("a\0b");
        let mut txn = store.begin(false);
        a.add(&mut txn, "x", &Value::from("v"), TimeDelta::milliseconds(-1)).unwrap();
        ab.add(&mut txn, "y", &Value::from("v"), TimeDelta::milliseconds(-1)).unwrap();

        assert_eq!(collect(&a, &txn, false), vec!["x"]);
        assert_eq!(collect(&ab, &txn, false), vec!["y"]);
    }

    #[test]
    fn remove_is_idempotent() {
        let store = InMemoryStore::new();
        let idx = index("name");
        let mut txn = store.begin(false);
        idx.add(&mut txn, "d1", &Value::from("ada"), TimeDelta::milliseconds(-1)).unwrap();
        idx.remove(&mut txn, "d1", &Value::from("ada")).unwrap();
        idx.remove(&mut txn, "d1", &Value::from("ada")).unwrap();
        assert!(collect(&idx, &txn, false).is_empty());
    }

    #[test]
    fn rejected_values_write_nothing() {
        let store = InMemoryStore::new();
        let idx = index("tags");
        let mut txn = store.begin(false);

        let err = idx
            .add(&mut txn, "d1", &Value::Array(vec![Value::I64(1)]), TimeDelta::milliseconds(-1))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::UnsupportedIndexValueType);
        assert!(err.message().contains("tags"));

        let err = idx
            .add(&mut txn, "d1", &Value::F64(f64::NAN), TimeDelta::milliseconds(-1))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::EncodingFailure);

        let err = idx
            .add(&mut txn, "d\01", &Value::I64(1), TimeDelta::milliseconds(-1))
            .unwrap_err();
        assert_eq!(err.kind(), &ErrorKind::InvalidOperation);

        assert!(collect(&idx, &txn, false).is_empty());
    }

    #[test]
    fn ttl_expires_entries() {
        let store = InMemoryStore::new();
        let idx = index("name");
        let mut txn = store.begin(false);
        idx.add(&mut txn, "gone", &Value::from("a"), TimeDelta::zero()).unwrap();
        idx.add(&mut txn, "kept", &Value::from("b"), TimeDelta::hours(1)).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(collect(&idx, &txn, false), vec!["kept"]);
    }

    #[test]
    fn drop_removes_only_own_entries() {
        let store = InMemoryStore::new();
        let a = index("a");
        let b = index("b");
        let mut txn = store.begin(false);
        for i in 0..10 {
            a.add(&mut txn, &format!("d{}", i), &Value::I64(i), TimeDelta::milliseconds(-1)).unwrap();
            b.add(&mut txn, &format!("d{}", i), &Value::I64(i), TimeDelta::milliseconds(-1)).unwrap();
        }
        a.drop_index(&mut txn).unwrap();
        txn.commit().unwrap();

        let txn = store.begin(true);
        assert!(collect(&a, &txn, false).is_empty());
        assert_eq!(collect(&b, &txn, false).len(), 10);
    }

    #[test]
    fn callback_errors_stop_the_walk() {
        let store = InMemoryStore::new();
        let idx = index("n");
        let mut txn = store.begin(false);
        for i in 0..5 {
            idx.add(&mut txn, &format!("d{}", i), &Value::I64(i), TimeDelta::milliseconds(-1)).unwrap();
        }

        let mut seen = 0;
        let err = idx
            .iterate(&txn, false, &mut |_| {
                seen += 1;
                if seen == 2 {
                    return Err(CloverError::new("stop", ErrorKind::InternalError));
                }
                Ok(())
            })
            .unwrap_err();
        assert_eq!(err.message(), "stop");
        assert_eq!(seen, 2);
    }

    #[test]
    fn range_bounds_are_honored() {
        let store = InMemoryStore::new();
        let idx = index("n");
        let mut txn = store.begin(false);
        for i in 1..=5 {
            idx.add(&mut txn, &format!("d{}", i), &Value::I64(i), TimeDelta::milliseconds(-1)).unwrap();
        }
        let two = Value::I64(2);
        let four = Value::U64(4);

        assert_eq!(
            collect_range(&idx, &txn, Bound::Included(&two), Bound::Included(&four)),
            vec!["d2", "d3", "d4"]
        );
        assert_eq!(
            collect_range(&idx, &txn, Bound::Excluded(&two), Bound::Excluded(&four)),
            vec!["d3"]
        );
        assert_eq!(
            collect_range(&idx, &txn, Bound::Unbounded, Bound::Excluded(&two)),
            vec!["d1"]
        );
        assert_eq!(
            collect_range(&idx, &txn, Bound::Excluded(&four), Bound::Unbounded),
            vec!["d5"]
        );
        assert_eq!(
            collect_range(&idx, &txn, Bound::Included(&four), Bound::Included(&two)),
            Vec::<String>::new()
        );
        assert_eq!(
            collect_range(&idx, &txn, Bound::Included(&two), Bound::Included(&two)),
            vec!["d2"]
        );
    }

    #[test]
    fn string_ranges_handle_embedded_nul() {
        let store = InMemoryStore::new();
        let idx = index("s");
        let mut txn = store.begin(false);
        for (id, s) in [("d1", "a"), ("d2", "a\0"), ("d3", "ab")] {
            idx.add(&mut txn, id, &Value::from(s), TimeDelta::milliseconds(-1)).unwrap();
        }
        let a = Value::from("a");
        assert_eq!(
            collect_range(&idx, &txn, Bound::Included(&a), Bound::Included(&a)),
            vec!["d1"]
        );
        assert_eq!(
            collect_range(&idx, &txn, Bound::Excluded(&a), Bound::Unbounded),
            vec!["d2", "d3"]
        );
    }

    #[test]
    fn negative_ttl_means_no_expiration() {
        assert_eq!(ttl_to_duration(TimeDelta::milliseconds(-1)).unwrap(), None);
        assert_eq!(
            ttl_to_duration(TimeDelta::milliseconds(1500)).unwrap(),
            Some(Duration::from_millis(1500))
        );
    }
}
