use crate::errors::{CloverError, CloverResult, ErrorKind};
use crate::store::memory::store::{EntryMap, PendingWrite, StoredEntry};
use crate::store::memory::InMemoryStore;
use crate::store::{KeyRange, KvIterator, KvTransaction};
use std::ops::Bound;
use std::time::{Duration, Instant};

/// A transaction of an [InMemoryStore].
///
/// Reads see the snapshot taken when the transaction began plus the
/// transaction's own writes. Writes are buffered and reach the store only
/// on [InMemoryTransaction::commit].
pub struct InMemoryTransaction {
    store: InMemoryStore,
    working: EntryMap,
    writes: Vec<PendingWrite>,
    read_only: bool,
}

impl InMemoryTransaction {
    pub(crate) fn new(store: InMemoryStore, snapshot: EntryMap, read_only: bool) -> Self {
        InMemoryTransaction {
            store,
            working: snapshot,
            writes: Vec::new(),
            read_only,
        }
    }

    /// Applies the buffered writes to the store.
    pub fn commit(self) -> CloverResult<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        log::debug!("Committing transaction with {} writes", self.writes.len());
        self.store.apply(self.writes);
        Ok(())
    }

    /// Drops the buffered writes.
    pub fn discard(self) {
        if !self.writes.is_empty() {
            log::debug!("Discarding transaction with {} writes", self.writes.len());
        }
    }

    fn ensure_writable(&self) -> CloverResult<()> {
        if self.read_only {
            log::error!("Write attempted in a read-only transaction");
            return Err(CloverError::new(
                "cannot write in a read-only transaction",
                ErrorKind::InvalidOperation,
            ));
        }
        Ok(())
    }
}

impl KvTransaction for InMemoryTransaction {
    fn get(&self, key: &[u8]) -> CloverResult<Option<Vec<u8>>> {
        let now = Instant::now();
        Ok(self
            .working
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    fn set(&mut self, key: &[u8], value: &[u8], ttl: Option<Duration>) -> CloverResult<()> {
        self.ensure_writable()?;
        let entry = StoredEntry {
            value: value.to_vec(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.working.insert(key.to_vec(), entry.clone());
        self.writes.push(PendingWrite::Put(key.to_vec(), entry));
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> CloverResult<()> {
        self.ensure_writable()?;
        self.working.remove(key);
        self.writes.push(PendingWrite::Delete(key.to_vec()));
        Ok(())
    }

    fn scan(&self, range: KeyRange, reverse: bool) -> CloverResult<KvIterator<'_>> {
        let lower = Bound::Included(range.start().to_vec());
        let upper = match range.end() {
            Some(end) => Bound::Excluded(end),
            None => Bound::Unbounded,
        };

        if let (Bound::Included(start), Bound::Excluded(end)) = (&lower, &upper) {
            if start >= end {
                return Ok(Box::new(std::iter::empty()));
            }
        }

        let now = Instant::now();
        let entries = self
            .working
            .range((lower, upper))
            .filter(move |(_, entry)| entry.is_live(now))
            .map(|(key, entry)| Ok((key.clone(), entry.value.clone())));

        if reverse {
            Ok(Box::new(entries.rev()))
        } else {
            Ok(Box::new(entries))
        }
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn keys(txn: &InMemoryTransaction, range: KeyRange, reverse: bool) -> Vec<Vec<u8>> {
        txn.scan(range, reverse)
            .unwrap()
            .map(|entry| entry.unwrap().0)
            .collect()
    }

    #[test]
    fn reads_see_own_writes() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(false);
        txn.set(b"a", b"1", None).unwrap();
        assert_eq!(txn.get(b"a").unwrap(), Some(b"1".to_vec()));
        txn.delete(b"a").unwrap();
        assert_eq!(txn.get(b"a").unwrap(), None);
        txn.delete(b"a").unwrap();
        txn.commit().unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn discarded_writes_leave_no_trace() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(false);
        txn.set(b"a", b"1", None).unwrap();
        txn.discard();
        assert!(store.is_empty());
    }

    #[test]
    fn read_only_rejects_writes() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(true);
        assert!(txn.is_read_only());
        assert_eq!(
            txn.set(b"a", b"1", None).unwrap_err().kind(),
            &ErrorKind::InvalidOperation
        );
        assert_eq!(txn.delete(b"a").unwrap_err().kind(), &ErrorKind::InvalidOperation);
    }

    #[test]
    fn scans_respect_range_and_direction() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(false);
        for key in [&b"a1"[..], b"a2", b"a3", b"b1", &[b'a', 0xFF]] {
            txn.set(key, b"", None).unwrap();
        }

        assert_eq!(
            keys(&txn, KeyRange::prefix(b"a".to_vec()), false),
            vec![b"a1".to_vec(), b"a2".to_vec(), b"a3".to_vec(), vec![b'a', 0xFF]]
        );
        assert_eq!(
            keys(&txn, KeyRange::range(b"a2".to_vec(), b"b1".to_vec()), true),
            vec![vec![b'a', 0xFF], b"a3".to_vec(), b"a2".to_vec()]
        );
        assert!(keys(&txn, KeyRange::range(b"b".to_vec(), b"a".to_vec()), false).is_empty());
        assert_eq!(keys(&txn, KeyRange::prefix(Vec::new()), false).len(), 5);
    }

    #[test]
    fn expired_entries_are_invisible() {
        let store = InMemoryStore::new();
        let mut txn = store.begin(false);
        txn.set(b"gone", b"v", Some(Duration::ZERO)).unwrap();
        txn.set(b"kept", b"v", Some(Duration::from_secs(60))).unwrap();
        thread::sleep(Duration::from_millis(5));

        assert_eq!(txn.get(b"gone").unwrap(), None);
        assert_eq!(txn.get(b"kept").unwrap(), Some(b"v".to_vec()));
        assert_eq!(keys(&txn, KeyRange::prefix(Vec::new()), false), vec![b"kept".to_vec()]);
    }
}
