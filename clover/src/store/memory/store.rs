use crate::errors::CloverResult;
use crate::store::memory::InMemoryTransaction;
use im::OrdMap;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;

pub(crate) type EntryMap = OrdMap<Vec<u8>, StoredEntry>;

#[derive(Clone, Debug)]
pub(crate) struct StoredEntry {
    pub(crate) value: Vec<u8>,
    pub(crate) expires_at: Option<Instant>,
}

impl StoredEntry {
    pub(crate) fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| expires_at > now)
    }
}

/// In-memory implementation of an ordered transactional key-value store.
///
/// # Purpose
/// `InMemoryStore` backs indexes in tests and in embedders that do not need
/// persistence. All data is lost when the last clone is dropped.
///
/// # Characteristics
/// - **Snapshot transactions**: a transaction reads the state captured by
///   [InMemoryStore::begin] plus its own writes
/// - **All-or-nothing commits**: the writes of a transaction are applied
///   under a single write lock
/// - **Last writer wins**: concurrent transactions are not checked for
///   conflicts
/// - **Expiration**: entries written with a time to live disappear from
///   reads and scans once expired and are removed by
///   [InMemoryStore::purge_expired]
///
/// # Usage
/// ```text
/// let store = InMemoryStore::new();
/// store.update(|txn| txn.set(b"key", b"value", None))?;
/// let value = store.view(|txn| txn.get(b"key"))?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<InMemoryStoreInner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore::default()
    }

    /// Starts a transaction over a snapshot of the current state.
    pub fn begin(&self, read_only: bool) -> InMemoryTransaction {
        InMemoryTransaction::new(self.clone(), self.inner.snapshot(), read_only)
    }

    /// Runs `f` in a read-only transaction.
    pub fn view<R, F>(&self, f: F) -> CloverResult<R>
    where
        F: FnOnce(&InMemoryTransaction) -> CloverResult<R>,
    {
        let txn = self.begin(true);
        let result = f(&txn);
        txn.discard();
        result
    }

    /// Runs `f` in a read-write transaction, committing it when `f` succeeds
    /// and discarding it otherwise.
    pub fn update<R, F>(&self, f: F) -> CloverResult<R>
    where
        F: FnOnce(&mut InMemoryTransaction) -> CloverResult<R>,
    {
        let mut txn = self.begin(false);
        match f(&mut txn) {
            Ok(result) => {
                txn.commit()?;
                Ok(result)
            }
            Err(err) => {
                txn.discard();
                Err(err)
            }
        }
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.purge_expired()
    }

    /// Returns the number of live entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .snapshot()
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn apply(&self, writes: Vec<PendingWrite>) {
        self.inner.apply(writes)
    }
}

#[derive(Debug)]
pub(crate) enum PendingWrite {
    Put(Vec<u8>, StoredEntry),
    Delete(Vec<u8>),
}

#[derive(Default)]
struct InMemoryStoreInner {
    entries: RwLock<EntryMap>,
}

impl InMemoryStoreInner {
    fn snapshot(&self) -> EntryMap {
        self.entries.read().clone()
    }

    fn apply(&self, writes: Vec<PendingWrite>) {
        let mut entries = self.entries.write();
        let count = writes.len();
        for write in writes {
            match write {
                PendingWrite::Put(key, entry) => {
                    entries.insert(key, entry);
                }
                PendingWrite::Delete(key) => {
                    entries.remove(&key);
                }
            }
        }
        log::trace!("Applied {} writes, store holds {} entries", count, entries.len());
    }

    fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write();
        let expired: Vec<Vec<u8>> = entries
            .iter()
            .filter(|(_, entry)| !entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.remove(key);
        }
        if !expired.is_empty() {
            log::debug!("Purged {} expired entries", expired.len());
        }
        expired.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{CloverError, ErrorKind};
    use crate::store::KvTransaction;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn update_commits_on_success() {
        let store = InMemoryStore::new();
        store.update(|txn| txn.set(b"k", b"v", None)).unwrap();
        assert_eq!(store.view(|txn| txn.get(b"k")).unwrap(), Some(b"v".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_discards_on_failure() {
        let store = InMemoryStore::new();
        let result: CloverResult<()> = store.update(|txn| {
            txn.set(b"k", b"v", None)?;
            Err(CloverError::new("boom", ErrorKind::InternalError))
        });
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn transactions_read_their_snapshot() {
        let store = InMemoryStore::new();
        store.update(|txn| txn.set(b"a", b"1", None)).unwrap();

        let reader = store.begin(true);
        store.update(|txn| txn.set(b"a", b"2", None)).unwrap();

        assert_eq!(reader.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.view(|txn| txn.get(b"a")).unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn purge_removes_expired_entries() {
        let store = InMemoryStore::new();
        store
            .update(|txn| {
                txn.set(b"short", b"v", Some(Duration::from_millis(1)))?;
                txn.set(b"long", b"v", Some(Duration::from_secs(3600)))?;
                txn.set(b"forever", b"v", None)
            })
            .unwrap();

        thread::sleep(Duration::from_millis(20));
        assert_eq!(store.len(), 2);
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.purge_expired(), 0);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn concurrent_commits_are_all_applied() {
        let store = InMemoryStore::new();
        let handles: Vec<_> = (0..4u8)
            .map(|worker| {
                let store = store.clone();
                thread::spawn(move || {
                    for i in 0..25u8 {
                        store.update(|txn| txn.set(&[worker, i], &[i], None)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 100);
    }
}
