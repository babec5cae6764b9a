use chrono::{DateTime, Utc};
use clover::doc;
use clover::document::Document;
use clover::errors::{CloverError, CloverResult, ErrorKind};
use clover::index::{create_index, GeoSpatialIndexInfo, Index, IndexInfo, IndexType};
use clover::store::memory::InMemoryStore;
use clover::store::KvTransaction;
use rand::seq::SliceRandom;
use std::panic::{RefUnwindSafe, UnwindSafe};
use std::time::Instant;

/// Runs a test between a setup and a teardown step.
///
/// The teardown runs even when the test body fails; a panic anywhere is
/// reported with the failing phase.
pub fn run_test<T, B, A>(before: B, test: T, after: A)
where
    T: Fn(TestContext) -> CloverResult<()> + UnwindSafe + RefUnwindSafe,
    B: Fn() -> CloverResult<TestContext> + UnwindSafe + RefUnwindSafe,
    A: Fn(TestContext) -> CloverResult<()> + UnwindSafe + RefUnwindSafe,
{
    let start_time = Instant::now();
    let result = std::panic::catch_unwind(|| {
        let ctx = before().map_err(|e| format!("Before run failed: {:?}", e))?;
        let test_result = test(ctx.clone());
        let after_result = after(ctx);
        test_result.map_err(|e| format!("Test failed: {:?}", e))?;
        after_result.map_err(|e| format!("After run failed: {:?}", e))
    });

    let error = match result {
        Ok(Ok(())) => return,
        Ok(Err(e)) => e,
        Err(panic_err) => {
            if let Some(s) = panic_err.downcast_ref::<&str>() {
                format!("Panic: {}", s)
            } else if let Some(s) = panic_err.downcast_ref::<String>() {
                format!("Panic: {}", s)
            } else {
                "Panic: unknown payload".to_string()
            }
        }
    };

    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {:?}", start_time.elapsed());
    eprintln!("Error: {}", error);
    eprintln!("=====================================================\n");
    panic!("{}", error);
}

#[derive(Clone)]
pub struct TestContext {
    collection: String,
    store: InMemoryStore,
}

impl TestContext {
    pub fn new(collection: String, store: InMemoryStore) -> Self {
        Self { collection, store }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn store(&self) -> InMemoryStore {
        self.store.clone()
    }

    pub fn single_field_index(&self, field: &str) -> CloverResult<Index> {
        create_index(IndexInfo::new(&self.collection, field, IndexType::SingleField), None)
    }

    pub fn geo_index(&self, field: &str, min: f64, max: f64) -> CloverResult<Index> {
        create_index(
            IndexInfo::new(&self.collection, field, IndexType::GeoSpatial),
            Some(GeoSpatialIndexInfo::new(min, max)),
        )
    }
}

pub fn random_collection() -> String {
    format!("test-{}", uuid::Uuid::new_v4())
}

pub fn create_test_context() -> CloverResult<TestContext> {
    Ok(TestContext::new(random_collection(), InMemoryStore::new()))
}

pub fn cleanup(ctx: TestContext) -> CloverResult<()> {
    let purged = ctx.store().purge_expired();
    log::debug!(
        "Cleaning up {}: {} expired and {} live entries",
        ctx.collection(),
        purged,
        ctx.store().len()
    );
    Ok(())
}

pub fn parse_instant(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| panic!("invalid test instant {}: {}", s, e))
}

pub fn create_test_docs() -> Vec<Document> {
    let doc1 = doc! {
        _id: (uuid::Uuid::new_v4().to_string()),
        first_name: "fn1",
        last_name: "ln1",
        birth_day: (parse_instant("2012-07-01T02:15:22+02:00")),
        data: (vec![1u8, 2u8, 3u8]),
        age: 31,
        location: [12.5, 41.9],
        body: "a quick brown fox jump over the lazy dog",
    };

    let doc2 = doc! {
        _id: (uuid::Uuid::new_v4().to_string()),
        first_name: "fn2",
        last_name: "ln2",
        birth_day: (parse_instant("2010-06-12T12:05:35+05:30")),
        data: (vec![3u8, 4u8, 3u8]),
        age: (-4),
        location: [2.35, 48.85],
        body: "quick hello world from clover",
    };

    let doc3 = doc! {
        _id: (uuid::Uuid::new_v4().to_string()),
        first_name: "fn3",
        last_name: "ln2",
        birth_day: (parse_instant("2014-04-17T22:25:44-04:00")),
        data: (vec![9u8, 4u8, 8u8]),
        age: 1.5,
        location: [-74.0, 40.7],
        body: "Lorem ipsum dolor sit amet, consectetur \
        adipiscing elit. Sed nunc mi, mattis ullamcorper \
        dignissim vitae, condimentum non lorem.",
    };

    vec![doc1, doc2, doc3]
}

/// Adds the `field` value of every document to `index`, in random order,
/// in a single committed transaction. Documents without the field are
/// skipped.
pub fn index_documents(ctx: &TestContext, index: &Index, docs: &[Document]) -> CloverResult<()> {
    let mut shuffled = docs.to_vec();
    shuffled.shuffle(&mut rand::rng());

    ctx.store().update(|txn| {
        for doc in &shuffled {
            if let Some(value) = doc.get(index.field())? {
                index.add(txn, &doc.object_id()?, value, doc.ttl()?)?;
            }
        }
        Ok(())
    })
}

pub fn collect_ids(index: &Index, txn: &dyn KvTransaction, reverse: bool) -> CloverResult<Vec<String>> {
    let mut ids = Vec::new();
    index.iterate(txn, reverse, &mut |id| {
        ids.push(id.to_string());
        Ok(())
    })?;
    Ok(ids)
}

/// Maps document ids back to the value of `field` in `docs`.
pub fn values_of(docs: &[Document], ids: &[String], field: &str) -> CloverResult<Vec<String>> {
    ids.iter()
        .map(|id| {
            let doc = docs
                .iter()
                .find(|doc| doc.object_id().map(|it| &it == id).unwrap_or(false))
                .ok_or_else(|| CloverError::new(&format!("unknown id {}", id), ErrorKind::InternalError))?;
            Ok(doc
                .get(field)?
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .unwrap_or_default())
        })
        .collect()
}

pub fn is_sorted<T: Ord>(iterable: impl IntoIterator<Item = T>, ascending: bool) -> bool {
    let mut iter = iterable.into_iter();
    if let Some(mut prev) = iter.next() {
        for current in iter {
            if ascending {
                if prev > current {
                    return false;
                }
            } else if prev < current {
                return false;
            }
            prev = current;
        }
    }
    true
}
