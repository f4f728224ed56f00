//! Concurrency tests for MemoryFeatureStore
//!
//! Readers on many threads must always observe complete features and index
//! entries consistent with them, while a writer reloads data.

use std::sync::Arc;
use std::thread;

use geo_types::{point, Geometry};
use geostrata_core::{Attributes, Envelope, FeatureStore};
use geostrata_storage::MemoryFeatureStore;

fn pt(x: f64, y: f64) -> Geometry<f64> {
    point!(x: x, y: y).into()
}

#[test]
fn test_concurrent_readers_see_consistent_entries() {
    let store: Arc<MemoryFeatureStore<u64>> = Arc::new(MemoryFeatureStore::new());
    for i in 0..1_000u64 {
        store
            .insert(i, pt(i as f64, i as f64), Attributes::new().with("i", i))
            .unwrap();
    }

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    for entry in store.index_entries().unwrap() {
                        let expected = Envelope::point(entry.fid as f64, entry.fid as f64).unwrap();
                        assert_eq!(entry.envelope, expected);
                    }
                }
            })
        })
        .collect();

    let writer = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for i in 1_000..2_000u64 {
                store.insert(i, pt(i as f64, i as f64), Attributes::new()).unwrap();
            }
        })
    };

    for reader in readers {
        reader.join().unwrap();
    }
    writer.join().unwrap();

    assert_eq!(store.feature_count().unwrap(), 2_000);
    assert_eq!(store.generation(), 2_000);
}

#[test]
fn test_shared_store_through_arc_trait_impl() {
    let store = Arc::new(MemoryFeatureStore::<u32>::with_connection_id("mem://shared"));
    store.insert(1, pt(1.0, 2.0), Attributes::new()).unwrap();

    // Arc<S> is itself a FeatureStore
    fn count<S: FeatureStore<u32>>(store: &S) -> usize {
        store.feature_count().unwrap()
    }
    assert_eq!(count(&store), 1);
    assert_eq!(FeatureStore::<u32>::connection_id(&store), "mem://shared");
}
